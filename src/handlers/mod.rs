pub mod admin;
pub mod race;
pub mod standings;
