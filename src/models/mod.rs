pub mod race;
pub mod standings;
pub mod track;
