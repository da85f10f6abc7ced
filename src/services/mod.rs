pub mod anti_cheat;
pub mod ledger;
pub mod race;
pub mod ranking;
pub mod standings;
pub mod track_generator;
