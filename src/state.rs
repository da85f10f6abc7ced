use std::sync::Arc;

use crate::config::Config;
use crate::db::Db;

pub struct AppState {
    pub db: Db,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> Result<Arc<Self>, rusqlite::Error> {
        let db = Db::open(&config.database_path)?;
        Ok(Arc::new(Self { db, config }))
    }

    #[cfg(test)]
    pub fn in_memory(config: Config) -> Result<Arc<Self>, rusqlite::Error> {
        let db = Db::open_in_memory()?;
        Ok(Arc::new(Self { db, config }))
    }
}
