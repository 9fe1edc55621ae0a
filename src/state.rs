use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::db::Database;
use crate::error::AppError;

pub struct AppState {
    pub db: Arc<Database>,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> Result<Arc<Self>, AppError> {
        info!("Opening database at {}", config.database_path);
        let db = Database::open(&config.database_path)?;
        db.initialize()?;

        Ok(Arc::new(Self {
            db: Arc::new(db),
            config,
        }))
    }
}
