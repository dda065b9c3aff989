//! Shared application state handed to every handler.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;

use crate::config::AppConfig;
use crate::db::Database;
use crate::uploads::MediaStore;

pub struct AppState {
    pub db: Database,
    pub media: MediaStore,
    pub config: AppConfig,
    pub start_time: Instant,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Opens the database (`:memory:` works too) and prepares the upload
    /// directories.
    pub async fn new(db_path: &str, config: AppConfig) -> Result<SharedState> {
        let db = Database::new(db_path).await?;
        let media = MediaStore::new(config.upload_dir.clone(), config.max_upload_bytes);
        media.init().await?;
        Ok(Arc::new(AppState {
            db,
            media,
            config,
            start_time: Instant::now(),
        }))
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
