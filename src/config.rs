//! Runtime configuration assembled from CLI arguments and environment.

use std::path::PathBuf;
use tracing::warn;

/// Token lifetime: 30 days.
pub const TOKEN_TTL_SECS: i64 = 30 * 24 * 3600;

/// Upload size cap: 50 MB.
pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Secret used to sign and verify bearer tokens.
    pub jwt_secret: String,
    /// Root directory for uploaded media.
    pub upload_dir: PathBuf,
    pub max_upload_bytes: u64,
    pub token_ttl_secs: i64,
}

impl AppConfig {
    /// Build a config, reading the signing secret from `JWT_SECRET`.
    pub fn load(upload_dir: PathBuf) -> Self {
        let jwt_secret = match std::env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ => {
                warn!("JWT_SECRET not set - using an insecure development secret");
                "driftwood-dev-secret".to_string()
            }
        };

        Self {
            jwt_secret,
            upload_dir,
            max_upload_bytes: MAX_UPLOAD_BYTES,
            token_ttl_secs: TOKEN_TTL_SECS,
        }
    }

    /// Config for tests: fixed secret, caller-provided upload directory.
    pub fn for_tests(upload_dir: PathBuf) -> Self {
        Self {
            jwt_secret: "test-secret".to_string(),
            upload_dir,
            max_upload_bytes: MAX_UPLOAD_BYTES,
            token_ttl_secs: TOKEN_TTL_SECS,
        }
    }
}
