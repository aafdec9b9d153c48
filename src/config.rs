//! Application configuration loaded from environment variables.

use crate::errors::{Result, TrackerError};
use crate::parse::LabelPriority;

#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the HTTP server
    pub port: u16,
    /// Discord webhook URL for outbound summaries (unset disables posting)
    pub discord_webhook: Option<String>,
    /// Shared secret guarding `POST /admin/reset` (unset disables the route)
    pub admin_secret: Option<String>,
    /// Path to the JSON state file
    pub data_file: String,
    /// Timeout applied to outbound notification requests, in seconds
    pub notify_timeout_secs: u64,
    /// Which amount label wins when a message carries both
    /// "Materials added" and "worth" lines
    pub amount_label_priority: LabelPriority,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            port: env_var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| TrackerError::Config("Invalid PORT".to_string()))?,
            discord_webhook: env_var("DISCORD_WEBHOOK").ok().filter(|v| !v.is_empty()),
            admin_secret: env_var("ADMIN_SECRET").ok().filter(|v| !v.is_empty()),
            data_file: env_var("DATA_FILE").unwrap_or_else(|_| "./database.json".to_string()),
            notify_timeout_secs: env_var("NOTIFY_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .map_err(|_| TrackerError::Config("Invalid NOTIFY_TIMEOUT_SECS".to_string()))?,
            amount_label_priority: match env_var("AMOUNT_LABEL_PRIORITY")
                .unwrap_or_else(|_| "materials-first".to_string())
                .as_str()
            {
                "materials-first" => LabelPriority::MaterialsFirst,
                "worth-first" => LabelPriority::WorthFirst,
                other => {
                    return Err(TrackerError::Config(format!(
                        "Invalid AMOUNT_LABEL_PRIORITY: {other}"
                    )))
                }
            },
        })
    }
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| TrackerError::Config(format!("Missing env var: {key}")))
}
