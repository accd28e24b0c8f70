use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::str::FromStr;

use crate::core::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub matrix: MatrixConfig,
    pub appservice: AppserviceConfig,
    pub reconciler: ReconcilerConfig,
    /// Free-form module settings. Accepted and logged, nothing reads them.
    pub module: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixConfig {
    pub homeserver_url: String,
    pub server_name: String,
    pub admin_user_id: String,
    pub admin_access_token: String,
    pub device_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppserviceConfig {
    pub hs_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    pub space_detection: SpaceDetection,
}

/// How a room is recognised as a space when a leave event arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpaceDetection {
    /// Only the stripped state delivered with the event is consulted.
    #[default]
    EventMetadata,
    /// Falls back to the room's current create event when the event carries
    /// no create entry.
    CurrentState,
}

impl FromStr for SpaceDetection {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "event_metadata" => Ok(SpaceDetection::EventMetadata),
            "current_state" => Ok(SpaceDetection::CurrentState),
            other => Err(AppError::Config(format!("unknown SPACE_DETECTION value: {}", other))),
        }
    }
}

impl Config {
    pub async fn load() -> AppResult<Self> {
        let server_name = required("MATRIX_SERVER_NAME")?;

        let space_detection = match env::var("SPACE_DETECTION") {
            Ok(value) => value.parse()?,
            Err(_) => SpaceDetection::default(),
        };

        let config = Config {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8009".to_string())
                    .parse()
                    .unwrap_or(8009),
            },
            matrix: MatrixConfig {
                homeserver_url: env::var("MATRIX_HOMESERVER_URL")
                    .unwrap_or_else(|_| "http://localhost:8008".to_string()),
                admin_user_id: env::var("MATRIX_ADMIN_USER_ID")
                    .unwrap_or_else(|_| format!("@admin:{}", server_name)),
                admin_access_token: required("MATRIX_ADMIN_ACCESS_TOKEN")?,
                device_id: env::var("MATRIX_DEVICE_ID").ok(),
                server_name,
            },
            appservice: AppserviceConfig {
                hs_token: required("APPSERVICE_HS_TOKEN")?,
            },
            reconciler: ReconcilerConfig { space_detection },
            module: load_module_settings(env::var("SPACEKICK_SETTINGS_FILE").ok().as_deref())?,
        };

        Ok(config)
    }
}

fn required(key: &str) -> AppResult<String> {
    env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Config(format!("{} must be set", key)))
}

/// Merges the optional settings file with `SPACEKICK_MODULE__*` variables.
pub fn load_module_settings(path: Option<&str>) -> AppResult<HashMap<String, serde_json::Value>> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::with_name(path).required(false));
    }
    let settings = builder
        .add_source(config::Environment::with_prefix("SPACEKICK_MODULE").separator("__"))
        .build()?
        .try_deserialize()?;
    Ok(settings)
}
