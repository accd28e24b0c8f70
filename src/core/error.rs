use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0} was not legal room ID or room alias")]
    InvalidRoomReference(String),

    #[error("Unknown room ID or room alias {0}")]
    UnknownRoom(String),

    #[error("Matrix error: {0}")]
    Matrix(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::InvalidRoomReference(_) => 400,
            AppError::UnknownRoom(_) => 404,
            AppError::Matrix(_) | AppError::Http(_) => 502,
            _ => 500,
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(e: config::ConfigError) -> Self {
        AppError::Config(e.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
