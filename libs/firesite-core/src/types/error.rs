use firesite_widget::WidgetError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FiresiteError {
    #[error("document {collection}/{id} not found")]
    NotFound { collection: String, id: String },
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("subscription error: {0}")]
    Subscription(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("insufficient permissions: requires {0}")]
    Forbidden(String),
    #[error("gateway error: {0}")]
    Gateway(String),
    #[error("cloud call `{action}` failed: {message}")]
    Cloud { action: String, message: String },
    #[error("serialization error")]
    Serde(#[from] serde_json::Error),
    #[error("config error: {0}")]
    Config(String),
    #[error("env variables read error")]
    DotEnvy(#[from] dotenvy::Error),
    #[error("widget markup error")]
    Parse(#[from] WidgetError),
}

pub type FiresiteResult<T, E = FiresiteError> = Result<T, E>;
