use thiserror::Error;

#[derive(Error, Debug)]
pub enum PostgresError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },
}

impl From<PostgresError> for errors::EngineError {
    fn from(err: PostgresError) -> Self {
        match err {
            PostgresError::NotFound { resource, id } => errors::EngineError::not_found(resource, id),
            other => errors::EngineError::internal(other.to_string()),
        }
    }
}
