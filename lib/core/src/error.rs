use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid vector dimension: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Degenerate vector: zero or non-finite norm")]
    DegenerateVector,

    #[error("Vector is not unit length (norm {0})")]
    NotNormalized(f32),

    #[error("Index is empty")]
    EmptyIndex,

    #[error("Record already exists: {0}")]
    DuplicateId(String),

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Product catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("Unknown skin condition: {0}")]
    UnknownCondition(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
