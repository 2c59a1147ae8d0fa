use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelfilterError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("Row width {actual} does not match the {expected} columns of table '{table}'")]
    SchemaMismatch { table: String, expected: usize, actual: usize },
    #[error("Column '{column}' appears more than once in table '{table}'")]
    DuplicateColumn { table: String, column: String },
    #[error("Unknown table: {0}")]
    UnknownTable(String),
    #[error("Not a plain SQL identifier: '{0}'")]
    InvalidIdentifier(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Timed out after {0} ms")]
    Timeout(u64),
}

pub type Result<T> = std::result::Result<T, RelfilterError>;

// Helper conversions
impl From<rusqlite::Error> for RelfilterError {
    fn from(e: rusqlite::Error) -> Self { Self::Persistence(e.to_string()) }
}

impl From<config::ConfigError> for RelfilterError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}
