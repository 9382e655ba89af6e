use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid purchase amount: {0}")]
    InvalidAmount(f64),
}

pub type Result<T> = std::result::Result<T, StoreError>;
