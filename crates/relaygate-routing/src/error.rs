#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error reading routing config: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed routing.json: {0}")]
    Corrupt(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
