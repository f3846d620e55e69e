use relaygate_common::ProviderId;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("account {account_id} not found for provider {provider}")]
    NotFound {
        provider: ProviderId,
        account_id: String,
    },

    #[error("io error persisting account {account_id}: {source}")]
    Io {
        account_id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed account file {path}: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
