use relaygate_common::{TransportError, UpstreamError};

/// Everything a provider adapter call can raise. Adapters must raise
/// `Upstream` for any non-2xx response; `Unsupported` covers a
/// hook an adapter deliberately doesn't implement (e.g. `refresh` for a
/// provider with no token-refresh flow modeled here).
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("operation not supported by this provider: {0}")]
    Unsupported(&'static str),
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;
