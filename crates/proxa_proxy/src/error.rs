use thiserror::Error;

use crate::origin::FetchError;

/// Errors surfaced to the caller of the proxy handler.
///
/// Store and codec failures never appear here: the handler absorbs them and
/// degrades to pass-through instead. Only origin failures propagate, because
/// the proxy's contract is to be at least as available as the origin.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error(transparent)]
    Origin(#[from] FetchError),
}
