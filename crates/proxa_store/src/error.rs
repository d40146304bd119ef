use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The initial connection could not be established. Fatal at startup:
    /// the process refuses to serve without a reachable store.
    #[error("failed to connect to store at {addr}: {reason}")]
    Connect { addr: String, reason: String },

    /// A get/set/delete failed at runtime. Non-fatal: callers degrade to
    /// pass-through behavior instead of failing the request.
    #[error("store {op} failed: {reason}")]
    Op { op: &'static str, reason: String },
}

impl StoreError {
    pub(crate) fn op(op: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Op {
            op,
            reason: err.to_string(),
        }
    }
}
