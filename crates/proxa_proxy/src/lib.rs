pub mod error;
pub mod handler;
pub mod origin;

pub use error::ProxyError;
pub use handler::{CacheOutcome, Proxied, ProxyHandler};
pub use origin::{FetchError, HttpOrigin, OriginClient};
