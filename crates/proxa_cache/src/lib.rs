pub mod entry;
pub mod key;

pub use entry::{CacheEntry, EntryCodecError};
pub use key::CacheKey;
