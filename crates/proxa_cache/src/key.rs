use std::fmt;

/// Namespace prefix for every key this proxy writes to the store, so that
/// proxy entries can coexist with other users of the same database.
const KEY_PREFIX: &str = "proxa:cache:";

const DELIMITER: &str = "::";

/// Opaque identifier for one cacheable unit: (method, path, origin).
///
/// Each component is length-prefixed before joining, so the mapping from the
/// triple to the key text is injective even when a component contains the
/// delimiter sequence itself.
#[derive(Clone, Hash, Eq, PartialEq, Debug)]
pub struct CacheKey(String);

impl CacheKey {
    /// Builds the key for a request.
    ///
    /// The method is taken exactly as sent (case preserved). The path is
    /// normalized to a single leading slash. The origin is the upstream base
    /// address configured at startup.
    pub fn build(method: &str, path: &str, origin: &str) -> Self {
        let path = normalize_path(path);

        let mut out = String::with_capacity(
            KEY_PREFIX.len() + method.len() + path.len() + origin.len() + 2 * DELIMITER.len() + 12,
        );
        out.push_str(KEY_PREFIX);
        push_component(&mut out, method);
        out.push_str(DELIMITER);
        push_component(&mut out, &path);
        out.push_str(DELIMITER);
        push_component(&mut out, origin);

        Self(out)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn push_component(out: &mut String, component: &str) {
    out.push_str(&component.len().to_string());
    out.push(':');
    out.push_str(component);
}

/// Collapses any run of leading slashes down to exactly one, adding it when
/// missing, so `/foo`, `//foo` and `foo` identify the same cacheable unit.
fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_start_matches('/');
    format!("/{trimmed}")
}
