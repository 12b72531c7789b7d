//! Origins, URL resolution and the controller's scope.
//!
//! Origin comparison follows the HTML origin model (scheme, host, port with
//! default ports applied). Relative asset paths such as `./index.html` are
//! resolved against the scope URL before they are used as cache keys.

use url::{Origin, Url};

/// Errors raised while parsing the scope or resolving URLs
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OriginError {
    /// The URL is not absolute or otherwise malformed
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    /// The URL has an opaque origin (`data:`, `about:blank` and friends)
    #[error("Opaque origin for '{0}'")]
    OpaqueOrigin(String),
}

/// The URL space controlled by the cache controller.
///
/// Every same-origin URL is handled; only the scope's origin matters for
/// interception, the scope path is the base for relative asset paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    base: Url,
    origin: Origin,
}

impl Scope {
    /// Create a scope from an absolute base URL
    pub fn new(base: &str) -> Result<Self, OriginError> {
        let mut base = Url::parse(base.trim()).map_err(|source| OriginError::InvalidUrl {
            url: base.to_string(),
            source,
        })?;
        let origin = base.origin();
        if !origin.is_tuple() {
            return Err(OriginError::OpaqueOrigin(base.into()));
        }
        base.set_fragment(None);
        Ok(Self { base, origin })
    }

    /// The normalized base URL
    pub fn base(&self) -> &str {
        self.base.as_str()
    }

    /// The scope's origin, serialized as `scheme://host[:port]`
    pub fn origin(&self) -> String {
        self.origin.ascii_serialization()
    }

    /// Resolve a path or absolute URL against the scope base.
    ///
    /// The result is the normalized serialization (lowercase host, default
    /// port elided, dot segments removed) without a fragment.
    pub fn resolve(&self, reference: &str) -> Result<String, OriginError> {
        let mut url = self
            .base
            .join(reference.trim())
            .map_err(|source| OriginError::InvalidUrl {
                url: reference.to_string(),
                source,
            })?;
        url.set_fragment(None);
        Ok(url.into())
    }

    /// Whether an absolute URL shares the scope's origin.
    /// Unparseable URLs are never same-origin.
    pub fn is_same_origin_url(&self, url: &str) -> bool {
        Url::parse(url)
            .map(|u| u.origin() == self.origin)
            .unwrap_or(false)
    }
}
