use axum::http::{HeaderMap, Uri};

/// Trait representing an authenticated identity (session user or API key).
///
/// Implemented by `gateway-auth`'s claim types to decouple handlers from the
/// concrete identity representation.
pub trait Identity: Send + Sync {
    /// Unique subject identifier (the JWT `sub` claim).
    fn sub(&self) -> &str;

    /// Scopes granted to this identity. `admin` implicitly satisfies every
    /// scope check without being listed here.
    fn scopes(&self) -> &[String];

    /// Email associated with this identity, if available.
    fn email(&self) -> Option<&str> {
        None
    }

    /// Raw JWT claims, if available.
    fn claims(&self) -> Option<&serde_json::Value> {
        None
    }

    /// Whether this identity holds the `admin` scope.
    fn is_admin(&self) -> bool {
        self.scopes().iter().any(|s| s == "admin")
    }

    /// True if this identity satisfies `required` — either by holding it
    /// directly or by holding `admin`.
    fn has_scope(&self, required: &str) -> bool {
        self.is_admin() || self.scopes().iter().any(|s| s == required)
    }
}

/// Sentinel type representing the absence of an identity (pre-auth routes).
pub struct NoIdentity;

impl Identity for NoIdentity {
    fn sub(&self) -> &str {
        ""
    }
    fn scopes(&self) -> &[String] {
        &[]
    }
}

/// Path parameters extracted from the matched route pattern.
///
/// In production, this borrows Axum's `RawPathParams` with zero copy.
/// For testing, construct via [`PathParams::from_pairs`].
pub struct PathParams<'a>(PathParamsInner<'a>);

enum PathParamsInner<'a> {
    Raw(&'a axum::extract::RawPathParams),
    Pairs(&'a [(&'a str, &'a str)]),
}

impl<'a> PathParams<'a> {
    /// Create from Axum's `RawPathParams` (zero copy).
    pub fn from_raw(raw: &'a axum::extract::RawPathParams) -> Self {
        Self(PathParamsInner::Raw(raw))
    }

    /// Create from a slice of `(key, value)` pairs (for testing).
    pub fn from_pairs(pairs: &'a [(&'a str, &'a str)]) -> Self {
        Self(PathParamsInner::Pairs(pairs))
    }

    /// Empty path params.
    pub const EMPTY: PathParams<'static> = PathParams(PathParamsInner::Pairs(&[]));

    /// Get a path parameter by name. Linear scan — optimal for the typical
    /// 1-3 path params on this route table.
    pub fn get(&self, name: &str) -> Option<&str> {
        match &self.0 {
            PathParamsInner::Raw(raw) => raw.iter().find(|(k, _)| *k == name).map(|(_, v)| v),
            PathParamsInner::Pairs(pairs) => {
                pairs.iter().find(|(k, _)| *k == name).map(|(_, v)| *v)
            }
        }
    }
}

/// Request-scoped context carried alongside an authenticated identity.
/// Handlers that need the raw headers/URI for scope logging pull this from
/// request extensions rather than re-deriving it.
pub struct RequestContext<'a> {
    pub headers: &'a HeaderMap,
    pub uri: &'a Uri,
    pub path_params: PathParams<'a>,
}

impl<'a> RequestContext<'a> {
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestIdentity {
        scopes: Vec<String>,
    }

    impl Identity for TestIdentity {
        fn sub(&self) -> &str {
            "user-1"
        }
        fn scopes(&self) -> &[String] {
            &self.scopes
        }
    }

    #[test]
    fn no_identity_has_no_scopes() {
        let id = NoIdentity;
        assert!(!id.has_scope("chat"));
        assert!(!id.is_admin());
    }

    #[test]
    fn admin_scope_satisfies_any_check() {
        let id = TestIdentity {
            scopes: vec!["admin".into()],
        };
        assert!(id.is_admin());
        assert!(id.has_scope("embeddings"));
        assert!(id.has_scope("anything"));
    }

    #[test]
    fn explicit_scope_match() {
        let id = TestIdentity {
            scopes: vec!["chat".into()],
        };
        assert!(id.has_scope("chat"));
        assert!(!id.has_scope("embeddings"));
    }

    #[test]
    fn path_params_from_pairs() {
        let pairs = [("model", "llama-3")];
        let params = PathParams::from_pairs(&pairs);
        assert_eq!(params.get("model"), Some("llama-3"));
        assert_eq!(params.get("missing"), None);
    }

    #[test]
    fn path_params_empty() {
        assert_eq!(PathParams::EMPTY.get("anything"), None);
    }
}
