//! Path classification.
//!
//! Decides which limiter guards a request and whether it is a registration
//! submission. Built once at startup from [`RouteConfig`].

use axum::http::Method;

use crate::config::RouteConfig;

/// Which quota a request counts against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimiterKind {
    Auth,
    Search,
    Api,
}

impl LimiterKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LimiterKind::Auth => "auth",
            LimiterKind::Search => "search",
            LimiterKind::Api => "api",
        }
    }
}

/// Compiled, immutable route classification.
#[derive(Debug, Clone)]
pub struct RouteTable {
    auth_prefixes: Vec<String>,
    search_prefixes: Vec<String>,
    exempt_paths: Vec<String>,
    registration_path: String,
    form_token_path: String,
}

impl RouteTable {
    pub fn from_config(config: &RouteConfig) -> Self {
        Self {
            auth_prefixes: config.auth_prefixes.clone(),
            search_prefixes: config.search_prefixes.clone(),
            exempt_paths: config.exempt_paths.clone(),
            registration_path: config.registration_path.clone(),
            form_token_path: config.form_token_path.clone(),
        }
    }

    /// The limiter for `path`, or `None` for exempt paths.
    ///
    /// Search is checked before auth so that a search endpoint nested under
    /// an auth prefix still counts as a search.
    pub fn limiter_for(&self, path: &str) -> Option<LimiterKind> {
        if self.exempt_paths.iter().any(|p| p == path) {
            return None;
        }
        if matches_prefix(&self.search_prefixes, path) {
            Some(LimiterKind::Search)
        } else if matches_prefix(&self.auth_prefixes, path) || path == self.registration_path {
            Some(LimiterKind::Auth)
        } else {
            Some(LimiterKind::Api)
        }
    }

    pub fn is_registration(&self, method: &Method, path: &str) -> bool {
        method == Method::POST && path == self.registration_path
    }

    pub fn registration_path(&self) -> &str {
        &self.registration_path
    }

    pub fn form_token_path(&self) -> &str {
        &self.form_token_path
    }
}

/// Segment-aware prefix match: `/api/auth` matches `/api/auth/login` but not `/api/authors`.
fn matches_prefix(prefixes: &[String], path: &str) -> bool {
    prefixes.iter().any(|prefix| {
        let prefix = prefix.trim_end_matches('/');
        match path.strip_prefix(prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.is_empty(),
            None => false,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RouteTable {
        RouteTable::from_config(&RouteConfig::default())
    }

    #[test]
    fn test_default_classification() {
        let t = table();
        assert_eq!(t.limiter_for("/api/auth/login"), Some(LimiterKind::Auth));
        assert_eq!(t.limiter_for("/api/auth/register"), Some(LimiterKind::Auth));
        assert_eq!(t.limiter_for("/api/games/search"), Some(LimiterKind::Search));
        assert_eq!(t.limiter_for("/api/users/search/extra"), Some(LimiterKind::Search));
        assert_eq!(t.limiter_for("/api/games/123"), Some(LimiterKind::Api));
        assert_eq!(t.limiter_for("/health"), None);
    }

    #[test]
    fn test_prefix_respects_segments() {
        let t = table();
        assert_eq!(t.limiter_for("/api/authors"), Some(LimiterKind::Api));
        assert_eq!(t.limiter_for("/api/games/searchable"), Some(LimiterKind::Api));
    }

    #[test]
    fn test_registration_needs_post() {
        let t = table();
        assert!(t.is_registration(&Method::POST, "/api/auth/register"));
        assert!(!t.is_registration(&Method::GET, "/api/auth/register"));
        assert!(!t.is_registration(&Method::POST, "/api/auth/login"));
    }
}
