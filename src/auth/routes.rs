//! Route classification by static path prefix.

/// How a request path is handled by the authorizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// No checks; request passes straight through.
    Public,
    /// Guarded by the shared admin key header; no token involved.
    Admin,
    /// Default: full bearer-token pipeline.
    Tenant,
}

/// Public and admin path prefixes, passed to the authorizer at construction.
#[derive(Debug, Clone)]
pub struct RouteConfig {
    public_prefixes: Vec<String>,
    admin_prefixes: Vec<String>,
}

impl RouteConfig {
    pub fn new(public_prefixes: Vec<String>, admin_prefixes: Vec<String>) -> Self {
        Self {
            public_prefixes,
            admin_prefixes,
        }
    }

    /// The routes of this service: login/refresh/logout are public (logout
    /// reads its bearer itself and must succeed without one), everything
    /// under /admin is admin-keyed.
    pub fn standard() -> Self {
        Self::new(
            vec![
                "/auth/login".to_string(),
                "/auth/refresh".to_string(),
                "/auth/logout".to_string(),
            ],
            vec!["/admin".to_string()],
        )
    }

    /// Classify a request path. Admin prefixes win over public ones.
    pub fn classify(&self, path: &str) -> RouteClass {
        if self.admin_prefixes.iter().any(|p| path.starts_with(p.as_str())) {
            return RouteClass::Admin;
        }
        if self.public_prefixes.iter().any(|p| path.starts_with(p.as_str())) {
            return RouteClass::Public;
        }
        RouteClass::Tenant
    }
}
