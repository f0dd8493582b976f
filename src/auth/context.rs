//! The resolved identity attached to an authorized request.

use axum::{extract::FromRequestParts, http::request::Parts};

use super::errors::AuthError;
use crate::db::UserRole;

/// Identity of the caller on a tenant-scoped route.
///
/// Constructed only by the authorizer after the full token, session, and
/// subscription pipeline has passed; handlers receive it as an extractor and
/// can rely on every field having been checked.
#[derive(Debug, Clone)]
pub struct Identity {
    tenant_id: i64,
    user_id: i64,
    email: String,
    role: UserRole,
    is_tenant_admin: bool,
    plan: String,
}

impl Identity {
    pub(crate) fn new(
        tenant_id: i64,
        user_id: i64,
        email: String,
        role: UserRole,
        is_tenant_admin: bool,
        plan: String,
    ) -> Self {
        Self {
            tenant_id,
            user_id,
            email,
            role,
            is_tenant_admin,
            plan,
        }
    }

    pub fn tenant_id(&self) -> i64 {
        self.tenant_id
    }

    /// 0 for the tenant-admin identity (the Account's own login).
    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn role(&self) -> UserRole {
        self.role
    }

    pub fn is_tenant_admin(&self) -> bool {
        self.is_tenant_admin
    }

    pub fn plan(&self) -> &str {
        &self.plan
    }
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Present only when the authorizer middleware ran and passed.
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or(AuthError::TokenMissing)
    }
}
