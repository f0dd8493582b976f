//! Request authorization.
//!
//! Every inbound request passes through the authorizer middleware first.
//! Routes are classified by static prefix match before any token work:
//! public and admin-keyed routes never touch the token pipeline. Tenant
//! routes must present a bearer access token that (1) verifies
//! cryptographically, (2) still has a session record in the revocable
//! store, and (3) belongs to a tenant whose subscription allows access.
//! Only then is a typed identity context attached for downstream handlers.

mod authorizer;
mod context;
mod errors;
mod routes;

pub use authorizer::{Authorizer, authorize_request, bearer_token};
pub use context::Identity;
pub use errors::AuthError;
pub use routes::{RouteClass, RouteConfig};
