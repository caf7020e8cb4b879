use thiserror::Error;

use crate::middleware::auth_context::AuthContext;
use crate::models::{Identity, Role};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("Not signed in")]
    Unauthenticated,
    #[error("Missing required role '{}'", .0.as_str())]
    Forbidden(Role),
}

/// Decides whether `identity`, holding `granted_roles`, may act with `required_role`.
pub fn authorize(identity: Option<&Identity>, granted_roles: &[Role], required_role: Role) -> Result<(), AuthzError> {
    if identity.is_none() {
        return Err(AuthzError::Unauthenticated);
    }
    if granted_roles.contains(&required_role) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required_role))
    }
}

/// What the CMS does with a request, given the resolved context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow(Identity),
    RedirectToLogin,
    AccessDenied(Identity),
    /// The context has not settled yet. Not the same as signed out.
    Resolving,
}

pub fn admin_gate(ctx: &AuthContext) -> GateDecision {
    if ctx.is_resolving() {
        return GateDecision::Resolving;
    }
    let granted: &[Role] = if ctx.is_admin() { &[Role::Admin] } else { &[] };
    match (authorize(ctx.identity(), granted, Role::Admin), ctx.identity()) {
        (Ok(()), Some(identity)) => GateDecision::Allow(identity.clone()),
        (Err(AuthzError::Forbidden(_)), Some(identity)) => GateDecision::AccessDenied(identity.clone()),
        _ => GateDecision::RedirectToLogin,
    }
}
