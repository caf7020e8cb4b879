use actix_session::{Session, SessionExt};
use actix_web::{dev, web, FromRequest, HttpMessage, HttpRequest};
use rusqlite::Connection;
use serde::Serialize;
use std::future::{ready, Ready};

use crate::helper::admin_helpers::{self, HelperError};
use crate::models::db_operations::{users_db_operations, DbError};
use crate::models::{Identity, Role};
use crate::DbPool;

const SESSION_USER_KEY: &str = "user_id";
pub const INVALID_LOGIN_MESSAGE: &str = "Invalid email or password.";

/// Who is making the request, as far as the CMS is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "identity", rename_all = "snake_case")]
pub enum AuthContext {
    Uninitialized,
    Resolving,
    AuthenticatedAdmin(Identity),
    AuthenticatedNonAdmin(Identity),
    Anonymous,
}

impl AuthContext {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            AuthContext::AuthenticatedAdmin(identity) | AuthContext::AuthenticatedNonAdmin(identity) => Some(identity),
            _ => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, AuthContext::AuthenticatedAdmin(_))
    }

    pub fn is_resolving(&self) -> bool {
        matches!(self, AuthContext::Uninitialized | AuthContext::Resolving)
    }

    pub fn begin_resolution(self) -> Self {
        match self {
            AuthContext::Uninitialized => AuthContext::Resolving,
            other => other,
        }
    }

    /// Settles a resolving context. Any lookup failure lands on `Anonymous`.
    pub fn settle(self, outcome: Result<AuthContext, DbError>) -> Self {
        if !matches!(self, AuthContext::Resolving) {
            return self;
        }
        match outcome {
            Ok(ctx) if !ctx.is_resolving() => ctx,
            Ok(_) => AuthContext::Anonymous,
            Err(e) => {
                log::warn!("Could not resolve session identity, treating as anonymous: {}", e);
                AuthContext::Anonymous
            }
        }
    }

    /// Resolves the context for a request: session user id, then identity row,
    /// then the admin role.
    pub fn resolve(session: &Session, pool: Option<&DbPool>) -> Self {
        let ctx = AuthContext::Uninitialized.begin_resolution();

        let user_id = match session.get::<String>(SESSION_USER_KEY) {
            Ok(Some(id)) => id,
            Ok(None) => return ctx.settle(Ok(AuthContext::Anonymous)),
            Err(e) => {
                log::warn!("Unreadable session, treating as anonymous: {}", e);
                return ctx.settle(Ok(AuthContext::Anonymous));
            }
        };

        let outcome = match pool {
            Some(pool) => pool
                .get()
                .map_err(DbError::from)
                .and_then(|conn| lookup_identity(&conn, &user_id)),
            None => Err(DbError::NotFound("database pool".to_string())),
        };
        ctx.settle(outcome)
    }
}

/// Identity row then admin role for a session's user id. A stale id resolves
/// to `Anonymous`.
pub fn lookup_identity(conn: &Connection, user_id: &str) -> Result<AuthContext, DbError> {
    let identity = match users_db_operations::read_identity(conn, user_id)? {
        Some(identity) => identity,
        None => return Ok(AuthContext::Anonymous),
    };
    if users_db_operations::has_role(conn, &identity.id, Role::Admin)? {
        Ok(AuthContext::AuthenticatedAdmin(identity))
    } else {
        Ok(AuthContext::AuthenticatedNonAdmin(identity))
    }
}

impl FromRequest for AuthContext {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        // The admin gate stores what it already resolved.
        if let Some(ctx) = req.extensions().get::<AuthContext>() {
            return ready(Ok(ctx.clone()));
        }
        let pool = req.app_data::<web::Data<DbPool>>().map(|data| data.get_ref());
        let ctx = AuthContext::resolve(&req.get_session(), pool);
        req.extensions_mut().insert(ctx.clone());
        ready(Ok(ctx))
    }
}

/// An admin-only handler's proof that the gate allowed the request.
#[derive(Debug, Clone)]
pub struct AdminIdentity(pub Identity);

impl FromRequest for AdminIdentity {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        match req.extensions().get::<AuthContext>() {
            Some(AuthContext::AuthenticatedAdmin(identity)) => ready(Ok(AdminIdentity(identity.clone()))),
            _ => ready(Err(actix_web::error::ErrorForbidden("Admin access required."))),
        }
    }
}

fn remember(session: &Session, identity: &Identity) -> Result<(), HelperError> {
    session.renew();
    session
        .insert(SESSION_USER_KEY, &identity.id)
        .map_err(|e| HelperError::Session(e.to_string()))
}

pub fn sign_in(session: &Session, pool: &DbPool, email: &str, password: &str) -> Result<Identity, HelperError> {
    let conn = admin_helpers::get_conn(pool)?;
    match users_db_operations::verify_credentials(&conn, email.trim(), password) {
        Some(identity) => {
            remember(session, &identity)?;
            log::info!("User {} signed in", identity.email);
            Ok(identity)
        }
        None => Err(HelperError::Validation(INVALID_LOGIN_MESSAGE.to_string())),
    }
}

/// Registers a new identity (no role) and signs it in.
pub fn sign_up(
    session: &Session,
    pool: &DbPool,
    email: &str,
    password: &str,
    full_name: Option<&str>,
) -> Result<Identity, HelperError> {
    let identity = admin_helpers::create_user(pool, email, password, full_name, false)?;
    remember(session, &identity)?;
    log::info!("New user {} registered", identity.email);
    Ok(identity)
}

pub fn sign_out(session: &Session) -> AuthContext {
    session.purge();
    AuthContext::Anonymous
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::open_test_db;

    #[test]
    fn lifecycle_moves_through_resolving() {
        let ctx = AuthContext::Uninitialized;
        assert!(ctx.is_resolving());
        let ctx = ctx.begin_resolution();
        assert_eq!(ctx, AuthContext::Resolving);
        assert!(ctx.is_resolving());
        let ctx = ctx.settle(Ok(AuthContext::Anonymous));
        assert!(!ctx.is_resolving());
        assert_eq!(ctx.identity(), None);
    }

    #[test]
    fn lookup_failure_fails_closed() {
        let ctx = AuthContext::Resolving.settle(Err(DbError::NotFound("pool".to_string())));
        assert_eq!(ctx, AuthContext::Anonymous);
        assert!(!ctx.is_admin());

        // A broken roles table must not leave anyone looking like an admin.
        let mut conn = open_test_db();
        let identity = users_db_operations::create_identity_with_role(
            &mut conn, "admin@example.com", "secret123", None, Some(Role::Admin),
        )
        .unwrap();
        conn.execute_batch("DROP TABLE user_roles;").unwrap();
        let outcome = lookup_identity(&conn, &identity.id);
        assert!(outcome.is_err());
        assert_eq!(AuthContext::Resolving.settle(outcome), AuthContext::Anonymous);
    }

    #[test]
    fn lookup_distinguishes_admins_from_other_users() {
        let mut conn = open_test_db();
        let admin = users_db_operations::create_identity_with_role(
            &mut conn, "admin@example.com", "secret123", None, Some(Role::Admin),
        )
        .unwrap();
        let member = users_db_operations::register_identity(&mut conn, "member@example.com", "secret123", None).unwrap();

        assert!(lookup_identity(&conn, &admin.id).unwrap().is_admin());
        let ctx = lookup_identity(&conn, &member.id).unwrap();
        assert_eq!(ctx, AuthContext::AuthenticatedNonAdmin(member));
        assert_eq!(lookup_identity(&conn, "stale-id").unwrap(), AuthContext::Anonymous);
    }
}
