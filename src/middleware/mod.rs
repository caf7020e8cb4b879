use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    web, Error, HttpMessage, HttpResponse,
};
use actix_session::SessionExt;
use futures_util::future::{ok, LocalBoxFuture, Ready};
use tera::{Context, Tera};

use crate::DbPool;

pub mod auth_context;
pub mod policy;

pub use auth_context::{AdminIdentity, AuthContext};
use policy::{admin_gate, GateDecision};

pub const LOGIN_PATH: &str = "/cms/login";

/// Renders the page shown to signed-in users without the admin role.
pub fn access_denied_response(tera: Option<&Tera>, email: &str) -> HttpResponse {
    let mut ctx = Context::new();
    ctx.insert("email", email);
    match tera.map(|t| t.render("cms/access_denied.html", &ctx)) {
        Some(Ok(rendered)) => HttpResponse::Forbidden().content_type("text/html; charset=utf-8").body(rendered),
        Some(Err(err)) => {
            log::error!("Template rendering error: {}", err);
            HttpResponse::Forbidden().body("Access denied.")
        }
        None => HttpResponse::Forbidden().body("Access denied."),
    }
}

/// Runs the admin gate in front of every CMS page and action. Nothing behind
/// it executes unless the resolved context holds the admin role.
pub struct AdminGate;

impl<S, B> Transform<S, ServiceRequest> for AdminGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = AdminGateMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AdminGateMiddleware { service })
    }
}

pub struct AdminGateMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for AdminGateMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let pool = req.app_data::<web::Data<DbPool>>().map(|data| data.get_ref().clone());
        let ctx = AuthContext::resolve(&req.get_session(), pool.as_ref());

        let denied = match admin_gate(&ctx) {
            GateDecision::Allow(_) => None,
            GateDecision::RedirectToLogin => Some(
                HttpResponse::Found().append_header((header::LOCATION, LOGIN_PATH)).finish(),
            ),
            GateDecision::AccessDenied(identity) => {
                log::warn!("Non-admin {} was refused access to {}", identity.email, req.path());
                let tera = req.app_data::<web::Data<Tera>>().map(|data| data.get_ref());
                Some(access_denied_response(tera, &identity.email))
            }
            GateDecision::Resolving => Some(
                HttpResponse::ServiceUnavailable()
                    .append_header((header::RETRY_AFTER, "1"))
                    .body("Still loading your session. Please retry."),
            ),
        };

        match denied {
            None => {
                req.extensions_mut().insert(ctx);
                let fut = self.service.call(req);
                Box::pin(async move {
                    let res = fut.await?;
                    Ok(res.map_into_left_body())
                })
            }
            Some(response) => Box::pin(async move {
                let (http_req, _payload) = req.into_parts();
                Ok(ServiceResponse::new(http_req, response.map_into_right_body()))
            }),
        }
    }
}
