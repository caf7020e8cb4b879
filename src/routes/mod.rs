use actix_csrf::CsrfMiddleware;
use actix_session::Session;
use actix_web::http::{header, Method, StatusCode};
use actix_web::{web, HttpResponse};
use rand::rngs::StdRng;
use tera::{Context, Tera};

use crate::middleware::AdminGate;
use crate::models::Notification;

pub mod api;
pub mod cms;
pub mod cms_blog;
pub mod cms_reports;
pub mod public;

/// Largest URL-encoded CMS form accepted. Blog bodies travel in these.
const CMS_FORM_LIMIT: usize = 2 * 1024 * 1024;

/// Pages that render CSRF-guarded forms. Visiting one issues a fresh token cookie.
const CSRF_FORM_PAGES: [&str; 4] = ["/cms/login", "/cms/blog", "/cms/reports", "/cms/users"];

fn cms_csrf() -> CsrfMiddleware<StdRng> {
    CSRF_FORM_PAGES
        .iter()
        .fold(CsrfMiddleware::<StdRng>::new(), |csrf, page| csrf.set_cookie(Method::GET, *page))
}

/// Registers every route of the site. Everything under `/cms` except the
/// sign-in endpoints sits behind the admin gate.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.configure(api::config_api)
        .configure(public::config_public)
        .service(
            web::scope("/cms")
                .wrap(cms_csrf())
                .app_data(web::FormConfig::default().limit(CMS_FORM_LIMIT))
                .configure(cms::config_auth)
                .service(
                    web::scope("")
                        .wrap(AdminGate)
                        .configure(cms::config_dashboard)
                        .configure(cms_blog::config_blog)
                        .configure(cms_reports::config_reports),
                ),
        );
}

pub(crate) fn set_notification(session: &Session, message: &str, r#type: &str) {
    let notification = Notification { message: message.to_string(), r#type: r#type.to_string() };
    if let Err(e) = session.insert("notification", &notification) {
        log::error!("Failed to store notification in session: {}", e);
    }
}

/// Moves a pending notification into the page context, once.
pub(crate) fn take_notification(session: &Session, ctx: &mut Context) {
    match session.get::<Notification>("notification") {
        Ok(Some(notification)) => {
            ctx.insert("notification", &notification);
            session.remove("notification");
        }
        _ => ctx.insert("notification", &Option::<Notification>::None),
    }
}

pub(crate) fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found().append_header((header::LOCATION, location)).finish()
}

pub(crate) fn render_with_status(tera: &Tera, status: StatusCode, template: &str, ctx: &Context) -> HttpResponse {
    match tera.render(template, ctx) {
        Ok(rendered) => HttpResponse::build(status).content_type("text/html; charset=utf-8").body(rendered),
        Err(err) => {
            log::error!("Template rendering error in {}: {}", template, err);
            HttpResponse::InternalServerError().body("Error rendering page.")
        }
    }
}

pub(crate) fn render(tera: &Tera, template: &str, ctx: &Context) -> HttpResponse {
    render_with_status(tera, StatusCode::OK, template, ctx)
}
