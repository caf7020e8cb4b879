use crate::helper::form_helpers::{self, GuardedForm};
use crate::helper::admin_helpers;
use crate::middleware::auth_context::{self, AdminIdentity};
use crate::middleware::{AuthContext, LOGIN_PATH};
use crate::routes::{redirect, render, set_notification, take_notification};
use crate::DbPool;
use actix_csrf::extractor::{Csrf, CsrfToken};
use actix_session::Session;
use actix_web::{web, Responder};
use tera::{Context, Tera};

const DASHBOARD_PATH: &str = "/cms";
const USERS_PATH: &str = "/cms/users";
const SUBMISSIONS_PATH: &str = "/cms/submissions";

pub fn config_auth(cfg: &mut web::ServiceConfig) {
    cfg.route("/login", web::get().to(show_login_form))
        .route("/login", web::post().to(handle_login))
        .route("/signup", web::post().to(handle_signup))
        .route("/logout", web::post().to(handle_logout));
}

pub fn config_dashboard(cfg: &mut web::ServiceConfig) {
    cfg.route("", web::get().to(show_dashboard))
        .route("/", web::get().to(show_dashboard))
        .route("/submissions", web::get().to(show_submissions))
        .route("/submissions/{id}", web::get().to(show_submission))
        .route("/users", web::get().to(show_users))
        .route("/users/create", web::post().to(create_user_action))
        .route("/users/{user_id}/toggle_admin", web::post().to(toggle_admin_action));
}

fn admin_context(session: &Session, admin: &AdminIdentity, section: &str) -> Context {
    let mut ctx = Context::new();
    ctx.insert("admin", &admin.0);
    ctx.insert("section", section);
    take_notification(session, &mut ctx);
    ctx
}

async fn show_login_form(
    session: Session,
    auth: AuthContext,
    tera: web::Data<Tera>,
    token: CsrfToken,
) -> impl Responder {
    if auth.is_admin() {
        return redirect(DASHBOARD_PATH);
    }
    let mut ctx = Context::new();
    ctx.insert("csrf_token", token.get());
    ctx.insert("signed_in_as", &auth.identity().map(|i| i.email.clone()));
    take_notification(&session, &mut ctx);
    render(&tera, "cms/login.html", &ctx)
}

async fn handle_login(session: Session, pool: web::Data<DbPool>, form: Csrf<web::Form<GuardedForm>>) -> impl Responder {
    let form = form.into_inner();
    let parsed = &form.fields;
    let email = form_helpers::field(parsed, "email");
    let password = parsed.get("password").map(String::as_str).unwrap_or("");

    match auth_context::sign_in(&session, &pool, email, password) {
        Ok(_) => redirect(DASHBOARD_PATH),
        Err(e @ admin_helpers::HelperError::Validation(_)) => {
            log::warn!("Failed sign-in attempt for {}", email);
            set_notification(&session, &e.user_message(), "error");
            redirect(LOGIN_PATH)
        }
        Err(e) => {
            log::error!("Sign-in failed for {}: {}", email, e);
            set_notification(&session, &e.user_message(), "error");
            redirect(LOGIN_PATH)
        }
    }
}

async fn handle_signup(session: Session, pool: web::Data<DbPool>, form: Csrf<web::Form<GuardedForm>>) -> impl Responder {
    let form = form.into_inner();
    let parsed = &form.fields;
    let email = form_helpers::field(parsed, "email");
    let password = parsed.get("password").map(String::as_str).unwrap_or("");
    let full_name = form_helpers::optional_field(parsed, "full_name");

    match auth_context::sign_up(&session, &pool, email, password, full_name) {
        // A fresh account has no role; the gate shows the access-denied page.
        Ok(_) => redirect(DASHBOARD_PATH),
        Err(e) => {
            if !matches!(e, admin_helpers::HelperError::Validation(_)) {
                log::error!("Sign-up failed for {}: {}", email, e);
            }
            set_notification(&session, &e.user_message(), "error");
            redirect(LOGIN_PATH)
        }
    }
}

async fn handle_logout(session: Session, auth: AuthContext) -> impl Responder {
    if let Some(identity) = auth.identity() {
        log::info!("User {} signed out", identity.email);
    }
    auth_context::sign_out(&session);
    redirect(LOGIN_PATH)
}

async fn show_dashboard(
    admin: AdminIdentity,
    session: Session,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
) -> impl Responder {
    let mut ctx = admin_context(&session, &admin, "dashboard");
    match admin_helpers::dashboard_stats(&pool) {
        Ok(stats) => ctx.insert("stats", &stats),
        Err(e) => {
            log::error!("Failed to load dashboard stats: {}", e);
            ctx.insert("stats", &crate::models::DashboardStats::default());
        }
    }
    render(&tera, "cms/dashboard.html", &ctx)
}

async fn show_submissions(
    admin: AdminIdentity,
    session: Session,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
) -> impl Responder {
    let mut ctx = admin_context(&session, &admin, "submissions");
    match admin_helpers::fetch_all_submissions(&pool) {
        Ok(submissions) => ctx.insert("submissions", &submissions),
        Err(e) => {
            log::error!("Failed to fetch submissions: {}", e);
            ctx.insert("submissions", &Vec::<String>::new());
            ctx.insert("notification", &crate::models::Notification {
                message: "Failed to load submissions.".to_string(),
                r#type: "error".to_string(),
            });
        }
    }
    render(&tera, "cms/submissions.html", &ctx)
}

async fn show_submission(
    admin: AdminIdentity,
    id: web::Path<String>,
    session: Session,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
) -> impl Responder {
    match admin_helpers::open_submission(&pool, &id) {
        Ok(submission) => {
            let mut ctx = admin_context(&session, &admin, "submissions");
            ctx.insert("submission", &submission);
            render(&tera, "cms/submission.html", &ctx)
        }
        Err(e @ admin_helpers::HelperError::NotFound(_)) => {
            set_notification(&session, &e.user_message(), "error");
            redirect(SUBMISSIONS_PATH)
        }
        Err(e) => {
            log::error!("Failed to open submission {}: {}", id, e);
            set_notification(&session, &e.user_message(), "error");
            redirect(SUBMISSIONS_PATH)
        }
    }
}

async fn show_users(
    admin: AdminIdentity,
    session: Session,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    token: CsrfToken,
) -> impl Responder {
    let mut ctx = admin_context(&session, &admin, "users");
    ctx.insert("csrf_token", token.get());
    match admin_helpers::list_users_with_roles(&pool) {
        Ok(users) => ctx.insert("users", &users),
        Err(e) => {
            log::error!("Failed to fetch users: {}", e);
            ctx.insert("users", &Vec::<String>::new());
        }
    }
    render(&tera, "cms/users.html", &ctx)
}

async fn create_user_action(
    admin: AdminIdentity,
    session: Session,
    pool: web::Data<DbPool>,
    form: Csrf<web::Form<GuardedForm>>,
) -> impl Responder {
    let form = form.into_inner();
    let parsed = &form.fields;
    let email = form_helpers::field(parsed, "email");
    let password = parsed.get("password").map(String::as_str).unwrap_or("");
    let full_name = form_helpers::optional_field(parsed, "full_name");
    let make_admin = parsed.contains_key("is_admin");

    match admin_helpers::create_user(&pool, email, password, full_name, make_admin) {
        Ok(identity) => {
            log::info!("Admin {} created user {} (admin: {})", admin.0.email, identity.email, make_admin);
            set_notification(&session, &format!("User '{}' created successfully.", identity.email), "success");
        }
        Err(e) => {
            if !matches!(e, admin_helpers::HelperError::Validation(_)) {
                log::error!("Failed to create user '{}': {}", email, e);
            }
            set_notification(&session, &e.user_message(), "error");
        }
    }
    redirect(USERS_PATH)
}

async fn toggle_admin_action(
    admin: AdminIdentity,
    user_id: web::Path<String>,
    session: Session,
    pool: web::Data<DbPool>,
    _form: Csrf<web::Form<GuardedForm>>,
) -> impl Responder {
    match admin_helpers::toggle_admin_role(&pool, &admin.0, &user_id) {
        Ok(true) => {
            log::info!("Admin {} granted admin role to {}", admin.0.email, user_id);
            set_notification(&session, "Admin Role Added", "success");
        }
        Ok(false) => {
            log::info!("Admin {} removed admin role from {}", admin.0.email, user_id);
            set_notification(&session, "Admin Role Removed", "success");
        }
        Err(e @ (admin_helpers::HelperError::Forbidden(_) | admin_helpers::HelperError::NotFound(_))) => {
            set_notification(&session, &e.user_message(), "error");
        }
        Err(e) => {
            log::error!("Failed to toggle admin role for {}: {}", user_id, e);
            set_notification(&session, &e.user_message(), "error");
        }
    }
    redirect(USERS_PATH)
}
