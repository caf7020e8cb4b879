//! Shared fixtures for unit and handler tests.

/// GETs a CMS page with the jar's cookies, keeps whatever cookies it sets and
/// returns the CSRF token rendered into the page.
macro_rules! csrf_token_from {
    ($app:expr, $jar:expr, $uri:expr) => {{
        let req = $jar.attach(actix_web::test::TestRequest::get().uri($uri)).to_request();
        let resp = actix_web::test::call_service($app, req).await;
        $jar.absorb(&resp);
        let body = $crate::test_support::read_html(resp).await;
        $crate::test_support::csrf_token(&body)
    }};
}

/// POSTs a URL-encoded body with the jar's cookies and keeps the cookies the
/// response sets.
macro_rules! post_form {
    ($app:expr, $jar:expr, $uri:expr, $body:expr) => {{
        let req = $jar
            .attach(actix_web::test::TestRequest::post().uri($uri))
            .insert_header(("content-type", "application/x-www-form-urlencoded"))
            .set_payload($body)
            .to_request();
        let resp = actix_web::test::call_service($app, req).await;
        $jar.absorb(&resp);
        resp
    }};
}

/// Signs in through the login form. Yields the cookie jar, the CSRF token
/// and the sign-in response.
macro_rules! cms_sign_in {
    ($app:expr, $email:expr, $password:expr) => {{
        let mut jar = $crate::test_support::TestCookies::default();
        let token = csrf_token_from!($app, jar, "/cms/login");
        let body = $crate::test_support::with_csrf(
            &token,
            &format!("email={}&password={}", urlencoding::encode($email), urlencoding::encode($password)),
        );
        let resp = post_form!($app, jar, "/cms/login", body);
        (jar, token, resp)
    }};
}

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use actix_session::{storage::CookieSessionStore, SessionMiddleware};
use actix_web::cookie::{Cookie, Key};
use actix_web::dev::ServiceResponse;
use actix_web::test::TestRequest;
use actix_web::web;
use async_trait::async_trait;
use rusqlite::Connection;
use tera::Tera;
use uuid::Uuid;

use crate::config::{Config, ContentRendering, WebConfig};
use crate::helper::email_helpers::{ContactNotifier, NotifyError};
use crate::helper::storage_helpers::LocalMediaStorage;
use crate::models::ContactMessage;
use crate::setup::db_setup::setup_site_db;
use crate::{build_pool, AppState, DbPool};

/// In-memory database with the full schema.
pub fn open_test_db() -> Connection {
    let mut conn = Connection::open_in_memory().expect("in-memory database");
    conn.execute_batch("PRAGMA foreign_keys = ON;").expect("foreign keys");
    setup_site_db(&mut conn).expect("schema");
    conn
}

/// A pool over a fresh database file. Each pooled connection sees the same data,
/// which an in-memory database would not give us.
pub fn test_pool() -> DbPool {
    let path = std::env::temp_dir().join(format!("pathsite-test-{}.db", Uuid::new_v4()));
    let pool = build_pool(&path).expect("test pool");
    let mut conn = pool.get().expect("test connection");
    setup_site_db(&mut conn).expect("schema");
    pool
}

pub fn sample_contact() -> ContactMessage {
    ContactMessage {
        name: "Ada Obi".to_string(),
        email: "ada@example.com".to_string(),
        organization: "Acme Holdings".to_string(),
        phone: Some("+234 800 000 0000".to_string()),
        message: "We would like to discuss a market entry study.".to_string(),
    }
}

pub fn test_media_dir() -> PathBuf {
    std::env::temp_dir().join(format!("pathsite-media-{}", Uuid::new_v4()))
}

pub fn test_config() -> Config {
    Config {
        web: WebConfig { host: "127.0.0.1".to_string(), port: 0 },
        database_path: std::env::temp_dir().display().to_string(),
        media_path: test_media_dir().display().to_string(),
        templates_dir: concat!(env!("CARGO_MANIFEST_DIR"), "/templates").to_string(),
        site_url: "https://pathstrategy.test".to_string(),
        allowed_origins: String::new(),
        log_level: "info".to_string(),
        session_secret_key: "ab".repeat(64),
        use_secure_cookies: false,
        content_rendering: ContentRendering::Sanitize,
        max_upload_size_mb: 1,
        resend_api_key: None,
        notification_email_to: "info@pathstrategy.test".to_string(),
        email_from: "Path Strategy Consulting <onboarding@resend.dev>".to_string(),
    }
}

pub fn test_tera() -> Tera {
    crate::load_templates(concat!(env!("CARGO_MANIFEST_DIR"), "/templates")).expect("templates")
}

pub fn test_session_middleware() -> SessionMiddleware<CookieSessionStore> {
    SessionMiddleware::builder(CookieSessionStore::default(), Key::from(&[7u8; 64]))
        .cookie_secure(false)
        .build()
}

/// Notifier that records recipients and always succeeds.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn sent_to(&self) -> Vec<String> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ContactNotifier for RecordingNotifier {
    async fn notify(&self, message: &ContactMessage) -> Result<(), NotifyError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(message.email.clone());
        }
        Ok(())
    }
}

/// Notifier whose provider never answers.
pub struct HangingNotifier;

#[async_trait]
impl ContactNotifier for HangingNotifier {
    async fn notify(&self, _message: &ContactMessage) -> Result<(), NotifyError> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

/// Notifier whose provider always rejects the request.
pub struct FailingNotifier;

#[async_trait]
impl ContactNotifier for FailingNotifier {
    async fn notify(&self, _message: &ContactMessage) -> Result<(), NotifyError> {
        Err(NotifyError::Rejected { status: 503, body: "provider unavailable".to_string() })
    }
}

/// Everything a handler test needs registered as app data.
pub struct TestContext {
    pub pool: DbPool,
    pub config: Config,
    pub tera: Tera,
    pub state: web::Data<AppState>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_notifier(Arc::new(RecordingNotifier::default()))
    }

    pub fn with_notifier(notifier: Arc<dyn ContactNotifier>) -> Self {
        let config = test_config();
        let storage = Arc::new(LocalMediaStorage::new(&config.media_path, "/media"));
        TestContext {
            pool: test_pool(),
            tera: test_tera(),
            state: web::Data::new(AppState { storage, notifier }),
            config,
        }
    }

    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(web::Data::new(self.pool.clone()))
            .app_data(web::Data::new(self.config.clone()))
            .app_data(web::Data::new(self.tera.clone()))
            .app_data(self.state.clone());
        crate::routes::configure(cfg);
    }
}

/// The session cookie set by a response, for replaying on the next request.
pub fn session_cookie<B>(resp: &ServiceResponse<B>) -> Option<Cookie<'static>> {
    resp.response().cookies().find(|c| c.name() == "id").map(|c| c.into_owned())
}

pub fn location<B>(resp: &ServiceResponse<B>) -> Option<String> {
    resp.headers()
        .get(actix_web::http::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Response body with HTML entities decoded, so assertions can use plain text.
pub async fn read_html<B>(resp: ServiceResponse<B>) -> String
where
    B: actix_web::body::MessageBody,
{
    let body = actix_web::test::read_body(resp).await;
    html_escape::decode_html_entities(&String::from_utf8_lossy(&body)).to_string()
}

/// Cookies carried from one test request to the next, the way a browser would.
#[derive(Default, Clone)]
pub struct TestCookies(Vec<Cookie<'static>>);

impl TestCookies {
    pub fn absorb<B>(&mut self, resp: &ServiceResponse<B>) {
        for cookie in resp.response().cookies() {
            self.0.retain(|kept| kept.name() != cookie.name());
            if !cookie.value().is_empty() {
                self.0.push(cookie.into_owned());
            }
        }
    }

    pub fn attach(&self, req: TestRequest) -> TestRequest {
        self.0.iter().cloned().fold(req, |req, cookie| req.cookie(cookie))
    }
}

/// Value of the first `csrf_token` hidden field in a rendered page.
pub fn csrf_token(body: &str) -> String {
    body.split("name=\"csrf_token\" value=\"")
        .nth(1)
        .and_then(|rest| rest.split('"').next())
        .expect("csrf token in page")
        .to_string()
}

/// Prefixes a URL-encoded body with the CSRF token field.
pub fn with_csrf(token: &str, body: &str) -> String {
    if body.is_empty() {
        format!("csrf_token={}", urlencoding::encode(token))
    } else {
        format!("csrf_token={}&{}", urlencoding::encode(token), body)
    }
}
