use crate::config::Config;
use crate::helper::admin_helpers::{self, HelperError, ReportInput};
use crate::helper::form_helpers::{self, GuardedForm};
use crate::helper::storage_helpers;
use crate::middleware::AdminIdentity;
use crate::routes::cms_blog::DELETE_CONFIRMATION;
use crate::routes::{redirect, render, set_notification, take_notification};
use crate::{AppState, DbPool};
use actix_csrf::extractor::{Csrf, CsrfToken};
use actix_multipart::Multipart;
use actix_session::Session;
use actix_web::{web, Responder};
use serde::{Deserialize, Serialize};
use tera::{Context, Tera};

const REPORTS_PATH: &str = "/cms/reports";
const PENDING_FILE_KEY: &str = "pending_report_file";

/// A freshly uploaded file waiting to be attached to a report. `report_id` is
/// the report being edited when the upload happened, or `None` for a new one.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PendingFile {
    pub report_id: Option<String>,
    pub file_url: String,
    pub file_name: String,
}

#[derive(Deserialize)]
pub struct EditQuery {
    pub edit: Option<String>,
}

pub fn config_reports(cfg: &mut web::ServiceConfig) {
    cfg.route("/reports", web::get().to(show_report_editor))
        .route("/reports/upload", web::post().to(upload_report_file))
        .route("/reports/save", web::post().to(save_report_action))
        .route("/reports/{id}/publish", web::post().to(toggle_publish_action))
        .route("/reports/{id}/delete", web::post().to(delete_report_action));
}

fn report_failure(session: &Session, action: &str, e: &HelperError) {
    match e {
        HelperError::Validation(_) | HelperError::NotFound(_) => {}
        _ => log::error!("Failed to {}: {}", action, e),
    }
    set_notification(session, &e.user_message(), "error");
}

/// The pending upload for the report open in the editor. An upload made for a
/// different report is dropped from the session.
fn pending_file_for(session: &Session, report_id: Option<&str>) -> Option<PendingFile> {
    let pending = session.get::<PendingFile>(PENDING_FILE_KEY).unwrap_or(None)?;
    if pending.report_id.as_deref() == report_id {
        return Some(pending);
    }
    log::info!("Discarding pending report file {} uploaded for another report", pending.file_url);
    session.remove(PENDING_FILE_KEY);
    None
}

async fn show_report_editor(
    admin: AdminIdentity,
    session: Session,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    query: web::Query<EditQuery>,
    token: CsrfToken,
) -> impl Responder {
    let mut ctx = Context::new();
    ctx.insert("admin", &admin.0);
    ctx.insert("section", "reports");
    ctx.insert("csrf_token", token.get());
    take_notification(&session, &mut ctx);

    match admin_helpers::fetch_all_reports(&pool) {
        Ok(reports) => ctx.insert("reports", &reports),
        Err(e) => {
            log::error!("Failed to fetch reports: {}", e);
            ctx.insert("reports", &Vec::<String>::new());
        }
    }

    let editing = match query.edit.as_deref() {
        Some(id) => match admin_helpers::fetch_report(&pool, id) {
            Ok(report) => Some(report),
            Err(e) => {
                report_failure(&session, "load report", &e);
                return redirect(REPORTS_PATH);
            }
        },
        None => None,
    };
    ctx.insert("editing", &editing);
    ctx.insert("pending_file", &pending_file_for(&session, query.edit.as_deref()));
    render(&tera, "cms/reports.html", &ctx)
}

async fn upload_report_file(
    admin: AdminIdentity,
    session: Session,
    state: web::Data<AppState>,
    config: web::Data<Config>,
    query: web::Query<EditQuery>,
    payload: Multipart,
) -> impl Responder {
    let back = match query.edit.as_deref() {
        Some(id) => format!("{}?edit={}", REPORTS_PATH, id),
        None => REPORTS_PATH.to_string(),
    };

    let stored = match storage_helpers::read_report_upload(payload, config.max_upload_size_bytes()).await {
        Ok(upload) => storage_helpers::store_report_upload(state.storage.clone(), upload).await,
        Err(e) => Err(e),
    };

    match stored {
        Ok((file_url, file_name)) => {
            log::info!("Admin {} uploaded report file {}", admin.0.email, file_url);
            let pending = PendingFile { report_id: query.edit.clone(), file_url, file_name };
            if let Err(e) = session.insert(PENDING_FILE_KEY, &pending) {
                log::error!("Failed to remember uploaded file in session: {}", e);
            }
            set_notification(&session, "Your file has been uploaded successfully.", "success");
        }
        Err(e) => report_failure(&session, "upload report file", &HelperError::Storage(e)),
    }
    redirect(&back)
}

async fn save_report_action(
    admin: AdminIdentity,
    session: Session,
    pool: web::Data<DbPool>,
    form: Csrf<web::Form<GuardedForm>>,
) -> impl Responder {
    let form = form.into_inner();
    let parsed = &form.fields;
    let report_id = form_helpers::optional_field(parsed, "id");
    let input = ReportInput {
        title: form_helpers::field(parsed, "title"),
        description: form_helpers::optional_field(parsed, "description"),
        category: form_helpers::optional_field(parsed, "category"),
        file_url: form_helpers::optional_field(parsed, "file_url"),
        file_name: form_helpers::optional_field(parsed, "file_name"),
    };

    match admin_helpers::save_report(&pool, &admin.0, report_id, &input) {
        Ok(id) => {
            session.remove(PENDING_FILE_KEY);
            let verb = if report_id.is_some() { "Updated" } else { "Created" };
            log::info!("Admin {} saved report {}", admin.0.email, id);
            set_notification(&session, &format!("Report {}", verb), "success");
            redirect(REPORTS_PATH)
        }
        Err(e) => {
            report_failure(&session, "save report", &e);
            match report_id {
                Some(id) => redirect(&format!("{}?edit={}", REPORTS_PATH, id)),
                None => redirect(REPORTS_PATH),
            }
        }
    }
}

async fn toggle_publish_action(
    admin: AdminIdentity,
    id: web::Path<String>,
    session: Session,
    pool: web::Data<DbPool>,
    _form: Csrf<web::Form<GuardedForm>>,
) -> impl Responder {
    match admin_helpers::toggle_report(&pool, &id) {
        Ok(state) => {
            let message = if state.is_published() { "Report Published" } else { "Report Unpublished" };
            log::info!("Admin {}: {} ({})", admin.0.email, message, id);
            set_notification(&session, message, "success");
        }
        Err(e) => report_failure(&session, "toggle report", &e),
    }
    redirect(REPORTS_PATH)
}

async fn delete_report_action(
    admin: AdminIdentity,
    id: web::Path<String>,
    session: Session,
    pool: web::Data<DbPool>,
    form: Csrf<web::Form<GuardedForm>>,
) -> impl Responder {
    let form = form.into_inner();
    if form_helpers::field(&form.fields, "confirm") != DELETE_CONFIRMATION {
        set_notification(&session, "Type DELETE to confirm deletion.", "error");
        return redirect(REPORTS_PATH);
    }

    match admin_helpers::delete_report(&pool, &id) {
        Ok(()) => {
            log::info!("Admin {} deleted report {}", admin.0.email, id);
            set_notification(&session, "Report Deleted", "success");
        }
        Err(e) => report_failure(&session, "delete report", &e),
    }
    redirect(REPORTS_PATH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{csrf_token, location, read_html, test_session_middleware, with_csrf, TestContext};
    use actix_web::http::StatusCode;
    use actix_web::{test, App};

    const BOUNDARY: &str = "pathsite-test-boundary";

    fn multipart_body(content_type: &str, bytes: &[u8]) -> Vec<u8> {
        let mut body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"Outlook 2024.pdf\"\r\nContent-Type: {ct}\r\n\r\n",
            b = BOUNDARY,
            ct = content_type
        )
        .into_bytes();
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn upload_request(uri: &str, content_type: &str, bytes: &[u8]) -> test::TestRequest {
        test::TestRequest::post()
            .uri(uri)
            .insert_header(("content-type", format!("multipart/form-data; boundary={}", BOUNDARY)))
            .set_payload(multipart_body(content_type, bytes))
    }

    fn form_file_url(body: &str) -> Option<String> {
        body.split("name=\"file_url\" value=\"")
            .nth(1)
            .and_then(|rest| rest.split('"').next())
            .map(str::to_string)
    }

    #[actix_web::test]
    async fn upload_then_save_creates_a_draft_report() {
        let t = TestContext::new();
        admin_helpers::create_user(&t.pool, "admin@example.com", "secret123", None, true).unwrap();
        let app = test::init_service(App::new().wrap(test_session_middleware()).configure(|cfg| t.configure(cfg))).await;

        let (mut jar, _, _) = cms_sign_in!(&app, "admin@example.com", "secret123");
        let token = csrf_token_from!(&app, jar, REPORTS_PATH);

        // Saving before any upload is refused.
        let resp = post_form!(&app, jar, "/cms/reports/save", with_csrf(&token, "title=Annual+Outlook"));
        assert_eq!(location(&resp).as_deref(), Some(REPORTS_PATH));
        assert!(admin_helpers::fetch_all_reports(&t.pool).unwrap().is_empty());

        let resp = test::call_service(
            &app,
            jar.attach(upload_request("/cms/reports/upload", "application/pdf", b"%PDF-1.7 test")).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        jar.absorb(&resp);

        let resp = test::call_service(&app, jar.attach(test::TestRequest::get().uri(REPORTS_PATH)).to_request()).await;
        jar.absorb(&resp);
        let body = read_html(resp).await;
        assert!(body.contains("/media/reports/"));
        assert!(body.contains("Outlook 2024.pdf"));

        let token = csrf_token(&body);
        let pending_url = form_file_url(&body).expect("pending file url in form");
        let payload = format!(
            "title=Annual+Outlook&category=Economy&file_url={}&file_name=Outlook+2024.pdf",
            urlencoding::encode(&pending_url)
        );
        post_form!(&app, jar, "/cms/reports/save", with_csrf(&token, &payload));

        let reports = admin_helpers::fetch_all_reports(&t.pool).unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].file_url, pending_url);
        assert_eq!(reports[0].file_name, "Outlook 2024.pdf");
        assert!(!reports[0].published);
    }

    #[actix_web::test]
    async fn an_upload_only_attaches_to_the_report_it_was_made_for() {
        let t = TestContext::new();
        let admin = admin_helpers::create_user(&t.pool, "admin@example.com", "secret123", None, true).unwrap();
        let existing = admin_helpers::save_report(
            &t.pool,
            &admin,
            None,
            &ReportInput {
                title: "Existing Report",
                file_url: Some("/media/reports/existing.pdf"),
                file_name: Some("existing.pdf"),
                ..Default::default()
            },
        )
        .unwrap();
        let app = test::init_service(App::new().wrap(test_session_middleware()).configure(|cfg| t.configure(cfg))).await;
        let (mut jar, _, _) = cms_sign_in!(&app, "admin@example.com", "secret123");
        let edit_path = format!("{}?edit={}", REPORTS_PATH, existing);

        // Uploaded for a new report, then abandoned.
        let resp = test::call_service(
            &app,
            jar.attach(upload_request("/cms/reports/upload", "application/pdf", b"%PDF-1.7 other")).to_request(),
        )
        .await;
        jar.absorb(&resp);

        let resp = test::call_service(&app, jar.attach(test::TestRequest::get().uri(&edit_path)).to_request()).await;
        jar.absorb(&resp);
        let body = read_html(resp).await;
        assert_eq!(form_file_url(&body).as_deref(), Some("/media/reports/existing.pdf"));

        // Opening another report dropped the abandoned upload.
        let resp = test::call_service(&app, jar.attach(test::TestRequest::get().uri(REPORTS_PATH)).to_request()).await;
        jar.absorb(&resp);
        let body = read_html(resp).await;
        assert_eq!(form_file_url(&body), None);

        // An upload made while editing replaces that report's file.
        let resp = test::call_service(
            &app,
            jar.attach(upload_request(&format!("/cms/reports/upload?edit={}", existing), "application/pdf", b"%PDF-1.7 new"))
                .to_request(),
        )
        .await;
        jar.absorb(&resp);
        let resp = test::call_service(&app, jar.attach(test::TestRequest::get().uri(&edit_path)).to_request()).await;
        jar.absorb(&resp);
        let body = read_html(resp).await;
        let replacement = form_file_url(&body).expect("file url in form");
        assert!(replacement.starts_with("/media/reports/"));
        assert_ne!(replacement, "/media/reports/existing.pdf");

        let token = csrf_token(&body);
        let payload = format!(
            "id={}&title=Existing+Report&file_url={}&file_name=Outlook+2024.pdf",
            existing,
            urlencoding::encode(&replacement)
        );
        post_form!(&app, jar, "/cms/reports/save", with_csrf(&token, &payload));
        assert_eq!(admin_helpers::fetch_report(&t.pool, &existing).unwrap().file_url, replacement);
    }

    #[actix_web::test]
    async fn unsupported_upload_types_are_rejected() {
        let t = TestContext::new();
        admin_helpers::create_user(&t.pool, "admin@example.com", "secret123", None, true).unwrap();
        let app = test::init_service(App::new().wrap(test_session_middleware()).configure(|cfg| t.configure(cfg))).await;

        let (mut jar, _, _) = cms_sign_in!(&app, "admin@example.com", "secret123");
        let resp = test::call_service(
            &app,
            jar.attach(upload_request("/cms/reports/upload", "text/html", b"<script></script>")).to_request(),
        )
        .await;
        jar.absorb(&resp);

        let resp = test::call_service(&app, jar.attach(test::TestRequest::get().uri(REPORTS_PATH)).to_request()).await;
        let body = read_html(resp).await;
        assert!(body.contains("Unsupported file type"));
        assert!(!body.contains("/media/reports/"));
    }
}
