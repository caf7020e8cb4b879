use crate::config::Config;
use crate::helper::admin_helpers::HelperError;
use crate::helper::share_helpers::ShareLinks;
use crate::helper::public_helpers::Listing;
use crate::helper::{contact_helpers, public_helpers, sanitization_helpers};
use crate::models::BlogPost;
use crate::routes::public::CategoryQuery;
use crate::{AppState, DbPool};
use actix_web::{web, HttpResponse, Responder};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Deserialize)]
pub struct ContactPayload {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    organization: String,
    phone: Option<String>,
    #[serde(default)]
    message: String,
}

/// A published post as API clients see it. The stored body only leaves the
/// server rendered, as `content_html`.
#[derive(Serialize)]
struct PublicPost<'a> {
    id: &'a str,
    title: &'a str,
    slug: &'a str,
    excerpt: Option<&'a str>,
    featured_image_url: Option<&'a str>,
    category: Option<&'a str>,
    author_name: Option<&'a str>,
    published_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl<'a> From<&'a BlogPost> for PublicPost<'a> {
    fn from(post: &'a BlogPost) -> Self {
        PublicPost {
            id: &post.id,
            title: &post.title,
            slug: &post.slug,
            excerpt: post.excerpt.as_deref(),
            featured_image_url: post.featured_image_url.as_deref(),
            category: post.category.as_deref(),
            author_name: post.author_name.as_deref(),
            published_at: post.published_at,
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }
}

pub fn config_api(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/is_server_active", web::get().to(is_server_active))
            .route("/posts", web::get().to(get_posts))
            .route("/posts/categories", web::get().to(get_post_categories))
            .route("/posts/{slug}", web::get().to(get_post_by_slug))
            .route("/reports", web::get().to(get_reports))
            .route("/contact", web::post().to(post_contact)),
    );
}

fn internal_error(what: &str, e: &HelperError) -> HttpResponse {
    log::error!("Failed to fetch {}: {}", what, e);
    HttpResponse::InternalServerError().json(json!({ "error": "internal_error" }))
}

async fn is_server_active() -> impl Responder {
    HttpResponse::Ok().body("active")
}

async fn get_posts(pool: web::Data<DbPool>, query: web::Query<CategoryQuery>) -> impl Responder {
    match public_helpers::fetch_post_listing(&pool, query.category.as_deref()) {
        Ok(listing) => HttpResponse::Ok().json(Listing {
            items: listing.items.iter().map(PublicPost::from).collect::<Vec<_>>(),
            categories: listing.categories,
            selected_category: listing.selected_category,
        }),
        Err(e) => internal_error("posts", &e),
    }
}

async fn get_post_categories(pool: web::Data<DbPool>) -> impl Responder {
    match public_helpers::fetch_post_categories(&pool) {
        Ok(categories) => HttpResponse::Ok().json(categories),
        Err(e) => internal_error("post categories", &e),
    }
}

async fn get_post_by_slug(
    slug: web::Path<String>,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
) -> impl Responder {
    match public_helpers::fetch_published_post(&pool, &slug) {
        Ok(Some(post)) => {
            let url = config.post_url(&post.slug);
            let share = ShareLinks::new(&post.title, &url, post.excerpt.as_deref());
            let content_html = sanitization_helpers::render_post_content(&post.content, config.content_rendering);
            HttpResponse::Ok().json(json!({
                "post": PublicPost::from(&post),
                "content_html": content_html,
                "share": share,
            }))
        }
        Ok(None) => HttpResponse::NotFound().json(json!({ "error": "not_found" })),
        Err(e) => internal_error("post", &e),
    }
}

async fn get_reports(pool: web::Data<DbPool>, query: web::Query<CategoryQuery>) -> impl Responder {
    match public_helpers::fetch_report_listing(&pool, query.category.as_deref()) {
        Ok(listing) => HttpResponse::Ok().json(listing),
        Err(e) => internal_error("reports", &e),
    }
}

async fn post_contact(
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    payload: web::Json<ContactPayload>,
) -> impl Responder {
    let message = match contact_helpers::validate_contact(
        &payload.name,
        &payload.email,
        &payload.organization,
        payload.phone.as_deref(),
        &payload.message,
    ) {
        Ok(m) => m,
        Err(e) => return HttpResponse::BadRequest().json(json!({ "error": e.user_message() })),
    };

    match contact_helpers::submit_contact(&pool, state.notifier.as_ref(), &message).await {
        Ok(outcome) => HttpResponse::Ok().json(json!({
            "success": true,
            "submission_id": outcome.submission_id,
            "notification_delivered": outcome.notification_delivered,
        })),
        Err(e) => {
            log::error!("Failed to store contact submission from {}: {}", message.email, e);
            HttpResponse::InternalServerError().json(json!({ "error": "internal_error" }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helper::admin_helpers::{create_user, fetch_post, save_post, toggle_post, PostInput};
    use crate::test_support::{test_session_middleware, FailingNotifier, TestContext};
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use std::sync::Arc;

    #[actix_web::test]
    async fn missing_post_is_a_json_not_found() {
        let t = TestContext::new();
        let app = test::init_service(App::new().wrap(test_session_middleware()).configure(|cfg| t.configure(cfg))).await;
        let resp = test::call_service(&app, test::TestRequest::get().uri("/api/posts/does-not-exist").to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "not_found");
    }

    #[actix_web::test]
    async fn post_list_filters_by_category() {
        let t = TestContext::new();
        let admin = create_user(&t.pool, "admin@example.com", "secret123", None, true).unwrap();
        for (title, category) in [("Fiscal Outlook", "Policy"), ("Market Entry", "Markets")] {
            let id = save_post(
                &t.pool,
                &admin,
                None,
                &PostInput { title, content: "Body", category: Some(category), ..Default::default() },
            )
            .unwrap();
            toggle_post(&t.pool, &id).unwrap();
        }
        let app = test::init_service(App::new().wrap(test_session_middleware()).configure(|cfg| t.configure(cfg))).await;

        let body: serde_json::Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri("/api/posts?category=Markets").to_request()).await;
        assert_eq!(body["items"].as_array().map(|a| a.len()), Some(1));
        assert_eq!(body["items"][0]["title"], "Market Entry");
        assert_eq!(body["categories"].as_array().map(|a| a.len()), Some(2));
    }

    #[actix_web::test]
    async fn stored_post_body_is_only_served_rendered() {
        let t = TestContext::new();
        let admin = create_user(&t.pool, "admin@example.com", "secret123", None, true).unwrap();
        let id = save_post(
            &t.pool,
            &admin,
            None,
            &PostInput {
                title: "Fiscal Outlook",
                content: "<p>Body</p><script>alert(1)</script>",
                ..Default::default()
            },
        )
        .unwrap();
        toggle_post(&t.pool, &id).unwrap();
        let slug = fetch_post(&t.pool, &id).unwrap().slug;
        let app = test::init_service(App::new().wrap(test_session_middleware()).configure(|cfg| t.configure(cfg))).await;

        let body: serde_json::Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri(&format!("/api/posts/{}", slug)).to_request()).await;
        assert_eq!(body["post"]["title"], "Fiscal Outlook");
        assert!(body["post"].get("content").is_none());
        let html = body["content_html"].as_str().unwrap_or_default();
        assert!(html.contains("<p>Body</p>"));
        assert!(!html.contains("<script"));

        let listing: serde_json::Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri("/api/posts").to_request()).await;
        assert_eq!(listing["items"][0]["slug"], slug.as_str());
        assert!(listing["items"][0].get("content").is_none());
    }

    #[actix_web::test]
    async fn api_contact_reports_delivery_without_failing() {
        let t = TestContext::with_notifier(Arc::new(FailingNotifier));
        let app = test::init_service(App::new().wrap(test_session_middleware()).configure(|cfg| t.configure(cfg))).await;

        let req = test::TestRequest::post()
            .uri("/api/contact")
            .set_json(json!({
                "name": "Ada Obi",
                "email": "ada@example.com",
                "organization": "Acme Holdings",
                "message": "Hello"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["notification_delivered"], false);

        let bad = test::TestRequest::post()
            .uri("/api/contact")
            .set_json(json!({ "name": "Ada", "email": "ada@example.com", "message": "Hello" }))
            .to_request();
        assert_eq!(test::call_service(&app, bad).await.status(), StatusCode::BAD_REQUEST);
    }
}
