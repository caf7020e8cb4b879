use crate::helper::admin_helpers::{self, HelperError, PostInput};
use crate::helper::form_helpers::{self, GuardedForm};
use crate::middleware::AdminIdentity;
use crate::routes::{redirect, render, set_notification, take_notification};
use crate::DbPool;
use actix_csrf::extractor::{Csrf, CsrfToken};
use actix_session::Session;
use actix_web::{web, Responder};
use serde::Deserialize;
use tera::{Context, Tera};

const BLOG_PATH: &str = "/cms/blog";
pub const DELETE_CONFIRMATION: &str = "DELETE";

#[derive(Deserialize)]
pub struct EditQuery {
    pub edit: Option<String>,
}

pub fn config_blog(cfg: &mut web::ServiceConfig) {
    cfg.route("/blog", web::get().to(show_blog_editor))
        .route("/blog/save", web::post().to(save_post_action))
        .route("/blog/{id}/publish", web::post().to(toggle_publish_action))
        .route("/blog/{id}/delete", web::post().to(delete_post_action));
}

fn report_failure(session: &Session, action: &str, e: &HelperError) {
    match e {
        HelperError::Validation(_) | HelperError::NotFound(_) => {}
        _ => log::error!("Failed to {}: {}", action, e),
    }
    set_notification(session, &e.user_message(), "error");
}

async fn show_blog_editor(
    admin: AdminIdentity,
    session: Session,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    query: web::Query<EditQuery>,
    token: CsrfToken,
) -> impl Responder {
    let mut ctx = Context::new();
    ctx.insert("admin", &admin.0);
    ctx.insert("section", "blog");
    ctx.insert("csrf_token", token.get());
    take_notification(&session, &mut ctx);

    match admin_helpers::fetch_all_posts(&pool) {
        Ok(posts) => ctx.insert("posts", &posts),
        Err(e) => {
            log::error!("Failed to fetch blog posts: {}", e);
            ctx.insert("posts", &Vec::<String>::new());
        }
    }

    let editing = match query.edit.as_deref() {
        Some(id) => match admin_helpers::fetch_post(&pool, id) {
            Ok(post) => Some(post),
            Err(e) => {
                report_failure(&session, "load blog post", &e);
                return redirect(BLOG_PATH);
            }
        },
        None => None,
    };
    ctx.insert("editing", &editing);
    render(&tera, "cms/blog.html", &ctx)
}

async fn save_post_action(
    admin: AdminIdentity,
    session: Session,
    pool: web::Data<DbPool>,
    form: Csrf<web::Form<GuardedForm>>,
) -> impl Responder {
    let form = form.into_inner();
    let parsed = &form.fields;
    let post_id = form_helpers::optional_field(parsed, "id");
    let input = PostInput {
        title: form_helpers::field(parsed, "title"),
        slug: form_helpers::optional_field(parsed, "slug"),
        excerpt: form_helpers::optional_field(parsed, "excerpt"),
        content: parsed.get("content").map(String::as_str).unwrap_or(""),
        featured_image_url: form_helpers::optional_field(parsed, "featured_image_url"),
        category: form_helpers::optional_field(parsed, "category"),
        author_name: form_helpers::optional_field(parsed, "author_name"),
    };

    match admin_helpers::save_post(&pool, &admin.0, post_id, &input) {
        Ok(id) => {
            let verb = if post_id.is_some() { "Updated" } else { "Created" };
            log::info!("Admin {} saved blog post {}", admin.0.email, id);
            set_notification(&session, &format!("Blog Post {}", verb), "success");
            redirect(BLOG_PATH)
        }
        Err(e) => {
            report_failure(&session, "save blog post", &e);
            match post_id {
                Some(id) => redirect(&format!("{}?edit={}", BLOG_PATH, id)),
                None => redirect(BLOG_PATH),
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
    match admin_helpers::toggle_post(&pool, &id) {
        Ok(state) => {
            let message = if state.is_published() { "Post Published" } else { "Post Unpublished" };
            log::info!("Admin {}: {} ({})", admin.0.email, message, id);
            set_notification(&session, message, "success");
        }
        Err(e) => report_failure(&session, "toggle blog post", &e),
    }
    redirect(BLOG_PATH)
}

async fn delete_post_action(
    admin: AdminIdentity,
    id: web::Path<String>,
    session: Session,
    pool: web::Data<DbPool>,
    form: Csrf<web::Form<GuardedForm>>,
) -> impl Responder {
    let form = form.into_inner();
    if form_helpers::field(&form.fields, "confirm") != DELETE_CONFIRMATION {
        set_notification(&session, "Type DELETE to confirm deletion.", "error");
        return redirect(BLOG_PATH);
    }

    match admin_helpers::delete_post(&pool, &id) {
        Ok(()) => {
            log::info!("Admin {} deleted blog post {}", admin.0.email, id);
            set_notification(&session, "Blog Post Deleted", "success");
        }
        Err(e) => report_failure(&session, "delete blog post", &e),
    }
    redirect(BLOG_PATH)
}
