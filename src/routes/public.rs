use crate::config::Config;
use crate::helper::admin_helpers::HelperError;
use crate::helper::share_helpers::ShareLinks;
use crate::helper::{contact_helpers, form_helpers, public_helpers, sanitization_helpers};
use crate::routes::{redirect, render, render_with_status, set_notification, take_notification};
use crate::{AppState, DbPool};
use actix_session::Session;
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use tera::{Context, Tera};

pub const CONTACT_SUCCESS_MESSAGE: &str = "Thank you for your inquiry. We will respond within 24-48 hours.";

#[derive(Deserialize)]
pub struct CategoryQuery {
    pub category: Option<String>,
}

/// Heading copy for the static marketing pages.
struct MarketingPage {
    path: &'static str,
    label: &'static str,
    title: &'static str,
}

const MARKETING_PAGES: &[MarketingPage] = &[
    MarketingPage { path: "/about", label: "About Us", title: "About Path Strategy Consulting" },
    MarketingPage { path: "/services", label: "What We Do", title: "Our Services" },
    MarketingPage { path: "/why-psc", label: "Our Difference", title: "Why Path Strategy Consulting" },
    MarketingPage { path: "/clients", label: "Our Work", title: "Clients & Experience" },
];

pub fn config_public(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(home));
    for page in MARKETING_PAGES {
        cfg.route(
            page.path,
            web::get().to(move |tera: web::Data<Tera>| async move {
                let mut ctx = Context::new();
                ctx.insert("label", page.label);
                ctx.insert("title", page.title);
                render(&tera, "pages/marketing.html", &ctx)
            }),
        );
    }
    cfg.route("/contact", web::get().to(show_contact_form))
        .route("/contact", web::post().to(submit_contact_form))
        .route("/insights", web::get().to(show_insights))
        .route("/insights/reports/{id}/download", web::get().to(download_report))
        .route("/blog", web::get().to(show_blog_list))
        .route("/blog/{slug}", web::get().to(show_blog_post));
}

/// A post as the public pages show it, with its share targets.
#[derive(Serialize)]
struct PostCard<'a> {
    #[serde(flatten)]
    post: &'a crate::models::BlogPost,
    url: String,
    share: ShareLinks,
}

fn post_card<'a>(post: &'a crate::models::BlogPost, config: &Config) -> PostCard<'a> {
    let url = config.post_url(&post.slug);
    let share = ShareLinks::new(&post.title, &url, post.excerpt.as_deref());
    PostCard { post, url, share }
}

fn server_error(tera: &Tera, what: &str, e: &HelperError) -> HttpResponse {
    log::error!("Failed to load {}: {}", what, e);
    let mut ctx = Context::new();
    ctx.insert("message", "We could not load this page. Please try again shortly.");
    render_with_status(tera, StatusCode::INTERNAL_SERVER_ERROR, "error.html", &ctx)
}

async fn home(pool: web::Data<DbPool>, tera: web::Data<Tera>, config: web::Data<Config>) -> impl Responder {
    let latest = match public_helpers::fetch_latest_posts(&pool, public_helpers::HOME_LATEST_POSTS) {
        Ok(posts) => posts,
        Err(e) => {
            // The home page still renders without its post previews.
            log::error!("Failed to load latest posts for home page: {}", e);
            Vec::new()
        }
    };
    let cards: Vec<PostCard> = latest.iter().map(|p| post_card(p, &config)).collect();
    let mut ctx = Context::new();
    ctx.insert("posts", &cards);
    render(&tera, "pages/home.html", &ctx)
}

async fn show_contact_form(session: Session, tera: web::Data<Tera>) -> impl Responder {
    let mut ctx = Context::new();
    take_notification(&session, &mut ctx);
    render(&tera, "pages/contact.html", &ctx)
}

async fn submit_contact_form(
    session: Session,
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    form: web::Bytes,
) -> impl Responder {
    let parsed = match form_helpers::parse_form(&form) {
        Ok(p) => p,
        Err(response) => return response,
    };

    let message = match contact_helpers::validate_contact(
        form_helpers::field(&parsed, "name"),
        form_helpers::field(&parsed, "email"),
        form_helpers::field(&parsed, "organization"),
        form_helpers::optional_field(&parsed, "phone"),
        form_helpers::field(&parsed, "message"),
    ) {
        Ok(m) => m,
        Err(e) => {
            set_notification(&session, &e.user_message(), "error");
            return redirect("/contact");
        }
    };

    match contact_helpers::submit_contact(&pool, state.notifier.as_ref(), &message).await {
        Ok(_) => set_notification(&session, CONTACT_SUCCESS_MESSAGE, "success"),
        Err(e) => {
            log::error!("Failed to store contact submission from {}: {}", message.email, e);
            set_notification(&session, "We could not send your message. Please try again.", "error");
        }
    }
    redirect("/contact")
}

async fn show_insights(
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    query: web::Query<CategoryQuery>,
) -> impl Responder {
    match public_helpers::fetch_report_listing(&pool, query.category.as_deref()) {
        Ok(listing) => {
            let mut ctx = Context::new();
            ctx.insert("reports", &listing.items);
            ctx.insert("categories", &listing.categories);
            ctx.insert("selected_category", &listing.selected_category);
            render(&tera, "pages/insights.html", &ctx)
        }
        Err(e) => server_error(&tera, "reports", &e),
    }
}

async fn download_report(
    id: web::Path<String>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
) -> impl Responder {
    match public_helpers::fetch_published_report(&pool, &id) {
        Ok(Some(report)) => redirect(&report.file_url),
        Ok(None) => not_found_page(&tera),
        Err(e) => server_error(&tera, "report", &e),
    }
}

async fn show_blog_list(
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    config: web::Data<Config>,
    query: web::Query<CategoryQuery>,
) -> impl Responder {
    match public_helpers::fetch_post_listing(&pool, query.category.as_deref()) {
        Ok(listing) => {
            let cards: Vec<PostCard> = listing.items.iter().map(|p| post_card(p, &config)).collect();
            let mut ctx = Context::new();
            ctx.insert("posts", &cards);
            ctx.insert("categories", &listing.categories);
            ctx.insert("selected_category", &listing.selected_category);
            render(&tera, "blog/list.html", &ctx)
        }
        Err(e) => server_error(&tera, "blog posts", &e),
    }
}

async fn show_blog_post(
    slug: web::Path<String>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    config: web::Data<Config>,
) -> impl Responder {
    match public_helpers::fetch_published_post(&pool, &slug) {
        Ok(Some(post)) => {
            let card = post_card(&post, &config);
            let content_html = sanitization_helpers::render_post_content(&post.content, config.content_rendering);
            let mut ctx = Context::new();
            ctx.insert("post", &card);
            ctx.insert("content_html", &content_html);
            render(&tera, "blog/detail.html", &ctx)
        }
        Ok(None) => not_found_page(&tera),
        Err(e) => server_error(&tera, "blog post", &e),
    }
}

fn not_found_page(tera: &Tera) -> HttpResponse {
    render_with_status(tera, StatusCode::NOT_FOUND, "not_found.html", &Context::new())
}

/// Catch-all for unknown paths.
pub async fn not_found(tera: web::Data<Tera>) -> HttpResponse {
    not_found_page(&tera)
}
