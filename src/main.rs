use actix_cors::Cors;
use actix_session::{storage::CookieSessionStore, SessionMiddleware};
use actix_web::{cookie::Key, middleware::{DefaultHeaders, Logger}, web, App, HttpServer};
use clap::Parser;
use pathsite_backend::{
    build_pool,
    config::Config,
    helper::email_helpers::{ContactNotifier, DisabledNotifier, ResendNotifier},
    helper::storage_helpers::LocalMediaStorage,
    load_templates, routes, AppState,
};
use std::convert::TryFrom;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "pathsite_server", author, version, about = "Starts the Path Strategy Consulting site and CMS.")]
struct Cli {
    /// Path to the .env configuration file.
    #[arg(long, required = true, value_name = "FILE")]
    env_file: PathBuf,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env(&cli.env_file)
        .expect("FATAL: Failed to load or parse configuration.");

    env_logger::init_from_env(env_logger::Env::new().default_filter_or(&config.log_level));

    let tera = load_templates(&config.templates_dir).expect("FATAL: Tera initialization failed");

    fs::create_dir_all(&config.database_path)
        .expect("Failed to create database directory");
    fs::create_dir_all(&config.media_path)
        .expect("Failed to create media directory");

    let db_path = config.site_db_path();
    if !db_path.exists() {
        panic!(
            "FATAL: {} not found. Run 'cargo run --bin setup_cli -- --env-file <path> db setup'",
            db_path.display()
        );
    }
    let pool = build_pool(&db_path).expect("FATAL: Failed to create Rusqlite connection pool.");

    let notifier: Arc<dyn ContactNotifier> = match config.resend_api_key.as_deref() {
        Some(api_key) => Arc::new(
            ResendNotifier::new(api_key, &config, tera.clone())
                .expect("FATAL: Failed to build the email HTTP client."),
        ),
        None => {
            log::warn!("RESEND_API_KEY is not set; contact emails will not be sent.");
            Arc::new(DisabledNotifier)
        }
    };
    let app_state = web::Data::new(AppState {
        storage: Arc::new(LocalMediaStorage::new(&config.media_path, "/media")),
        notifier,
    });

    let session_key_bytes = hex::decode(&config.session_secret_key)
        .expect("FATAL: SESSION_SECRET_KEY in .env is not a valid hex string.");
    let session_key = Key::try_from(session_key_bytes.as_slice())
        .expect("FATAL: The decoded SESSION_SECRET_KEY is not long enough (minimum 64 bytes required).");

    let server_address = format!("{}:{}", config.web.host, config.web.port);
    log::info!("Server starting at http://{}", server_address);

    HttpServer::new(move || {
        let session_mw = SessionMiddleware::builder(CookieSessionStore::default(), session_key.clone())
            .cookie_secure(config.use_secure_cookies)
            .cookie_http_only(true)
            .cookie_same_site(actix_web::cookie::SameSite::Lax)
            .build();

        let cors = {
            let allowed = &config.allowed_origins;
            let cors = if allowed.trim() == "*" {
                Cors::default().allow_any_origin()
            } else {
                allowed
                    .split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            };
            cors.allowed_methods(vec!["GET", "POST"])
                .allowed_headers(vec![
                    actix_web::http::header::AUTHORIZATION,
                    actix_web::http::header::ACCEPT,
                    actix_web::http::header::CONTENT_TYPE,
                ])
                .max_age(3600)
        };

        App::new()
            .wrap(session_mw)
            .wrap(cors)
            .wrap(Logger::default())
            .wrap(
                DefaultHeaders::new()
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("X-Frame-Options", "DENY"))
                    .add(("Referrer-Policy", "strict-origin-when-cross-origin")),
            )
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(tera.clone()))
            .app_data(web::Data::new(pool.clone()))
            .app_data(app_state.clone())
            .app_data(web::PayloadConfig::new(config.max_upload_size_bytes() as usize + 64 * 1024))
            .service(actix_files::Files::new("/media", &config.media_path))
            .configure(routes::configure)
            .default_service(web::to(routes::public::not_found))
    })
    .bind(server_address)?
    .run()
    .await
}
