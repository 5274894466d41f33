use actix_session::{storage::CookieSessionStore, SessionMiddleware};
use actix_web::cookie::{Key, SameSite};
use actix_web::http::header;
use actix_web::http::StatusCode;
use actix_web::middleware::{DefaultHeaders, ErrorHandlers, Logger};
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use anyhow::Context;
use env_logger::Env;
use polls::admin::AdminSite;
use polls::app_config;
use rand::{distributions::Alphanumeric, Rng};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    init_lib_mods();
    app_config::init();

    let config = app_config::get_config();
    let db = polls::db::connect(&config.database_url(), config.database.max_connections)
        .await
        .context("Failed to connect to the database")?;
    if config.database.create_schema {
        polls::db::create_schema(&db)
            .await
            .context("Failed to create the database schema")?;
    }

    let secret_key = session_key();
    let db = Data::new(db);
    let admin_site = Data::new(AdminSite::from_config(&config));
    let bind = config.server.bind.clone();

    log::info!("Listening on {}", bind);

    HttpServer::new(move || {
        // Order of middleware IS IMPORTANT and is in REVERSE EXECUTION ORDER.
        App::new()
            .app_data(db.clone())
            .app_data(admin_site.clone())
            .wrap(
                DefaultHeaders::new()
                    .add((header::X_FRAME_OPTIONS, "DENY"))
                    .add((header::X_CONTENT_TYPE_OPTIONS, "nosniff"))
                    .add(("Referrer-Policy", "strict-origin-when-cross-origin")),
            )
            .wrap(
                ErrorHandlers::new()
                    .handler(StatusCode::BAD_REQUEST, polls::web::error::render_400)
                    .handler(StatusCode::NOT_FOUND, polls::web::error::render_404)
                    .handler(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        polls::web::error::render_500,
                    ),
            )
            .wrap(
                SessionMiddleware::builder(CookieSessionStore::default(), secret_key.clone())
                    .cookie_same_site(SameSite::Lax)
                    .cookie_secure(false) // Allow HTTP for development
                    .build(),
            )
            .wrap(Logger::new("%a \"%r\" %s %T"))
            .configure(polls::web::configure)
    })
    .bind(&bind)
    .with_context(|| format!("Failed to bind {}", bind))?
    .run()
    .await?;

    Ok(())
}

/// Initialize third party crates we rely on but don't have control over.
fn init_lib_mods() {
    // A missing .env file is fine, the environment may be set directly.
    if let Err(e) = dotenv::dotenv() {
        eprintln!("No .env file loaded: {}", e);
    }
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
}

/// Key for signing the session cookie that carries flash messages.
fn session_key() -> Key {
    let configured = std::env::var("SECRET_KEY")
        .map_err(|e| e.to_string())
        .and_then(|key| Key::try_from(key.as_bytes()).map_err(|e| e.to_string()));

    match configured {
        Ok(key) => key,
        Err(err) => {
            let random_string: String = rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(128)
                .map(char::from)
                .collect();
            log::warn!("SECRET_KEY was invalid. Reason: {}\r\nSession cookies will be invalidated every time the application is restarted. A secret key must be at least 64 bytes to be accepted.", err);
            Key::from(random_string.as_bytes())
        }
    }
}
