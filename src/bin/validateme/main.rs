use actix_web::cookie::Key;
use actix_web::http::header;
use actix_web::middleware::{DefaultHeaders, Logger};
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use anyhow::Context;
use env_logger::Env;
use rand::{distributions::Alphanumeric, Rng};
use validateme::app_config;
use validateme::middleware::ClientCtx;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    init_lib_mods();
    init_our_mods();

    let store = validateme::db::init_store(&app_config::database())
        .await
        .context("Failed to initialize the poll store")?;

    let security = app_config::security();
    let secret_key = signing_key(&security.secret_key);
    let bind = app_config::server().bind;
    log::info!("Listening on {}", bind);

    HttpServer::new(move || {
        // Order of middleware IS IMPORTANT and is in REVERSE EXECUTION ORDER.
        App::new()
            .app_data(Data::new(store.clone()))
            // Security headers - applied to all responses
            .wrap(
                DefaultHeaders::new()
                    .add((header::X_FRAME_OPTIONS, "DENY"))
                    .add((header::X_CONTENT_TYPE_OPTIONS, "nosniff"))
                    .add(("Referrer-Policy", "strict-origin-when-cross-origin")),
            )
            .wrap(ClientCtx::default())
            .wrap(validateme::web::session_middleware(
                secret_key.clone(),
                security.cookie_secure,
            ))
            .wrap(Logger::new("%a %r %s %Dms"))
            .configure(validateme::web::configure)
    })
    .bind(&bind)
    .with_context(|| format!("Failed to bind {}", bind))?
    .run()
    .await
    .context("HTTP server stopped with an error")
}

/// Uses the configured key when it is long enough, otherwise a random one.
fn signing_key(configured: &str) -> Key {
    if configured.len() >= 64 {
        return Key::from(configured.as_bytes());
    }

    let random_string: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(128)
        .map(char::from)
        .collect();
    log::warn!("security.secret_key is missing or shorter than 64 bytes.\r\nThis means the key used for signing session cookies will invalidate every time the application is restarted.\r\n\r\nNeed a key? How about:\r\n{}", random_string);
    Key::from(random_string.as_bytes())
}

/// Initialize third party crates we rely on but don't have control over.
fn init_lib_mods() {
    if let Err(e) = dotenv::dotenv() {
        eprintln!("No .env file loaded: {}", e);
    }
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
}

/// Initialize all local mods.
fn init_our_mods() {
    app_config::init();
}
