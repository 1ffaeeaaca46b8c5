pub mod account;
pub mod dashboard;
pub mod login;
pub mod logout;
pub mod polls;
pub mod questions;

use crate::error::PollError;
use actix_session::{config::PersistentSession, storage::CookieSessionStore, SessionMiddleware};
use actix_web::cookie::{Key, SameSite};
use actix_web::web;

/// Configures the web app by adding services from each web file.
///
/// @see https://docs.rs/actix-web/4.0.1/actix_web/struct.App.html#method.configure
pub fn configure(conf: &mut web::ServiceConfig) {
    // Malformed bodies, queries and paths get the same JSON error body as
    // every other failure.
    conf.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        log::debug!("json payload rejected: {}", err);
        PollError::validation("Invalid request format").into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _req| {
        PollError::validation(err.to_string()).into()
    }))
    .app_data(web::PathConfig::default().error_handler(|err, _req| {
        log::debug!("path rejected: {}", err);
        PollError::NotFound("Poll").into()
    }));

    // Descending order. Order is important.
    // Route resolution will stop at the first match.
    account::configure(conf);
    login::configure(conf);
    logout::configure(conf);
    questions::configure(conf);
    polls::configure(conf);
    dashboard::configure(conf);
}

/// Signed cookie sessions carrying the login token.
pub fn session_middleware(key: Key, cookie_secure: bool) -> SessionMiddleware<CookieSessionStore> {
    SessionMiddleware::builder(CookieSessionStore::default(), key)
        .cookie_same_site(SameSite::Lax)
        .cookie_secure(cookie_secure)
        .session_lifecycle(PersistentSession::default())
        .build()
}
