//! Shared helpers for integration tests.
//!
//! Every test builds the full app against a fresh in-memory store, so tests
//! are independent and need no database.
#![allow(dead_code)]
#![allow(unused_macros)]

pub mod database;
pub mod fixtures;

use std::sync::Arc;
use validateme::store::{MemoryStore, Store};

/// A fresh store, returned both concretely (for inspection helpers) and as
/// the shared handle the app uses.
pub fn memory_store() -> (Arc<MemoryStore>, Store) {
    let memory = Arc::new(MemoryStore::new());
    let store: Store = memory.clone();
    (memory, store)
}

/// Builds the app with the production middleware stack around `store`.
macro_rules! test_app {
    ($store:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::new($store.clone()))
                .wrap(validateme::middleware::ClientCtx::default())
                .wrap(validateme::web::session_middleware(
                    actix_web::cookie::Key::generate(),
                    false,
                ))
                .configure(validateme::web::configure),
        )
        .await
    };
}

/// Registers `$email`, logs in, and evaluates to the session cookie.
macro_rules! register_and_login {
    ($app:expr, $email:expr) => {{
        let resp = actix_web::test::call_service(
            &$app,
            common::fixtures::register_request($email).to_request(),
        )
        .await;
        assert_eq!(resp.status(), 201, "registration of {} failed", $email);

        let resp = actix_web::test::call_service(
            &$app,
            common::fixtures::login_request($email).to_request(),
        )
        .await;
        assert_eq!(resp.status(), 200, "login of {} failed", $email);
        common::fixtures::session_cookie(&resp)
    }};
}

/// Creates a poll as the cookie's owner and evaluates to the JSON body.
macro_rules! create_poll {
    ($app:expr, $cookie:expr, $text:expr, $answers:expr) => {{
        let resp = actix_web::test::call_service(
            &$app,
            common::fixtures::create_poll_request($text, $answers)
                .cookie($cookie.clone())
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), 201, "poll creation failed");
        let body: serde_json::Value = actix_web::test::read_body_json(resp).await;
        body
    }};
}
