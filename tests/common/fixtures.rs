//! Request builders and response readers shared by the integration tests.
#![allow(dead_code)]

use actix_web::cookie::Cookie;
use actix_web::dev::ServiceResponse;
use actix_web::test::TestRequest;
use serde_json::{json, Value};
use uuid::Uuid;

pub const TEST_PASSWORD: &str = "password123";

pub fn register_request(email: &str) -> TestRequest {
    TestRequest::post()
        .uri("/api/register")
        .set_json(json!({ "email": email, "password": TEST_PASSWORD }))
}

pub fn login_request(email: &str) -> TestRequest {
    TestRequest::post()
        .uri("/api/login")
        .set_json(json!({ "email": email, "password": TEST_PASSWORD }))
}

pub fn create_poll_request(text: &str, answers: &[&str]) -> TestRequest {
    let answers: Vec<Value> = answers.iter().map(|a| json!({ "text": a })).collect();
    TestRequest::post()
        .uri("/api/questions")
        .set_json(json!({ "text": text, "answers": answers }))
}

/// Reorder request listing whole question objects, the way clients post them.
pub fn order_request(ids: &[Uuid]) -> TestRequest {
    let body: Vec<Value> = ids
        .iter()
        .map(|id| json!({ "id": id, "text": "ignored" }))
        .collect();
    TestRequest::post().uri("/api/questions/order").set_json(body)
}

pub fn respond_request(question_id: Uuid, answer_id: Uuid) -> TestRequest {
    TestRequest::post()
        .uri(&format!("/api/polls/{}/responses", question_id))
        .set_json(json!({ "answer_id": answer_id }))
}

/// The signed session cookie set by a login response.
pub fn session_cookie<B>(resp: &ServiceResponse<B>) -> Cookie<'static> {
    resp.response()
        .cookies()
        .find(|c| c.name() == "id")
        .map(|c| c.into_owned())
        .expect("login did not set a session cookie")
}

pub fn id_of(value: &Value) -> Uuid {
    value["id"]
        .as_str()
        .and_then(|s| Uuid::parse_str(s).ok())
        .expect("body has no id")
}

/// The id of the `index`th answer of a poll body.
pub fn answer_id(poll: &Value, index: usize) -> Uuid {
    id_of(&poll["answers"][index])
}
