use crate::session;
use crate::store::Store;
use actix_web::{post, web, Error, HttpResponse, Responder};

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(post_logout);
}

/// Always succeeds for guests; there is simply nothing to remove.
#[post("/api/logout")]
pub async fn post_logout(
    store: web::Data<Store>,
    cookies: actix_session::Session,
) -> Result<impl Responder, Error> {
    session::logout(store.get_ref().as_ref(), &cookies).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "success": true })))
}
