//! Respondent endpoints. Anyone with the link may view a poll; answering
//! needs an account.

use crate::app_config;
use crate::middleware::ClientCtx;
use crate::polls;
use crate::store::Store;
use actix_web::{get, post, web, Error, HttpResponse, Responder};
use serde::Deserialize;
use uuid::Uuid;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_poll).service(respond_to_poll);
}

#[derive(Deserialize)]
pub struct ResponseFormData {
    pub answer_id: Uuid,
}

#[get("/api/polls/{question_id}")]
pub async fn view_poll(
    client: ClientCtx,
    store: web::Data<Store>,
    path: web::Path<Uuid>,
) -> Result<impl Responder, Error> {
    let poll = polls::view_poll(
        store.get_ref().as_ref(),
        &app_config::site(),
        client.get_id(),
        path.into_inner(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(poll))
}

#[post("/api/polls/{question_id}/responses")]
pub async fn respond_to_poll(
    client: ClientCtx,
    store: web::Data<Store>,
    path: web::Path<Uuid>,
    form: web::Json<ResponseFormData>,
) -> Result<impl Responder, Error> {
    let user_id = client.require_login()?;
    let response = polls::submit_response(
        store.get_ref().as_ref(),
        user_id,
        path.into_inner(),
        form.answer_id,
    )
    .await?;

    Ok(HttpResponse::Created().json(response))
}
