//! Creator endpoints: new polls, the poll list, and chain reordering.

use crate::app_config;
use crate::chain;
use crate::middleware::ClientCtx;
use crate::polls::{self, PollForm, PollListQuery};
use crate::store::Store;
use actix_web::{get, post, web, Error, HttpResponse, Responder};

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(create_question)
        .service(view_my_questions)
        .service(reorder_questions);
}

#[post("/api/questions")]
pub async fn create_question(
    client: ClientCtx,
    store: web::Data<Store>,
    form: web::Json<PollForm>,
) -> Result<impl Responder, Error> {
    let user_id = client.require_login()?;
    let poll = polls::create_poll(
        store.get_ref().as_ref(),
        &app_config::site(),
        user_id,
        form.into_inner(),
    )
    .await?;

    Ok(HttpResponse::Created().json(poll))
}

#[get("/api/questions/mine")]
pub async fn view_my_questions(
    client: ClientCtx,
    store: web::Data<Store>,
    query: web::Query<PollListQuery>,
) -> Result<impl Responder, Error> {
    let user_id = client.require_login()?;
    let polls =
        polls::my_polls(store.get_ref().as_ref(), &app_config::site(), user_id, &query).await?;

    Ok(HttpResponse::Ok().json(polls))
}

/// Takes the raw body so an anonymous caller gets 401 before the payload
/// is even looked at.
#[post("/api/questions/order")]
pub async fn reorder_questions(
    client: ClientCtx,
    store: web::Data<Store>,
    body: web::Bytes,
) -> Result<impl Responder, Error> {
    let user_id = client.require_login()?;
    let order = chain::parse_order(&body)?;
    chain::reorder_chain(store.get_ref().as_ref(), user_id, &order).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "success": true })))
}
