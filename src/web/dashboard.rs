use crate::middleware::ClientCtx;
use crate::polls;
use crate::store::Store;
use actix_web::{get, web, Error, HttpResponse, Responder};

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_dashboard);
}

#[get("/api/dashboard")]
pub async fn view_dashboard(
    client: ClientCtx,
    store: web::Data<Store>,
) -> Result<impl Responder, Error> {
    let user_id = client.require_login()?;
    let stats = polls::dashboard(store.get_ref().as_ref(), user_id).await?;
    Ok(HttpResponse::Ok().json(stats))
}
