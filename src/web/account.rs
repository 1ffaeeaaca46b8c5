use crate::error::PollError;
use crate::middleware::ClientCtx;
use crate::session::{self, RegisterForm};
use crate::store::Store;
use crate::user::{self, ProfileForm, ProfileView};
use actix_web::{get, post, web, Error, HttpResponse, Responder};

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(post_register)
        .service(view_me)
        .service(post_profile);
}

#[post("/api/register")]
pub async fn post_register(
    store: web::Data<Store>,
    form: web::Json<RegisterForm>,
) -> Result<impl Responder, Error> {
    let profile = session::register(store.get_ref().as_ref(), form.into_inner()).await?;
    Ok(HttpResponse::Created().json(ProfileView::from(profile)))
}

#[get("/api/me")]
pub async fn view_me(client: ClientCtx) -> Result<impl Responder, Error> {
    let profile = client.get_user().cloned().ok_or(PollError::Unauthenticated)?;
    Ok(HttpResponse::Ok().json(ProfileView::from(profile)))
}

#[post("/api/me/profile")]
pub async fn post_profile(
    client: ClientCtx,
    store: web::Data<Store>,
    form: web::Json<ProfileForm>,
) -> Result<impl Responder, Error> {
    let user_id = client.require_login()?;
    let profile = user::complete_profile(store.get_ref().as_ref(), user_id, form.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ProfileView::from(profile)))
}
