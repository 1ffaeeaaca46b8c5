use crate::app_config;
use crate::error::PollError;
use crate::session::{self, LoginForm, TOKEN_KEY};
use crate::store::Store;
use crate::user::ProfileView;
use actix_web::{error, post, web, Error, HttpResponse, Responder};

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(post_login);
}

#[post("/api/login")]
pub async fn post_login(
    store: web::Data<Store>,
    cookies: actix_session::Session,
    form: web::Json<LoginForm>,
) -> Result<impl Responder, Error> {
    let ttl = app_config::security().session_ttl_minutes;
    let (profile, sess) = match session::login(store.get_ref().as_ref(), &form, ttl).await {
        Ok(result) => result,
        Err(PollError::Unauthenticated) => {
            // Use generic message to avoid account enumeration
            return Ok(HttpResponse::Unauthorized()
                .json(serde_json::json!({ "error": "Invalid email or password." })));
        }
        Err(err) => return Err(err.into()),
    };

    cookies.renew();
    cookies
        .insert(TOKEN_KEY, sess.id.to_string())
        .map_err(|_| error::ErrorInternalServerError("middleware error"))?;

    log::info!("user_logged_in user_id={}", profile.id);
    Ok(HttpResponse::Ok().json(ProfileView::from(profile)))
}
