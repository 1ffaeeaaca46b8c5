//! Accounts and login sessions.
//!
//! A successful login stores a random session id in the signed cookie
//! session under [`TOKEN_KEY`]. Each request resolves that id back to a
//! user through the store; expired or unknown ids resolve to a guest.

use crate::error::PollError;
use crate::orm::{sessions, users};
use crate::store::PollStore;
use crate::user::Profile;
use actix_session::Session;
use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, SaltString};
use argon2::{Argon2, PasswordVerifier};
use chrono::{Duration, Utc};
use once_cell::sync::Lazy;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// Cookie session key holding the session id.
pub const TOKEN_KEY: &str = "token";

static ARGON2: Lazy<Argon2<'static>> = Lazy::new(Argon2::default);

pub fn get_argon2() -> &'static Argon2<'static> {
    &ARGON2
}

pub fn hash_password(password: &str) -> Result<String, PollError> {
    get_argon2()
        .hash_password(password.as_bytes(), &SaltString::generate(&mut OsRng))
        .map(|hash| hash.to_string())
        .map_err(|e| {
            log::error!("Failed to hash password: {}", e);
            PollError::Internal(format!("password hashing failed: {}", e))
        })
}

fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => get_argon2()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            log::error!("Stored password hash is malformed: {}", e);
            false
        }
    }
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct RegisterForm {
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 8, max = 1000, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(max = 100))]
    pub display_name: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Creates an account. Emails are stored lowercased.
pub async fn register(store: &dyn PollStore, form: RegisterForm) -> Result<Profile, PollError> {
    let form = RegisterForm {
        email: form.email.trim().to_lowercase(),
        display_name: form
            .display_name
            .map(|n| n.trim().to_owned())
            .filter(|n| !n.is_empty()),
        ..form
    };
    form.validate()?;

    let user = users::Model {
        id: Uuid::new_v4(),
        email: form.email,
        password: hash_password(&form.password)?,
        display_name: form.display_name,
        avatar_url: None,
        birth_date: None,
        gender: None,
        country: None,
        city: None,
        created_at: Utc::now().naive_utc(),
    };

    store
        .insert_user(user.clone())
        .await
        .map_err(|err| PollError::from_unique(err, "An account with that email already exists"))?;

    log::info!("New user registered: user_id={}", user.id);
    Ok(user.into())
}

/// Checks credentials and opens a session lasting `ttl_minutes`.
pub async fn login(
    store: &dyn PollStore,
    form: &LoginForm,
    ttl_minutes: u32,
) -> Result<(Profile, sessions::Model), PollError> {
    let email = form.email.trim().to_lowercase();
    let user = match store.find_user_by_email(&email).await? {
        Some(user) if verify_password(&form.password, &user.password) => user,
        _ => {
            log::debug!("login failure for {}", email);
            // One message for both cases to avoid account enumeration.
            return Err(PollError::Unauthenticated);
        }
    };

    let session = new_session(store, user.id, ttl_minutes).await?;
    sweep_expired_sessions(store).await;
    Ok((user.into(), session))
}

pub async fn new_session(
    store: &dyn PollStore,
    user_id: Uuid,
    ttl_minutes: u32,
) -> Result<sessions::Model, PollError> {
    let now = Utc::now().naive_utc();
    let session = sessions::Model {
        id: Uuid::new_v4(),
        user_id,
        created_at: now,
        expires_at: now + Duration::minutes(i64::from(ttl_minutes)),
    };
    store.insert_session(session.clone()).await?;
    Ok(session)
}

/// Removes every expired session row. Failures are logged, never surfaced;
/// a stale row only costs space.
pub async fn sweep_expired_sessions(store: &dyn PollStore) {
    match store.delete_expired_sessions(Utc::now().naive_utc()).await {
        Ok(0) => {}
        Ok(removed) => log::debug!("removed {} expired sessions", removed),
        Err(e) => log::error!("sweep_expired_sessions: {}", e),
    }
}

/// Resolves a session id to its user. Expired sessions are removed.
pub async fn authenticate_by_token(
    store: &dyn PollStore,
    token: Uuid,
) -> Result<Option<Profile>, PollError> {
    let session = match store.find_session(token).await? {
        Some(session) => session,
        None => return Ok(None),
    };

    if session.expires_at <= Utc::now().naive_utc() {
        log::debug!("session {} expired", session.id);
        store.delete_session(session.id).await?;
        return Ok(None);
    }

    Profile::get_by_id(store, session.user_id).await
}

/// Resolves the cookie session to a user, or None for guests.
pub async fn authenticate_client_by_session(
    store: &dyn PollStore,
    cookies: &Session,
) -> Option<Profile> {
    let token = match cookies.get::<String>(TOKEN_KEY) {
        Ok(Some(token)) => token,
        Ok(None) => return None,
        Err(e) => {
            log::error!("authenticate_client_by_session: cookies.get() {}", e);
            return None;
        }
    };

    let token = match Uuid::parse_str(&token) {
        Ok(token) => token,
        Err(e) => {
            log::debug!("authenticate_client_by_session: parse_str() {}", e);
            return None;
        }
    };

    match authenticate_by_token(store, token).await {
        Ok(profile) => profile,
        Err(e) => {
            log::error!("authenticate_client_by_session: {}", e);
            None
        }
    }
}

/// Clears the cookie, then deletes the session row behind it.
pub async fn logout(store: &dyn PollStore, cookies: &Session) -> Result<(), PollError> {
    let token = cookies.get::<String>(TOKEN_KEY);
    // The client is logged out even if the row outlives this call.
    cookies.purge();

    match token {
        Ok(Some(token)) => match Uuid::parse_str(&token) {
            Ok(token) => store.delete_session(token).await?,
            Err(e) => log::debug!("logout: parse_str() {}", e),
        },
        Ok(None) => log::debug!("logout: missing token (already logged out?)"),
        Err(e) => log::error!("logout: cookies.get() {}", e),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use actix_session::{SessionExt, SessionStatus};
    use actix_web::test::TestRequest;

    fn register_form(email: &str) -> RegisterForm {
        RegisterForm {
            email: email.to_owned(),
            password: "password123".to_owned(),
            display_name: Some("  ".to_owned()),
        }
    }

    #[actix_rt::test]
    async fn test_register_normalizes_email() {
        let store = MemoryStore::new();
        let profile = register(&store, register_form("  Ada@Example.COM "))
            .await
            .unwrap();
        assert_eq!(profile.email, "ada@example.com");
        assert_eq!(profile.display_name, None);
    }

    #[actix_rt::test]
    async fn test_register_rejects_duplicate_email() {
        let store = MemoryStore::new();
        register(&store, register_form("ada@example.com")).await.unwrap();
        let err = register(&store, register_form("ADA@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, PollError::Conflict(_)));
    }

    #[actix_rt::test]
    async fn test_register_rejects_short_password() {
        let store = MemoryStore::new();
        let form = RegisterForm {
            password: "short".to_owned(),
            ..register_form("ada@example.com")
        };
        assert!(matches!(
            register(&store, form).await,
            Err(PollError::Validation(_))
        ));
    }

    #[actix_rt::test]
    async fn test_login_and_token_round_trip() {
        let store = MemoryStore::new();
        let profile = register(&store, register_form("ada@example.com"))
            .await
            .unwrap();

        let form = LoginForm {
            email: "ADA@example.com".to_owned(),
            password: "password123".to_owned(),
        };
        let (logged_in, session) = login(&store, &form, 60).await.unwrap();
        assert_eq!(logged_in.id, profile.id);

        let resolved = authenticate_by_token(&store, session.id).await.unwrap();
        assert_eq!(resolved.map(|p| p.id), Some(profile.id));
    }

    #[actix_rt::test]
    async fn test_login_bad_password() {
        let store = MemoryStore::new();
        register(&store, register_form("ada@example.com")).await.unwrap();
        let form = LoginForm {
            email: "ada@example.com".to_owned(),
            password: "wrong-password".to_owned(),
        };
        assert!(matches!(
            login(&store, &form, 60).await,
            Err(PollError::Unauthenticated)
        ));
    }

    #[actix_rt::test]
    async fn test_expired_session_resolves_to_guest() {
        let store = MemoryStore::new();
        let profile = register(&store, register_form("ada@example.com"))
            .await
            .unwrap();
        let session = new_session(&store, profile.id, 0).await.unwrap();

        assert_eq!(authenticate_by_token(&store, session.id).await.unwrap(), None);
        assert_eq!(store.find_session(session.id).await.unwrap(), None);
    }

    #[actix_rt::test]
    async fn test_login_sweeps_abandoned_sessions() {
        let store = MemoryStore::new();
        let ada = register(&store, register_form("ada@example.com")).await.unwrap();
        register(&store, register_form("bob@example.com")).await.unwrap();

        // Ada's cookie is never presented again.
        let abandoned = new_session(&store, ada.id, 0).await.unwrap();
        let live = new_session(&store, ada.id, 60).await.unwrap();

        let form = LoginForm {
            email: "bob@example.com".to_owned(),
            password: "password123".to_owned(),
        };
        let (_, bobs) = login(&store, &form, 60).await.unwrap();

        assert_eq!(store.find_session(abandoned.id).await.unwrap(), None);
        assert!(store.find_session(live.id).await.unwrap().is_some());
        assert!(store.find_session(bobs.id).await.unwrap().is_some());
    }

    #[actix_rt::test]
    async fn test_logout_clears_cookie_when_store_fails() {
        let store = MemoryStore::new();
        let profile = register(&store, register_form("ada@example.com"))
            .await
            .unwrap();
        let session = new_session(&store, profile.id, 60).await.unwrap();

        let req = TestRequest::default().to_srv_request();
        let cookies = req.get_session();
        cookies.insert(TOKEN_KEY, session.id.to_string()).unwrap();

        store.poison();
        assert!(matches!(
            logout(&store, &cookies).await,
            Err(PollError::Store(_))
        ));
        assert_eq!(cookies.status(), SessionStatus::Purged);
        assert_eq!(cookies.get::<String>(TOKEN_KEY).unwrap(), None);
    }
}
