use crate::error::PollError;
use crate::orm::users;
use crate::store::{Demographics, PollStore};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Public view of a user, safe to hand to templates and JSON responses.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub created_at: chrono::NaiveDateTime,
}

impl From<users::Model> for Profile {
    fn from(user: users::Model) -> Self {
        Self {
            id: user.id,
            email: user.email,
            display_name: user.display_name,
            avatar_url: user.avatar_url,
            birth_date: user.birth_date,
            gender: user.gender,
            country: user.country,
            city: user.city,
            created_at: user.created_at,
        }
    }
}

impl Profile {
    /// Returns a user profile by id.
    pub async fn get_by_id(store: &dyn PollStore, id: Uuid) -> Result<Option<Self>, PollError> {
        Ok(store.find_user(id).await?.map(Self::from))
    }

    /// All demographic fields are filled in.
    pub fn is_complete(&self) -> bool {
        self.birth_date.is_some()
            && self.gender.as_deref().map_or(false, |s| !s.is_empty())
            && self.country.as_deref().map_or(false, |s| !s.is_empty())
            && self.city.as_deref().map_or(false, |s| !s.is_empty())
    }

    /// Name shown to other users; falls back to the email's local part.
    pub fn get_name(&self) -> String {
        match &self.display_name {
            Some(name) if !name.is_empty() => name.to_owned(),
            _ => self
                .email
                .split('@')
                .next()
                .unwrap_or_default()
                .to_owned(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ProfileView {
    #[serde(flatten)]
    pub profile: Profile,
    pub name: String,
    pub profile_complete: bool,
}

impl From<Profile> for ProfileView {
    fn from(profile: Profile) -> Self {
        Self {
            name: profile.get_name(),
            profile_complete: profile.is_complete(),
            profile,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct ProfileForm {
    pub birth_date: NaiveDate,
    #[validate(length(min = 1, max = 64, message = "Gender is required"))]
    pub gender: String,
    #[validate(length(min = 1, max = 128, message = "Country is required"))]
    pub country: String,
    #[validate(length(min = 1, max = 128, message = "City is required"))]
    pub city: String,
}

impl ProfileForm {
    fn trimmed(self) -> Self {
        Self {
            birth_date: self.birth_date,
            gender: self.gender.trim().to_owned(),
            country: self.country.trim().to_owned(),
            city: self.city.trim().to_owned(),
        }
    }
}

/// Stores the caller's demographic fields.
pub async fn complete_profile(
    store: &dyn PollStore,
    user_id: Uuid,
    form: ProfileForm,
) -> Result<Profile, PollError> {
    let form = form.trimmed();
    form.validate()?;

    if form.birth_date > Utc::now().date_naive() {
        return Err(PollError::validation("Birth date cannot be in the future"));
    }

    let demographics = Demographics {
        birth_date: form.birth_date,
        gender: form.gender,
        country: form.country,
        city: form.city,
    };

    let user = store
        .update_demographics(user_id, &demographics)
        .await?
        .ok_or(PollError::NotFound("User"))?;

    log::info!("profile_completed user_id={}", user_id);
    Ok(user.into())
}
