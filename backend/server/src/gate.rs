//! # Admin Gate
//!
//! Only a profile carrying `is_admin` may reach the catalog and config forms.
//!
//! This is a convenience check in front of the forms. The backend's row-level
//! policies remain the real boundary; every write is sent with the visitor's
//! own access token so those policies see who is asking.
use remote::models::Profile;

use crate::{error::AppError, session::SessionManager};

pub fn is_authorized(profile: Option<&Profile>) -> bool {
    profile.is_some_and(|profile| profile.is_admin)
}

/// Re-reads the profile and hands back the token to write with. Nothing is
/// taken from cache: a profile that cannot be read right now is refused.
pub async fn authorize(session: Option<&SessionManager>) -> Result<Option<String>, AppError> {
    let Some(session) = session else {
        return Err(AppError::Forbidden);
    };

    let profile = session.reload_profile().await;
    if !is_authorized(profile.as_ref()) {
        return Err(AppError::Forbidden);
    }

    Ok(session.access_token())
}
