use chrono::{Duration, Local};
use hmac::{Hmac, Mac};
use jwt::{SignWithKey, VerifyWithKey};
use potion::HtmlError;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use super::permissions::{ActionType, UserRole};
use crate::{
    constants::SESSION_LIFETIME_HOURS,
    database::schema::{DocumentId, User},
};

/// Claims of an identity token issued by the identity provider.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct IdentityClaims {
    pub sub: DocumentId,
    pub email: String,
    #[serde(default)]
    pub name: String,
    iat: i64,
    exp: i64,
}

impl IdentityClaims {
    pub fn new(sub: &str, email: &str, name: &str) -> Self {
        let now = Local::now();
        let iat = now.timestamp();
        let exp = (now + Duration::hours(SESSION_LIFETIME_HOURS)).timestamp();

        Self {
            sub: sub.to_string(),
            email: email.to_string(),
            name: name.to_string(),
            iat,
            exp,
        }
    }

    pub fn expires_at(&self) -> i64 {
        self.exp
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SessionData {
    pub user_id: DocumentId,
    pub email: String,
    pub display_name: String,
    pub role: UserRole,
    pub is_admin: bool,
}

impl SessionData {
    /// The profile document, when present, supplies the admin flag and the
    /// display name.
    pub fn new(claims: &IdentityClaims, profile: Option<&User>) -> Self {
        let admin = profile.map(|user| user.admin).unwrap_or(false);
        let display_name = match profile {
            Some(user) => user.visible_name().to_string(),
            None if !claims.name.is_empty() => claims.name.to_owned(),
            None => claims.email.to_owned(),
        };

        Self {
            user_id: claims.sub.to_owned(),
            email: claims.email.to_owned(),
            display_name,
            role: UserRole::from_admin_flag(admin),
            is_admin: admin,
        }
    }

    pub fn authenticate(&self, action: ActionType) -> Result<(), potion::Error> {
        if !action.authenticate(self) {
            return Err(
                HtmlError::Unauthorized.new("You don't have permission to perform this action")
            );
        }
        Ok(())
    }

    /// Own-content actions pass for the owner, anyone else needs `any`.
    pub fn authenticate_owner(
        &self,
        owner_id: &str,
        own: ActionType,
        any: ActionType,
    ) -> Result<(), potion::Error> {
        match owner_id == self.user_id {
            true => self.authenticate(own),
            false => self.authenticate(any),
        }
    }
}

fn signing_key(secret: &str) -> Result<Hmac<Sha256>, potion::Error> {
    Hmac::new_from_slice(secret.as_bytes())
        .map_err(|_| HtmlError::InternalServerError.new("Invalid session secret"))
}

pub fn generate_identity_token(
    claims: &IdentityClaims,
    secret: &str,
) -> Result<String, potion::Error> {
    let key = signing_key(secret)?;

    claims
        .sign_with_key(&key)
        .map_err(|_| HtmlError::InternalServerError.new("Failed to sign session"))
}

pub fn verify_identity_token(token: &str, secret: &str) -> Result<IdentityClaims, potion::Error> {
    let key = signing_key(secret)?;

    let claims: IdentityClaims = token
        .verify_with_key(&key)
        .map_err(|_| HtmlError::InvalidSession.new("Invalid Session; Invalid token"))?;

    let now = Local::now().timestamp();
    if (claims.exp - now).is_negative() {
        return Err(HtmlError::InvalidSession.new("Invalid session; Token expired"));
    }

    Ok(claims)
}
