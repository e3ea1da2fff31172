//! Authentication domain models.
//!
//! These are internal domain models, distinct from the API request/response
//! shapes in `scribe_api` (which carry their own serde renames).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The two roles the platform knows about.
///
/// Role ids are resolved to this enum once, at the directory boundary. Any
/// role id that does not resolve is treated as non-admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    /// Role name as stored in the `roles` table.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Which of the two token collections a token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain user.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub role_id: Uuid,
    pub username: String,
    pub email: String,
    /// `None` for accounts created through social login.
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub profile_picture: String,
    pub contact_info: String,
    pub is_active: bool,
    pub email_verified: bool,
    /// SHA-256 digest of the outstanding password-reset token.
    #[serde(skip_serializing)]
    pub reset_token_hash: Option<String>,
    pub reset_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when creating a user record.
#[derive(Debug, Clone)]
pub struct NewUserRecord {
    pub role_id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub profile_picture: String,
}

/// Registration input, before validation and hashing.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// Partial profile update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
    pub contact_info: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.bio.is_none()
            && self.profile_picture.is_none()
            && self.contact_info.is_none()
    }

    /// Apply the update onto an in-memory user.
    pub fn apply(&self, user: &mut User) {
        if let Some(v) = &self.first_name {
            user.first_name = v.clone();
        }
        if let Some(v) = &self.last_name {
            user.last_name = v.clone();
        }
        if let Some(v) = &self.bio {
            user.bio = v.clone();
        }
        if let Some(v) = &self.profile_picture {
            user.profile_picture = v.clone();
        }
        if let Some(v) = &self.contact_info {
            user.contact_info = v.clone();
        }
    }
}

/// Ledger row for an issued access or refresh token.
#[derive(Debug, Clone)]
pub struct TokenRecord {
    pub id: Uuid,
    pub kind: TokenKind,
    pub user_id: Uuid,
    /// SHA-256 digest of the token string.
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A freshly issued token together with its absolute expiry.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Access + refresh token issued together on login.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

/// JWT claims embedded in access and refresh tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: user ID (standard JWT `sub` claim).
    pub sub: Uuid,
    pub role: Role,
    /// Token type tag; an access token never validates as a refresh token.
    #[serde(rename = "type")]
    pub kind: TokenKind,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiry (unix timestamp).
    pub exp: i64,
    /// Unique token id, keeps two tokens minted in the same second distinct.
    pub jti: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_name() {
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
        assert_eq!("user".parse::<Role>(), Ok(Role::User));
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn claims_serialize_type_tag() {
        let claims = TokenClaims {
            sub: Uuid::nil(),
            role: Role::Admin,
            kind: TokenKind::Refresh,
            iat: 1,
            exp: 2,
            jti: Uuid::nil(),
        };
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["type"], "refresh");
        assert_eq!(json["role"], "admin");
    }

    #[test]
    fn claims_with_missing_field_fail_to_decode() {
        let json = serde_json::json!({
            "sub": Uuid::nil(),
            "role": "user",
            "iat": 1,
            "exp": 2,
            "jti": Uuid::nil(),
        });
        assert!(serde_json::from_value::<TokenClaims>(json).is_err());
    }

    #[test]
    fn profile_update_applies_only_present_fields() {
        let now = Utc::now();
        let mut user = User {
            id: Uuid::nil(),
            role_id: Uuid::nil(),
            username: "alice".into(),
            email: "alice@x.com".into(),
            password_hash: None,
            first_name: "Alice".into(),
            last_name: "Liddell".into(),
            bio: String::new(),
            profile_picture: String::new(),
            contact_info: String::new(),
            is_active: true,
            email_verified: false,
            reset_token_hash: None,
            reset_expires_at: None,
            created_at: now,
            updated_at: now,
        };
        let update = ProfileUpdate {
            bio: Some("writer".into()),
            ..Default::default()
        };
        update.apply(&mut user);
        assert_eq!(user.bio, "writer");
        assert_eq!(user.first_name, "Alice");
    }
}
