use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DomainError, check_email, new_user_id, require_text};

/// User document as persisted. `password` always holds a hash.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub phone_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        first_name: &str,
        last_name: &str,
        email: &str,
        password_hash: &str,
        phone_number: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        require_text(first_name, "first name")?;
        require_text(last_name, "last name")?;
        check_email(email)?;
        require_text(phone_number, "phone number")?;
        require_text(password_hash, "password")?;

        Ok(User {
            id: new_user_id(),
            first_name: first_name.trim().to_string(),
            last_name: last_name.trim().to_string(),
            email: normalize_email(email),
            password: password_hash.to_string(),
            phone_number: phone_number.trim().to_string(),
            token: None,
            created_at: now,
            updated_at: now,
        })
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Public projection of a user; never carries the hash or the session token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserResponse {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        UserResponse {
            id: user.id.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            phone_number: user.phone_number.clone(),
            created_at: user.created_at,
        }
    }
}
