use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use subtle::ConstantTimeEq;
use validator::Validate;

/// Public view of a user account, safe to return from the API.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Full `users` row including credentials and password-reset state.
#[derive(Debug, Clone, FromRow)]
pub struct UserRecord {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub reset_password_token: Option<String>,
    pub reset_password_expires: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    /// Columns selected for a full record, in `FromRow` order.
    pub const COLUMNS: &'static str =
        "id, name, email, password_hash, reset_password_token, reset_password_expires, created_at";

    /// Whether `token` is the reset token on file and it has not yet expired at `now`.
    pub fn reset_token_matches(&self, token: &str, now: DateTime<Utc>) -> Result<(), ResetTokenMismatch> {
        let issued = self
            .reset_password_token
            .as_deref()
            .map_or(false, |stored| bool::from(stored.as_bytes().ct_eq(token.as_bytes())));
        if !issued {
            return Err(ResetTokenMismatch::NotIssued);
        }
        match self.reset_password_expires {
            Some(expires) if expires < now => Err(ResetTokenMismatch::Expired),
            _ => Ok(()),
        }
    }
}

/// Why a presented reset token was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetTokenMismatch {
    NotIssued,
    Expired,
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            email: record.email,
            created_at: record.created_at,
        }
    }
}

/// Deserializes a string with surrounding whitespace removed, so length
/// validation sees what will be stored.
pub(crate) fn trimmed<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(|value| value.trim().to_string())
}

fn trimmed_opt<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(|value| value.map(|v| v.trim().to_string()))
}

/// Partial profile update. Absent fields are left untouched.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ProfileUpdate {
    #[serde(default, deserialize_with = "trimmed_opt")]
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 6))]
    pub password: Option<String>,
}
