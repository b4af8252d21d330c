use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

/// User record in the database.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // argon2 PHC string, never exposed in JSON
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Row handed to the store on insert; the id is generated by the directory.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: String,
    pub email: String,
    pub username: String,
    pub password_hash: String,
}

/// Unique column a user can be addressed by.
#[derive(Debug, Clone, Copy)]
pub enum UserKey<'a> {
    Id(&'a str),
    Email(&'a str),
    Username(&'a str),
}

impl UserKey<'_> {
    pub fn column(&self) -> &'static str {
        match self {
            UserKey::Id(_) => "id",
            UserKey::Email(_) => "email",
            UserKey::Username(_) => "username",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            UserKey::Id(v) | UserKey::Email(v) | UserKey::Username(v) => v,
        }
    }

    pub fn matches(&self, user: &User) -> bool {
        match self {
            UserKey::Id(v) => user.id == *v,
            UserKey::Email(v) => user.email == *v,
            UserKey::Username(v) => user.username == *v,
        }
    }
}
