use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Oink {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub creator_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Oink joined with the username of its creator.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OinkWithCreator {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub creator_id: String,
    pub creator_username: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl OinkWithCreator {
    pub fn new(oink: Oink, creator_username: String) -> Self {
        Self {
            id: oink.id,
            name: oink.name,
            description: oink.description,
            creator_id: oink.creator_id,
            creator_username,
            created_at: oink.created_at,
            updated_at: oink.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewOink {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub creator_id: String,
}

#[derive(Debug, Clone, Copy)]
pub enum OinkKey<'a> {
    Id(&'a str),
    Name(&'a str),
}

impl OinkKey<'_> {
    pub fn column(&self) -> &'static str {
        match self {
            OinkKey::Id(_) => "id",
            OinkKey::Name(_) => "name",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            OinkKey::Id(v) | OinkKey::Name(v) => v,
        }
    }

    pub fn matches(&self, oink: &Oink) -> bool {
        match self {
            OinkKey::Id(v) => oink.id == *v,
            OinkKey::Name(v) => oink.name == *v,
        }
    }
}
