use tracing::{info, warn};
use uuid::Uuid;

use super::repo_types::{NewOink, Oink, OinkKey, OinkWithCreator};
use crate::{
    error::AppError,
    store::{unique_violation, Queries},
};

pub async fn exists(db: &mut dyn Queries, name: &str) -> Result<bool, AppError> {
    Ok(db.oink_exists(name).await?)
}

/// Name uniqueness is checked first; a creator that does not exist is caught
/// by the foreign key and surfaces as an infrastructure error.
pub async fn create(
    db: &mut dyn Queries,
    name: &str,
    description: Option<&str>,
    creator_id: &str,
) -> Result<Oink, AppError> {
    if name.is_empty() {
        return Err(AppError::validation("Name is required"));
    }
    if exists(db, name).await? {
        warn!(name = %name, "oink name already in use");
        return Err(AppError::DuplicateIdentity("Oink name already in use"));
    }
    let oink = db
        .insert_oink(&NewOink {
            id: Uuid::new_v4().to_string(),
            name: name.to_owned(),
            description: description.map(str::to_owned),
            creator_id: creator_id.to_owned(),
        })
        .await
        .map_err(|e| match unique_violation(&e) {
            Some(violation) => {
                warn!(
                    name = %name,
                    constraint = %violation.constraint,
                    "oink insert lost uniqueness race"
                );
                AppError::DuplicateIdentity("Oink name already in use")
            }
            None => e.into(),
        })?;
    info!(oink_id = %oink.id, name = %oink.name, creator_id = %creator_id, "oink created");
    Ok(oink)
}

pub async fn list(db: &mut dyn Queries) -> Result<Vec<OinkWithCreator>, AppError> {
    Ok(db.list_oinks().await?)
}

pub async fn retrieve_by_name(
    db: &mut dyn Queries,
    name: &str,
) -> Result<OinkWithCreator, AppError> {
    db.find_oink(OinkKey::Name(name))
        .await?
        .ok_or(AppError::NotFound("Oink not found"))
}

pub async fn retrieve_by_id(db: &mut dyn Queries, id: &str) -> Result<OinkWithCreator, AppError> {
    db.find_oink(OinkKey::Id(id))
        .await?
        .ok_or(AppError::NotFound("Oink not found"))
}

pub async fn delete(db: &mut dyn Queries, name: &str) -> Result<(), AppError> {
    if db.delete_oink(name).await? == 0 {
        return Err(AppError::NotFound("Oink not found"));
    }
    info!(name = %name, "oink deleted");
    Ok(())
}
