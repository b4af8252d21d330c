use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::repo_types::{NewUser, User, UserKey};
use crate::{
    auth::password,
    error::AppError,
    store::{unique_violation, Queries},
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub async fn exists_by_email(db: &mut dyn Queries, email: &str) -> Result<bool, AppError> {
    Ok(db.user_exists(UserKey::Email(email)).await?)
}

pub async fn exists_by_username(db: &mut dyn Queries, username: &str) -> Result<bool, AppError> {
    Ok(db.user_exists(UserKey::Username(username)).await?)
}

pub async fn exists_by_id(db: &mut dyn Queries, id: &str) -> Result<bool, AppError> {
    Ok(db.user_exists(UserKey::Id(id)).await?)
}

/// Creates an account after checking that neither the email nor the username
/// is taken. Run it under [`crate::tx::WriteTx`] so the checks and the insert
/// see the same snapshot.
pub async fn create(
    db: &mut dyn Queries,
    email: &str,
    password: &str,
    username: &str,
) -> Result<User, AppError> {
    if !is_valid_email(email) {
        warn!(email = %email, "invalid email");
        return Err(AppError::validation("Invalid email"));
    }
    if username.is_empty() {
        return Err(AppError::validation("Username is required"));
    }
    if password.is_empty() {
        return Err(AppError::validation("Password is required"));
    }

    if exists_by_email(db, email).await? {
        warn!(email = %email, "email already registered");
        return Err(AppError::DuplicateIdentity("Email already registered"));
    }
    if exists_by_username(db, username).await? {
        warn!(username = %username, "username already taken");
        return Err(AppError::DuplicateIdentity("Username already taken"));
    }

    let password_hash = password::hash(password).await?;
    let inserted = db
        .insert_user(&NewUser {
            id: Uuid::new_v4().to_string(),
            email: email.to_owned(),
            username: username.to_owned(),
            password_hash,
        })
        .await;
    let user = match inserted {
        Ok(user) => user,
        Err(e) => {
            let Some(violation) = unique_violation(&e) else {
                return Err(e.into());
            };
            // a concurrent create committed the same key after our checks
            warn!(constraint = %violation.constraint, "user insert lost uniqueness race");
            return Err(AppError::DuplicateIdentity(
                if violation.constraint.contains("username") {
                    "Username already taken"
                } else {
                    "Email already registered"
                },
            ));
        }
    };

    info!(user_id = %user.id, email = %user.email, "user created");
    Ok(user)
}

async fn get(db: &mut dyn Queries, key: UserKey<'_>) -> Result<User, AppError> {
    db.find_user(key)
        .await?
        .ok_or(AppError::NotFound("User not found"))
}

pub async fn get_by_id(db: &mut dyn Queries, id: &str) -> Result<User, AppError> {
    get(db, UserKey::Id(id)).await
}

pub async fn get_by_email(db: &mut dyn Queries, email: &str) -> Result<User, AppError> {
    get(db, UserKey::Email(email)).await
}

pub async fn get_by_username(db: &mut dyn Queries, username: &str) -> Result<User, AppError> {
    get(db, UserKey::Username(username)).await
}

pub async fn list(db: &mut dyn Queries) -> Result<Vec<User>, AppError> {
    Ok(db.list_users().await?)
}

pub async fn update_password(
    db: &mut dyn Queries,
    id: &str,
    new_password: &str,
) -> Result<(), AppError> {
    if !exists_by_id(db, id).await? {
        return Err(AppError::NotFound("User not found"));
    }
    if new_password.is_empty() {
        return Err(AppError::validation("Password is required"));
    }
    let password_hash = password::hash(new_password).await?;
    if db.update_user_password(id, &password_hash).await? == 0 {
        // removed between the check and the update
        return Err(AppError::NotFound("User not found"));
    }
    info!(user_id = %id, "password updated");
    Ok(())
}

/// Deletes a user together with their tokens. Refused while the user is still
/// the creator of any oink. Run under [`crate::tx::WriteTx`].
pub async fn delete(db: &mut dyn Queries, id: &str) -> Result<(), AppError> {
    if !exists_by_id(db, id).await? {
        return Err(AppError::NotFound("User not found"));
    }
    let owned = db.count_oinks_by_creator(id).await?;
    if owned > 0 {
        warn!(user_id = %id, owned, "user still owns oinks");
        return Err(AppError::InUse("User still owns oinks"));
    }
    let tokens = db.delete_tokens_for_user(id).await?;
    debug!(user_id = %id, tokens, "user tokens deleted");
    if db.delete_user(id).await? == 0 {
        // removed between the check and the delete
        return Err(AppError::NotFound("User not found"));
    }
    info!(user_id = %id, "user deleted");
    Ok(())
}

/// Unknown email and wrong password both yield `CredentialInvalid`.
pub async fn authenticate(
    db: &mut dyn Queries,
    email: &str,
    password: &str,
) -> Result<User, AppError> {
    let Some(user) = db.find_user(UserKey::Email(email)).await? else {
        warn!(email = %email, "login unknown email");
        return Err(AppError::CredentialInvalid);
    };
    if !password::verify(password, &user.password_hash).await? {
        warn!(user_id = %user.id, "login wrong password");
        return Err(AppError::CredentialInvalid);
    }
    Ok(user)
}
