use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use crate::auth::dto::{LoginRequest, RegisterRequest, UpdateUserRequest};
use crate::auth::password::{check_password, hash_password, verify_password};
use crate::auth::repo::{UniqueViolation, UserStore};
use crate::auth::repo_types::{NewUser, Profile, User, UserChanges};
use crate::error::AppError;

const MAX_FIELD_LEN: usize = 255;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn required(field: &'static str, value: Option<String>) -> Result<String, AppError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AppError::validation(field, "This field is required.")),
    }
}

fn clean_email(raw: String) -> Result<String, AppError> {
    let email = raw.trim().to_lowercase();
    if email.chars().count() > MAX_FIELD_LEN {
        return Err(AppError::validation(
            "email",
            "Ensure this field has no more than 255 characters.",
        ));
    }
    if !is_valid_email(&email) {
        return Err(AppError::validation("email", "Enter a valid email address."));
    }
    Ok(email)
}

fn clean_username(raw: String) -> Result<String, AppError> {
    let username = raw.trim().to_string();
    if username.is_empty() {
        return Err(AppError::validation("username", "This field may not be blank."));
    }
    if username.chars().count() > MAX_FIELD_LEN {
        return Err(AppError::validation(
            "username",
            "Ensure this field has no more than 255 characters.",
        ));
    }
    Ok(username)
}

async fn ensure_email_free(
    users: &dyn UserStore,
    email: &str,
    owner: Option<&User>,
) -> Result<(), AppError> {
    match users.find_by_email(email).await? {
        Some(existing) if Some(existing.id) != owner.map(|u| u.id) => Err(AppError::validation(
            "email",
            "user with this email already exists.",
        )),
        _ => Ok(()),
    }
}

async fn ensure_username_free(
    users: &dyn UserStore,
    username: &str,
    owner: Option<&User>,
) -> Result<(), AppError> {
    match users.find_by_username(username).await? {
        Some(existing) if Some(existing.id) != owner.map(|u| u.id) => Err(AppError::validation(
            "username",
            "user with this username already exists.",
        )),
        _ => Ok(()),
    }
}

/// A uniqueness race lost at the store becomes the same 400 the pre-checks give.
fn store_write_error(err: anyhow::Error) -> AppError {
    match err.downcast_ref::<UniqueViolation>() {
        Some(taken) => AppError::validation(
            taken.field,
            format!("user with this {} already exists.", taken.field),
        ),
        None => AppError::Internal(err),
    }
}

/// Validate the request, then create the user together with its profile.
pub async fn register_user(
    users: &dyn UserStore,
    req: RegisterRequest,
) -> Result<(User, Profile), AppError> {
    let email = clean_email(required("email", req.email)?)?;
    let username = clean_username(required("username", req.username)?)?;
    let password = required("password", req.password)?;
    check_password(&password)?;

    ensure_email_free(users, &email, None).await?;
    ensure_username_free(users, &username, None).await?;

    let password_hash = hash_password(&password)?;
    let (user, profile) = users
        .create(NewUser {
            email,
            username,
            password_hash,
        })
        .await
        .map_err(store_write_error)?;

    info!(user_id = user.id, username = %user.username, "user registered");
    Ok((user, profile))
}

/// Key for errors that are about the request as a whole rather than one field.
pub(crate) const NON_FIELD_ERRORS: &str = "non_field_errors";

/// Check email and password, refusing deactivated accounts.
pub async fn login_user(users: &dyn UserStore, req: LoginRequest) -> Result<User, AppError> {
    let rejected = |message: &str| AppError::validation(NON_FIELD_ERRORS, message);

    let Some(email) = req.email.filter(|e| !e.trim().is_empty()) else {
        return Err(rejected("Email required to log in"));
    };
    let Some(password) = req.password.filter(|p| !p.is_empty()) else {
        return Err(rejected("Password required to log in"));
    };
    let email = email.trim().to_lowercase();

    let Some(user) = users.find_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(rejected("email/password not found"));
    };

    if !verify_password(&password, &user.password_hash)? {
        warn!(user_id = user.id, "login invalid password");
        return Err(rejected("email/password not found"));
    }

    if !user.is_active {
        warn!(user_id = user.id, "login for deactivated user");
        return Err(rejected("User has been deactivated"));
    }

    info!(user_id = user.id, "user logged in");
    Ok(user)
}

/// Apply a partial update to `current` and its profile.
pub async fn update_user(
    users: &dyn UserStore,
    current: &User,
    req: UpdateUserRequest,
) -> Result<(User, Profile), AppError> {
    let mut changes = UserChanges {
        bio: req.bio,
        image: req.image,
        ..Default::default()
    };

    if let Some(raw) = req.email {
        let email = clean_email(raw)?;
        ensure_email_free(users, &email, Some(current)).await?;
        changes.email = Some(email);
    }
    if let Some(raw) = req.username {
        let username = clean_username(raw)?;
        ensure_username_free(users, &username, Some(current)).await?;
        changes.username = Some(username);
    }
    if let Some(password) = req.password {
        check_password(&password)?;
        changes.password_hash = Some(hash_password(&password)?);
    }

    let (user, profile) = users
        .update(current.id, changes)
        .await
        .map_err(store_write_error)?;
    info!(user_id = user.id, "user updated");
    Ok((user, profile))
}
