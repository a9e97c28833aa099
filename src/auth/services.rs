use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use super::{
    dto::{LoginRequest, RegisterRequest},
    jwt::JwtKeys,
    password::{hash_password_blocking, verify_password_blocking},
};
use crate::{
    error::{AppError, AppResult, AuthFailure, ConflictKind},
    users::{NewUser, User, UserRepo},
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Validates the request, rejects taken usernames and emails, then stores the
/// user with a hashed password.
#[instrument(skip_all, fields(username = %req.username))]
pub async fn register(users: &UserRepo, req: RegisterRequest) -> AppResult<User> {
    let username = req.username.trim().to_string();
    let email = normalize_email(&req.email);

    if username.is_empty() || email.is_empty() || req.password.is_empty() {
        warn!("registration with missing fields");
        return Err(AppError::validation("Please send valid body"));
    }
    if !is_valid_email(&email) {
        warn!(%email, "invalid email");
        return Err(AppError::validation("Invalid email"));
    }

    // The unique indexes settle races; this lookup only picks the message.
    if let Some(existing) = users
        .find_active_by_username_or_email(Some(&username), Some(&email))
        .await?
    {
        let conflict = if existing.username == username {
            ConflictKind::UsernameTaken
        } else {
            ConflictKind::EmailTaken
        };
        warn!(%conflict, "registration conflict");
        return Err(conflict.into());
    }

    let password_hash = hash_password_blocking(req.password).await?;
    let user = users
        .create(NewUser {
            username,
            name: req.name.trim().to_string(),
            email,
            password_hash,
            image_url: req.image_url,
        })
        .await?;

    info!(user_id = %user.id, "user registered");
    Ok(user)
}

/// Checks the credentials of a non-deleted user and issues a session token.
#[instrument(skip_all, fields(username = ?req.username, email = ?req.email))]
pub async fn login(
    users: &UserRepo,
    keys: &JwtKeys,
    req: LoginRequest,
) -> AppResult<(User, String)> {
    let username = req
        .username
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty());
    let email = req
        .email
        .as_deref()
        .map(normalize_email)
        .filter(|e| !e.is_empty());
    if username.is_none() && email.is_none() {
        return Err(AppError::validation("Please send valid body"));
    }

    let Some(user) = users
        .find_active_by_username_or_email(username, email.as_deref())
        .await?
    else {
        warn!("login for unknown user");
        return Err(AppError::NotFound("User"));
    };

    if !verify_password_blocking(req.password, user.password_hash.clone()).await {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AuthFailure::BadCredentials.into());
    }

    let token = keys.issue(&user.id.to_hex(), &user.username, user.is_verified)?;
    info!(user_id = %user.id, "user logged in");
    Ok((user, token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::password::verify_password, state::AppState};

    fn register_req(username: &str, email: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.into(),
            name: "Ann Example".into(),
            email: email.into(),
            password: "hunter22".into(),
            image_url: String::new(),
        }
    }

    fn login_req(username: Option<&str>, email: Option<&str>, password: &str) -> LoginRequest {
        LoginRequest {
            username: username.map(Into::into),
            email: email.map(Into::into),
            password: password.into(),
        }
    }

    #[test]
    fn email_shape() {
        assert!(is_valid_email("ann@example.com"));
        assert!(!is_valid_email("ann@example"));
        assert!(!is_valid_email("ann example@x.io"));
        assert!(!is_valid_email("@example.com"));
    }

    #[tokio::test]
    async fn register_stores_only_a_verifiable_hash() {
        let state = AppState::fake().await;
        let user = register(&state.users, register_req("ann", " Ann@Example.COM "))
            .await
            .unwrap();

        assert_eq!(user.email, "ann@example.com");
        assert!(!user.is_verified);
        assert_ne!(user.password_hash, "hunter22");
        assert!(verify_password("hunter22", &user.password_hash));

        let stored = state.users.get_by_id(&user.id.to_hex()).await.unwrap();
        assert_eq!(stored, user);
    }

    #[tokio::test]
    async fn register_reports_which_identifier_is_taken() {
        let state = AppState::fake().await;
        register(&state.users, register_req("ann", "ann@example.com"))
            .await
            .unwrap();

        let err = register(&state.users, register_req("ann", "new@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(ConflictKind::UsernameTaken)));

        let err = register(&state.users, register_req("bob", "ANN@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(ConflictKind::EmailTaken)));
    }

    #[tokio::test]
    async fn register_rejects_missing_fields_and_bad_email() {
        let state = AppState::fake().await;
        let mut req = register_req("ann", "ann@example.com");
        req.password.clear();
        assert!(matches!(
            register(&state.users, req).await.unwrap_err(),
            AppError::Validation(_)
        ));
        assert!(matches!(
            register(&state.users, register_req("", "ann@example.com"))
                .await
                .unwrap_err(),
            AppError::Validation(_)
        ));
        assert!(matches!(
            register(&state.users, register_req("ann", "not-an-email"))
                .await
                .unwrap_err(),
            AppError::Validation(m) if m == "Invalid email"
        ));
    }

    #[tokio::test]
    async fn soft_deleted_identifiers_can_be_registered_again() {
        let state = AppState::fake().await;
        let first = register(&state.users, register_req("ann", "ann@example.com"))
            .await
            .unwrap();
        state.users.soft_delete(&first.id.to_hex()).await.unwrap();

        let second = register(&state.users, register_req("ann", "ann@example.com"))
            .await
            .unwrap();
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn login_by_username_or_email_issues_a_seven_day_token() {
        let state = AppState::fake().await;
        let user = register(&state.users, register_req("ann", "ann@example.com"))
            .await
            .unwrap();

        let (_, token) = login(&state.users, &state.keys, login_req(Some("ann"), None, "hunter22"))
            .await
            .unwrap();
        let claims = state.keys.validate(&token).unwrap();
        assert_eq!(claims.sub, user.id.to_hex());
        assert_eq!(claims.username, "ann");
        assert_eq!(claims.exp - claims.iat, 7 * 24 * 60 * 60);

        let (found, _) = login(
            &state.users,
            &state.keys,
            login_req(None, Some("ANN@example.com"), "hunter22"),
        )
        .await
        .unwrap();
        assert_eq!(found.id, user.id);
    }

    #[tokio::test]
    async fn login_failures() {
        let state = AppState::fake().await;
        let user = register(&state.users, register_req("ann", "ann@example.com"))
            .await
            .unwrap();

        let err = login(&state.users, &state.keys, login_req(Some("ann"), None, "wrong"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthFailure::BadCredentials)));

        let err = login(&state.users, &state.keys, login_req(Some("bob"), None, "hunter22"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound("User")));

        let err = login(&state.users, &state.keys, login_req(Some("  "), None, "hunter22"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        state.users.soft_delete(&user.id.to_hex()).await.unwrap();
        let err = login(&state.users, &state.keys, login_req(Some("ann"), None, "hunter22"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound("User")));
    }
}
