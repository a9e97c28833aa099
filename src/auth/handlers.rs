use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    routing::post,
    Router,
};
use tracing::{info, instrument};

use super::{
    dto::{LoginRequest, RegisterRequest, TokenResponse},
    services,
};
use crate::{
    envelope::{ApiResult, AppJson, Envelope},
    error::AppError,
    state::AppState,
    users::User,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> ApiResult<User> {
    let user = services::register(&state.users, payload).await?;
    Ok(Envelope::created("User registered successfully", user))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (_, token) = services::login(&state.users, &state.keys, payload).await?;
    let cookie = state.cookie.build(&token);
    Ok((
        [(header::SET_COOKIE, cookie)],
        Envelope::ok("Login successful", TokenResponse { token }),
    ))
}

#[instrument(skip(state))]
pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    info!("session cleared");
    (
        [(header::SET_COOKIE, state.cookie.clear())],
        Envelope::message("Logout successful"),
    )
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        response::Response,
    };
    use tower::ServiceExt;

    use super::*;

    fn app(state: AppState) -> Router {
        auth_routes().with_state(state)
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json(res: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn register_then_login_sets_the_session_cookie() {
        let state = AppState::fake().await;
        let res = app(state.clone())
            .oneshot(post_json(
                "/register",
                serde_json::json!({ "username": "ann", "email": "ann@example.com", "password": "pw" }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        let body = json(res).await;
        assert_eq!(body["data"]["username"], "ann");
        assert!(body["data"].get("password").is_none());

        let res = app(state.clone())
            .oneshot(post_json(
                "/login",
                serde_json::json!({ "username": "ann", "password": "pw" }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let cookie = res
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap()
            .to_string();
        let body = json(res).await;
        let token = body["data"]["token"].as_str().unwrap();
        assert!(cookie.starts_with(&format!("token={token}; HttpOnly")));
        assert!(state.keys.validate(token).is_ok());
    }

    #[tokio::test]
    async fn malformed_body_is_an_enveloped_bad_request() {
        let res = app(AppState::fake().await)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/login")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body = json(res).await;
        assert_eq!(body["status"], 400);
        assert!(body["message"]
            .as_str()
            .unwrap()
            .starts_with("Please send valid body"));
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let state = AppState::fake().await;
        services::register(
            &state.users,
            RegisterRequest {
                username: "ann".into(),
                name: String::new(),
                email: "ann@example.com".into(),
                password: "pw".into(),
                image_url: String::new(),
            },
        )
        .await
        .unwrap();

        let res = app(state)
            .oneshot(post_json(
                "/login",
                serde_json::json!({ "email": "ann@example.com", "password": "nope" }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert!(res.headers().get(header::SET_COOKIE).is_none());
        assert_eq!(json(res).await["message"], "Invalid credentials");
    }

    #[tokio::test]
    async fn logout_expires_the_cookie() {
        let res = app(AppState::fake().await)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/logout")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let cookie = res.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with("token=;"));
        assert!(cookie.ends_with("Max-Age=0"));
    }
}
