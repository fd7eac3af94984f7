use axum::{
    extract::{FromRef, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{instrument, warn};

use crate::{
    auth::{
        dto::{
            EmailRequest, LoginRequest, LoginResponse, MessageResponse, OAuthCallbackRequest,
            OAuthCallbackResponse, PublicUser, RegisterRequest, RegisterResponse,
            ResetPasswordRequest, VerifyEmailQuery,
        },
        jwt::{AuthUser, SessionKeys},
        providers::ProviderSet,
        services,
    },
    error::AuthError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/providers", get(providers))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/verify-email", get(verify_email))
        .route("/auth/verify-email/resend", post(resend_verification))
        .route("/auth/password/forgot", post(forgot_password))
        .route("/auth/password/reset", post(reset_password))
        .route("/auth/oauth/callback", post(oauth_callback))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

pub async fn providers(State(state): State<AppState>) -> Json<ProviderSet> {
    Json(state.providers())
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AuthError> {
    let registration = services::register(&state, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: registration.message().to_string(),
            verification_email_sent: registration.verification_email_sent,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AuthError> {
    services::login(&state, &payload.email, &payload.password)
        .await
        .map(Json)
}

#[instrument(skip(state, query))]
pub async fn verify_email(
    State(state): State<AppState>,
    Query(query): Query<VerifyEmailQuery>,
) -> Result<Json<MessageResponse>, AuthError> {
    services::verify_email(&state, query.token.as_deref()).await?;
    Ok(Json(MessageResponse::new(services::EMAIL_VERIFIED)))
}

#[instrument(skip(state, payload))]
pub async fn resend_verification(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    services::resend_verification(&state, &payload.email).await?;
    Ok(Json(MessageResponse::new(services::VERIFICATION_RESENT)))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    services::request_password_reset(&state, &payload.email).await?;
    Ok(Json(MessageResponse::new(services::RESET_LINK_SENT)))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    services::reset_password(&state, payload).await?;
    Ok(Json(MessageResponse::new(services::PASSWORD_UPDATED)))
}

#[instrument(skip(state, payload))]
pub async fn oauth_callback(
    State(state): State<AppState>,
    Json(payload): Json<OAuthCallbackRequest>,
) -> Result<Json<OAuthCallbackResponse>, AuthError> {
    let keys = SessionKeys::from_ref(&state);
    let identity = keys
        .verify_provider_assertion(&payload.assertion)
        .map_err(|e| {
            warn!(error = %e, "rejected provider assertion");
            AuthError::AccessDenied("invalid provider assertion")
        })?;
    services::oauth_sign_in(&state, identity).await.map(Json)
}

#[instrument(skip(state, user))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<PublicUser>, AuthError> {
    match state.store.find_by_id(user.sub).await? {
        Some(u) => Ok(Json(PublicUser::from(&u))),
        None => {
            warn!(user_id = %user.sub, "session grant for missing user");
            Err(AuthError::InvalidCredentials)
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request},
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::auth::dto::ProviderIdentity;
    use crate::error::{ACCESS_DENIED, EMAIL_TAKEN, INVALID_CREDENTIALS, INVALID_RESET_LINK};
    use crate::state::Fake;
    use crate::store::{AuthProvider, AuthStore};

    fn app(fake: &Fake) -> Router {
        auth_routes()
            .merge(me_routes())
            .with_state(fake.state.clone())
    }

    async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn register_ada() -> Request<Body> {
        post_json(
            "/auth/register",
            json!({"name": "Ada", "email": "ada@example.com", "password": "secret1"}),
        )
    }

    #[tokio::test]
    async fn providers_lists_configured_methods() {
        let fake = crate::state::AppState::fake();
        let app = app(&fake);
        let (status, body) = call(
            &app,
            Request::get("/auth/providers").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"credentials": true, "github": true, "google": false}));
    }

    #[tokio::test]
    async fn register_then_duplicate() {
        let fake = crate::state::AppState::fake();
        let app = app(&fake);

        let (status, body) = call(&app, register_ada()).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message"], services::REGISTERED);
        assert_eq!(body["verification_email_sent"], true);

        let (status, body) = call(&app, register_ada()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], EMAIL_TAKEN);
    }

    #[tokio::test]
    async fn register_reports_field_errors() {
        let fake = crate::state::AppState::fake();
        let (status, body) = call(
            &app(&fake),
            post_json(
                "/auth/register",
                json!({"name": "A", "email": "ada@example.com", "password": "secret1"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["fields"]["name"][0], "Name must be at least 2 characters.");
    }

    #[tokio::test]
    async fn verify_login_and_me() {
        let fake = crate::state::AppState::fake();
        let app = app(&fake);
        call(&app, register_ada()).await;
        let token = fake.mailer.last_token_for("ada@example.com").unwrap();

        let (status, body) = call(
            &app,
            Request::get(format!("/auth/verify-email?token={token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], services::EMAIL_VERIFIED);

        let (status, body) = call(
            &app,
            post_json(
                "/auth/login",
                json!({"email": "ada@example.com", "password": "secret1"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let grant = body["session_grant"].as_str().unwrap().to_string();

        let (status, body) = call(
            &app,
            Request::get("/me")
                .header(header::AUTHORIZATION, format!("Bearer {grant}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "ada@example.com");
        assert_eq!(body["name"], "Ada");
    }

    #[tokio::test]
    async fn me_requires_grant() {
        let fake = crate::state::AppState::fake();
        let res = app(&fake)
            .oneshot(Request::get("/me").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn login_failures_share_message() {
        let fake = crate::state::AppState::fake();
        let app = app(&fake);
        call(&app, register_ada()).await;
        let user = fake
            .store
            .find_by_email("ada@example.com")
            .await
            .unwrap()
            .unwrap();
        fake.store.mark_email_verified(user.id).await.unwrap();

        let (s1, b1) = call(
            &app,
            post_json(
                "/auth/login",
                json!({"email": "ghost@example.com", "password": "secret1"}),
            ),
        )
        .await;
        let (s2, b2) = call(
            &app,
            post_json(
                "/auth/login",
                json!({"email": "ada@example.com", "password": "wrong-one"}),
            ),
        )
        .await;
        assert_eq!(s1, StatusCode::UNAUTHORIZED);
        assert_eq!((s1, &b1), (s2, &b2));
        assert_eq!(b1["error"], INVALID_CREDENTIALS);
    }

    #[tokio::test]
    async fn forgot_password_answers_identically() {
        let fake = crate::state::AppState::fake();
        let app = app(&fake);
        call(&app, register_ada()).await;

        let (_, known) = call(
            &app,
            post_json("/auth/password/forgot", json!({"email": "ada@example.com"})),
        )
        .await;
        let (status, unknown) = call(
            &app,
            post_json("/auth/password/forgot", json!({"email": "ghost@example.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(known, unknown);
        assert_eq!(unknown["message"], services::RESET_LINK_SENT);
    }

    #[tokio::test]
    async fn reset_with_bad_token_is_rejected() {
        let fake = crate::state::AppState::fake();
        let (status, body) = call(
            &app(&fake),
            post_json(
                "/auth/password/reset",
                json!({"token": "0123456789abcdef", "password": "secret1", "confirmPassword": "secret1"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], INVALID_RESET_LINK);
    }

    #[tokio::test]
    async fn oauth_callback_links_signed_identity() {
        let fake = crate::state::AppState::fake();
        let keys = SessionKeys::from_ref(&fake.state);
        let assertion = keys
            .sign_provider_assertion(&ProviderIdentity {
                provider: AuthProvider::Github,
                provider_account_id: Some("99".into()),
                email: Some("grace@example.com".into()),
                name: Some("Grace".into()),
                image_url: None,
            })
            .unwrap();

        let (status, body) = call(
            &app(&fake),
            post_json("/auth/oauth/callback", json!({ "assertion": assertion })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["accepted"], true);
        assert_eq!(body["user"]["email"], "grace@example.com");
        assert_eq!(fake.store.user_count().await, 1);
    }

    #[tokio::test]
    async fn oauth_callback_rejects_forged_assertion() {
        let fake = crate::state::AppState::fake();
        let (status, body) = call(
            &app(&fake),
            post_json("/auth/oauth/callback", json!({"assertion": "not-a-jwt"})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], ACCESS_DENIED);
        assert_eq!(fake.store.user_count().await, 0);
    }
}
