use crate::login::{LoginFlow, LoginOutcome};
use crate::models::Credentials;
use crate::services::session::{SessionSignIn, SignInOptions, CREDENTIALS_SIGNIN_ERROR};
use crate::utils::Password;
use crate::AppState;
use askama::Template;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Form, Json,
};
use serde::Deserialize;
use serde_json::json;
use service_core::error::AppError;
use tower_sessions::Session;

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub email: String,
    pub error: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default = "Password::empty")]
    pub password: Password,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default = "Password::empty")]
    pub password: Password,
    #[serde(default)]
    pub redirect: bool,
    pub callback_url: Option<String>,
}

fn is_htmx(headers: &HeaderMap) -> bool {
    headers.contains_key("hx-request")
}

/// HTMX requests get `HX-Redirect`; plain form posts get a 303.
fn navigate(headers: &HeaderMap, path: &str) -> Response {
    if !is_htmx(headers) {
        return Redirect::to(path).into_response();
    }

    let mut response_headers = HeaderMap::new();
    match HeaderValue::from_str(path) {
        Ok(value) => {
            response_headers.insert("HX-Redirect", value);
        }
        Err(e) => {
            tracing::error!("Invalid redirect target {}: {}", path, e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }
    (StatusCode::OK, response_headers, "").into_response()
}

pub async fn login_page() -> impl IntoResponse {
    LoginTemplate {
        email: String::new(),
        error: None,
    }
}

pub async fn login_handler(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(payload): Form<LoginRequest>,
) -> Response {
    let mut flow = LoginFlow::new(SessionSignIn::new(state.session_auth.clone(), session));

    let outcome = flow
        .submit_with(payload.email.clone(), payload.password.expose())
        .await;

    match outcome {
        LoginOutcome::Navigate(path) => navigate(&headers, &path),
        LoginOutcome::Alert(message) if is_htmx(&headers) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Html(format!(
                "<p class='text-red-500 text-sm' role='alert'>{}</p>",
                message
            )),
        )
            .into_response(),
        LoginOutcome::Alert(message) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            LoginTemplate {
                email: payload.email,
                error: Some(message),
            },
        )
            .into_response(),
    }
}

/// `POST /api/auth/callback/:provider` with a JSON body.
pub async fn sign_in_handler(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    session: Session,
    Json(payload): Json<SignInRequest>,
) -> Response {
    let credentials = Credentials {
        email: payload.email,
        password: payload.password,
    };
    let options = SignInOptions {
        redirect: payload.redirect,
        callback_url: payload.callback_url,
    };
    let redirect = options.redirect;

    let response = state
        .session_auth
        .sign_in(&session, &provider, credentials, options)
        .await;

    if redirect {
        return match (&response.url, &response.error) {
            (Some(url), None) => Redirect::to(url).into_response(),
            (_, error) => Redirect::to(&format!(
                "/login?error={}",
                error.as_deref().unwrap_or(CREDENTIALS_SIGNIN_ERROR)
            ))
            .into_response(),
        };
    }

    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(response)).into_response()
}

/// `GET /api/auth/session`: `{"user": {...}}` when signed in, `{}` otherwise.
pub async fn session_handler(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<serde_json::Value>, AppError> {
    let identity = state
        .session_auth
        .current_identity(&session)
        .await
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("session read failed: {}", e)))?;

    Ok(Json(match identity {
        Some(user) => json!({ "user": user }),
        None => json!({}),
    }))
}

pub async fn sign_out_handler(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    state
        .session_auth
        .sign_out(&session)
        .await
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("session flush failed: {}", e)))?;

    Ok(navigate(&headers, "/login"))
}
