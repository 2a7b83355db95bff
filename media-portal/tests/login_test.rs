mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use common::{spawn_app, TEST_EMAIL, TEST_PASSWORD};
use http_body_util::BodyExt;
use media_portal::login::LOGIN_FAILED_MESSAGE;
use serde_json::{json, Value};
use tower::util::ServiceExt;

async fn body_string(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn session_cookie(response: &axum::response::Response) -> String {
    response
        .headers()
        .get(header::SET_COOKIE)
        .expect("response should set a session cookie")
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string()
}

fn login_form(email: &str, password: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/login")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!("email={}&password={}", email, password)))
        .unwrap()
}

async fn get_session(app: &Router, cookie: Option<&str>) -> Value {
    let mut request = Request::builder().uri("/api/auth/session");
    if let Some(cookie) = cookie {
        request = request.header(header::COOKIE, cookie);
    }
    let response = app
        .clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    serde_json::from_str(&body_string(response).await).unwrap()
}

#[tokio::test]
async fn health_check_works() {
    let response = spawn_app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(
        response.headers().get(header::X_CONTENT_TYPE_OPTIONS).unwrap(),
        "nosniff"
    );
}

#[tokio::test]
async fn readiness_fails_without_mongodb() {
    let response = spawn_app()
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn login_page_renders_form() {
    let response = spawn_app()
        .oneshot(Request::builder().uri("/login").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("name=\"email\""));
    assert!(body.contains("name=\"password\""));
    assert!(!body.contains("role=\"alert\""));
}

#[tokio::test]
async fn index_redirects_anonymous_users_to_login() {
    let response = spawn_app()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert!(response.status().is_redirection());
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/login");
}

#[tokio::test]
async fn successful_login_establishes_session() {
    let app = spawn_app();

    let response = app
        .clone()
        .oneshot(login_form(TEST_EMAIL, TEST_PASSWORD))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");
    let cookie = session_cookie(&response);

    let session = get_session(&app, Some(&cookie)).await;
    assert_eq!(session["user"]["email"], TEST_EMAIL);
    assert_eq!(session["user"]["name"], "Una");
    assert!(session["user"].get("password").is_none());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("Welcome, Una"));
}

#[tokio::test]
async fn htmx_login_uses_hx_redirect() {
    let mut request = login_form(TEST_EMAIL, TEST_PASSWORD);
    request
        .headers_mut()
        .insert("HX-Request", "true".parse().unwrap());

    let response = spawn_app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("HX-Redirect").unwrap(), "/");
}

#[tokio::test]
async fn failed_login_shows_alert_and_keeps_email() {
    let app = spawn_app();

    let response = app
        .clone()
        .oneshot(login_form(TEST_EMAIL, "wrong"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.headers().get(header::LOCATION).is_none());
    let body = body_string(response).await;
    assert!(body.contains(LOGIN_FAILED_MESSAGE));
    assert!(body.contains(TEST_EMAIL));

    assert_eq!(get_session(&app, None).await, json!({}));
}

#[tokio::test]
async fn unknown_user_gets_the_same_alert() {
    let mut request = login_form("nobody@test.com", TEST_PASSWORD);
    request
        .headers_mut()
        .insert("HX-Request", "true".parse().unwrap());

    let response = spawn_app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.headers().get("HX-Redirect").is_none());
    assert!(body_string(response).await.contains(LOGIN_FAILED_MESSAGE));
}

#[tokio::test]
async fn credentials_callback_returns_result_without_redirect() {
    let app = spawn_app();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/callback/credentials")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({
                        "email": TEST_EMAIL,
                        "password": TEST_PASSWORD,
                        "redirect": false,
                        "callbackUrl": "/uploads"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = session_cookie(&response);
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body, json!({ "status": 200, "ok": true, "url": "/uploads" }));

    let session = get_session(&app, Some(&cookie)).await;
    assert_eq!(session["user"]["email"], TEST_EMAIL);
}

#[tokio::test]
async fn credentials_callback_never_redirects_off_site() {
    for callback_url in ["https://evil.example", "//evil.example", "/\\evil.example"] {
        let response = spawn_app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/auth/callback/credentials")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        json!({
                            "email": TEST_EMAIL,
                            "password": TEST_PASSWORD,
                            "redirect": true,
                            "callbackUrl": callback_url
                        })
                        .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{callback_url}");
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "/",
            "{callback_url}"
        );
    }
}

#[tokio::test]
async fn credentials_callback_redirects_to_local_path() {
    let response = spawn_app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/callback/credentials")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({
                        "email": TEST_EMAIL,
                        "password": TEST_PASSWORD,
                        "redirect": true,
                        "callbackUrl": "/uploads"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/uploads");
}

#[tokio::test]
async fn credentials_callback_rejects_bad_password() {
    let response = spawn_app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/callback/credentials")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "email": TEST_EMAIL, "password": "wrong" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(
        body,
        json!({ "error": "CredentialsSignin", "status": 401, "ok": false })
    );
}

#[tokio::test]
async fn unknown_provider_is_a_configuration_error() {
    let response = spawn_app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/callback/github")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "email": TEST_EMAIL, "password": TEST_PASSWORD }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["error"], "Configuration");
}

#[tokio::test]
async fn sign_out_clears_session() {
    let app = spawn_app();

    let response = app
        .clone()
        .oneshot(login_form(TEST_EMAIL, TEST_PASSWORD))
        .await
        .unwrap();
    let cookie = session_cookie(&response);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/signout")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/login");

    assert_eq!(get_session(&app, Some(&cookie)).await, json!({}));
}

#[tokio::test]
async fn metrics_endpoint_exports_sign_in_counter() {
    let app = spawn_app();
    app.clone()
        .oneshot(login_form(TEST_EMAIL, "wrong"))
        .await
        .unwrap();

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("sign_in_attempts_total"));
    assert!(body.contains("http_requests_total"));
}
