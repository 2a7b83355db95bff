//! Session authentication: provider sign-in, session lookup and sign-out.

use crate::models::user::IDENTITY_SESSION_KEY;
use crate::models::{Credentials, Identity};
use crate::services::authorizer::CredentialAuthorizer;
use crate::services::metrics;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tower_sessions::Session;

/// Provider id of the email/password strategy.
pub const CREDENTIALS_PROVIDER: &str = "credentials";

/// Error code returned when the credentials provider rejects a sign-in.
pub const CREDENTIALS_SIGNIN_ERROR: &str = "CredentialsSignin";

/// Error code returned for an unknown provider or a broken session store.
pub const CONFIGURATION_ERROR: &str = "Configuration";

#[derive(Debug, Clone, Default)]
pub struct SignInOptions {
    /// Whether the caller wants to be redirected instead of receiving the result.
    /// [`SessionAuth::sign_in`] always returns the result; acting on this flag
    /// is up to the HTTP layer.
    pub redirect: bool,
    /// Where to go after a successful sign-in. Only same-origin paths are
    /// honoured; anything else becomes `/`.
    pub callback_url: Option<String>,
}

/// `url` if it is a same-origin absolute path, `/` otherwise.
///
/// Rejects scheme-qualified URLs and protocol-relative `//host` or `/\host`
/// forms, which browsers resolve to another origin, and anything that is not
/// a valid `Location` header value.
pub fn safe_callback_url(url: Option<&str>) -> String {
    match url {
        Some(url)
            if url.starts_with('/')
                && !url.starts_with("//")
                && !url.starts_with("/\\")
                && url.is_ascii()
                && !url.chars().any(|c| c.is_ascii_control()) =>
        {
            url.to_string()
        }
        Some(url) => {
            tracing::warn!(callback_url = %url, "Ignoring off-site callback URL");
            "/".to_string()
        }
        None => "/".to_string(),
    }
}

/// Outcome of a sign-in attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignInResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub status: u16,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl SignInResponse {
    fn success(url: String) -> Self {
        Self {
            error: None,
            status: 200,
            ok: true,
            url: Some(url),
        }
    }

    fn failure(error: &str, status: u16) -> Self {
        Self {
            error: Some(error.to_string()),
            status,
            ok: false,
            url: None,
        }
    }
}

/// The session-authentication function the login flow calls.
#[async_trait]
pub trait SignIn: Send + Sync {
    async fn sign_in(
        &self,
        provider: &str,
        credentials: Credentials,
        options: SignInOptions,
    ) -> SignInResponse;
}

#[derive(Clone)]
pub struct SessionAuth {
    authorizer: CredentialAuthorizer,
}

impl SessionAuth {
    pub fn new(authorizer: CredentialAuthorizer) -> Self {
        Self { authorizer }
    }

    /// Authenticate with `provider` and, on success, bind the identity to `session`.
    pub async fn sign_in(
        &self,
        session: &Session,
        provider: &str,
        credentials: Credentials,
        options: SignInOptions,
    ) -> SignInResponse {
        if provider != CREDENTIALS_PROVIDER {
            tracing::warn!(provider = %provider, "Sign-in with unknown provider");
            metrics::record_sign_in(provider, "unknown_provider");
            return SignInResponse::failure(CONFIGURATION_ERROR, 400);
        }

        let identity = match self
            .authorizer
            .authorize(&credentials.email, &credentials.password)
            .await
        {
            Ok(identity) => identity,
            Err(_) => {
                metrics::record_sign_in(provider, "rejected");
                return SignInResponse::failure(CREDENTIALS_SIGNIN_ERROR, 401);
            }
        };

        // New session id on privilege change
        if let Err(e) = session.cycle_id().await {
            tracing::error!("Failed to cycle session id: {}", e);
            metrics::record_sign_in(provider, "session_error");
            return SignInResponse::failure(CONFIGURATION_ERROR, 500);
        }
        if let Err(e) = session.insert(IDENTITY_SESSION_KEY, &identity).await {
            tracing::error!("Failed to store identity in session: {}", e);
            metrics::record_sign_in(provider, "session_error");
            return SignInResponse::failure(CONFIGURATION_ERROR, 500);
        }

        tracing::info!(
            user_id = %identity.id,
            email = %identity.email,
            "User logged in successfully"
        );
        metrics::record_sign_in(provider, "success");

        SignInResponse::success(safe_callback_url(options.callback_url.as_deref()))
    }

    pub async fn current_identity(
        &self,
        session: &Session,
    ) -> Result<Option<Identity>, tower_sessions::session::Error> {
        session.get::<Identity>(IDENTITY_SESSION_KEY).await
    }

    pub async fn sign_out(&self, session: &Session) -> Result<(), tower_sessions::session::Error> {
        if let Ok(Some(identity)) = self.current_identity(session).await {
            tracing::info!(user_id = %identity.id, "User signed out");
        }
        session.flush().await
    }
}

/// [`SignIn`] bound to one request's session.
pub struct SessionSignIn {
    auth: Arc<SessionAuth>,
    session: Session,
}

impl SessionSignIn {
    pub fn new(auth: Arc<SessionAuth>, session: Session) -> Self {
        Self { auth, session }
    }
}

#[async_trait]
impl SignIn for SessionSignIn {
    async fn sign_in(
        &self,
        provider: &str,
        credentials: Credentials,
        options: SignInOptions,
    ) -> SignInResponse {
        self.auth
            .sign_in(&self.session, provider, credentials, options)
            .await
    }
}
