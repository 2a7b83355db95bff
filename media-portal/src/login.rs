//! The login form: two controlled fields and a submit action.

use crate::models::Credentials;
use crate::services::session::{SignIn, SignInOptions, CREDENTIALS_PROVIDER};

pub const LOGIN_FAILED_MESSAGE: &str = "Login failed. Please check your credentials.";

/// What the page should do after a submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Navigate(String),
    /// Blocking notification; the user stays on the form.
    Alert(String),
}

pub struct LoginFlow<S> {
    sign_in: S,
    email: String,
    password: String,
}

impl<S: SignIn> LoginFlow<S> {
    pub fn new(sign_in: S) -> Self {
        Self {
            sign_in,
            email: String::new(),
            password: String::new(),
        }
    }

    pub fn set_email(&mut self, email: impl Into<String>) {
        self.email = email.into();
    }

    pub fn set_password(&mut self, password: impl Into<String>) {
        self.password = password.into();
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// Submit the current field values.
    pub async fn submit(&self) -> LoginOutcome {
        let result = self
            .sign_in
            .sign_in(
                CREDENTIALS_PROVIDER,
                Credentials::new(self.email.clone(), self.password.clone()),
                SignInOptions {
                    redirect: false,
                    callback_url: None,
                },
            )
            .await;

        match result.error {
            Some(error) => {
                tracing::error!(error = %error, "Login failed");
                LoginOutcome::Alert(LOGIN_FAILED_MESSAGE.to_string())
            }
            None => LoginOutcome::Navigate("/".to_string()),
        }
    }

    /// Fill both fields and submit.
    pub async fn submit_with(
        &mut self,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> LoginOutcome {
        self.set_email(email);
        self.set_password(password);
        self.submit().await
    }
}
