use log::info;
use serde_json::Value;
use std::sync::Arc;

use super::request_client::HttpRequestClient;
use super::transport::{Headers, HttpMethod};
use crate::constants::{
    FORGOT_PASSWORD_PATH, REFRESH_TOKEN_PATH, RESEND_VERIFICATION_PATH, RESET_PASSWORD_PATH, SIGN_IN_PATH,
    SIGN_OUT_PATH, SIGN_UP_PATH, VERIFY_EMAIL_PATH, VERIFY_PHONE_PATH,
};
use crate::error::AppResult;
use crate::models::{
    AccessTokenResponse, Envelope, ForgotPasswordRequest, ResendVerificationRequest, ResetPasswordRequest,
    SignInRequest, SignUpRequest, TokenPair, VerifyEmailRequest, VerifyPhoneRequest,
};

/// Typed access to the `/api/auth/*` endpoints of the auth service
#[derive(Debug, Clone)]
pub struct AuthApiClient {
    client: Arc<HttpRequestClient>,
}

fn bearer(token: &str) -> Headers {
    Headers::from([("authorization".to_string(), format!("Bearer {}", token))])
}

impl AuthApiClient {
    pub fn new(client: Arc<HttpRequestClient>) -> Self {
        Self { client }
    }

    pub async fn sign_in(&self, credentials: &SignInRequest) -> AppResult<Envelope<TokenPair>> {
        info!("Signing in {}", credentials.email);
        self.client.post(SIGN_IN_PATH, credentials).await
    }

    pub async fn sign_up(&self, request: &SignUpRequest) -> AppResult<Envelope<Value>> {
        info!("Signing up {}", request.email);
        self.client.post(SIGN_UP_PATH, request).await
    }

    /// Mint a new access token, presenting the refresh token as bearer credential
    pub async fn refresh_access_token(&self, refresh_token: &str) -> AppResult<Envelope<AccessTokenResponse>> {
        self.client
            .request(HttpMethod::Post, REFRESH_TOKEN_PATH, None, Some(bearer(refresh_token)))
            .await
    }

    pub async fn sign_out(&self, refresh_token: &str) -> AppResult<Envelope<Value>> {
        self.client
            .request(HttpMethod::Post, SIGN_OUT_PATH, None, Some(bearer(refresh_token)))
            .await
    }

    pub async fn verify_email(&self, request: &VerifyEmailRequest) -> AppResult<Envelope<Value>> {
        self.client.post(VERIFY_EMAIL_PATH, request).await
    }

    pub async fn verify_phone(&self, request: &VerifyPhoneRequest) -> AppResult<Envelope<Value>> {
        self.client.post(VERIFY_PHONE_PATH, request).await
    }

    pub async fn resend_verification(&self, request: &ResendVerificationRequest) -> AppResult<Envelope<Value>> {
        self.client.post(RESEND_VERIFICATION_PATH, request).await
    }

    pub async fn forgot_password(&self, request: &ForgotPasswordRequest) -> AppResult<Envelope<Value>> {
        self.client.post(FORGOT_PASSWORD_PATH, request).await
    }

    pub async fn reset_password(&self, request: &ResetPasswordRequest) -> AppResult<Envelope<Value>> {
        self.client.post(RESET_PASSWORD_PATH, request).await
    }
}
