//! Authentication and account endpoints.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use validator::Validate;
use super::{ApiClient, Endpoint, MessageBody, MultipartBody, RequestBody};
use crate::domain::aggregates::ImageUpload;
use crate::{Result, StorefrontError, User};

#[derive(Clone, Debug, Serialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "email is invalid"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

#[derive(Clone, Debug, Serialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 2, message = "name is required"))]
    pub name: String,
    #[validate(email(message = "email is invalid"))]
    pub email: String,
    #[validate(length(min = 3, max = 30, message = "username must be between 3 and 30 characters"))]
    pub username: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Clone, Debug, Default, Validate)]
pub struct ProfileUpdate {
    #[validate(length(min = 2, message = "name is required"))]
    pub name: String,
    #[validate(length(min = 3, max = 30, message = "username must be between 3 and 30 characters"))]
    pub username: String,
    pub phone: Option<String>,
    #[validate(length(max = 500, message = "bio is too long"))]
    pub bio: Option<String>,
    pub photo: Option<ImageUpload>,
}

#[derive(Clone, Debug, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "current password is required"))]
    pub current_password: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub new_password: String,
}

/// Result of a login attempt.
#[derive(Clone, Debug)]
pub enum LoginOutcome {
    Authenticated(User),
    /// The account has two-factor authentication; call
    /// [`ApiClient::verify_two_factor`] with this token and the code.
    TwoFactorRequired { temp_token: String },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionBody {
    token: Option<String>,
    user: Option<User>,
    #[serde(default)]
    requires_two_factor: bool,
    temp_token: Option<String>,
}

impl ApiClient {
    pub async fn login(&self, credentials: &LoginRequest) -> Result<LoginOutcome> {
        credentials.validate()?;
        let body: SessionBody = self.send_json(Method::POST, "/auth/login", credentials).await?;
        if body.requires_two_factor {
            let temp_token = body.temp_token.ok_or_else(|| StorefrontError::Api { status: 200, message: "two-factor challenge without token".into() })?;
            tracing::info!("two-factor verification required");
            return Ok(LoginOutcome::TwoFactorRequired { temp_token });
        }
        self.start_session(body).await.map(LoginOutcome::Authenticated)
    }

    pub async fn verify_two_factor(&self, temp_token: &str, code: &str) -> Result<User> {
        let body: SessionBody = self
            .send_json(Method::POST, "/auth/verify-2fa", &serde_json::json!({ "tempToken": temp_token, "code": code }))
            .await?;
        self.start_session(body).await
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<User> {
        request.validate()?;
        let body: SessionBody = self.send_json(Method::POST, "/auth/register", request).await?;
        self.start_session(body).await
    }

    pub async fn forgot_password(&self, email: &str) -> Result<String> {
        let body: MessageBody = self.send_json(Method::POST, "/auth/forgot-password", &serde_json::json!({ "email": email })).await?;
        Ok(body.message)
    }

    pub async fn reset_password(&self, reset_token: &str, password: &str) -> Result<String> {
        let endpoint = Endpoint::new("/auth/reset-password").param(reset_token);
        let body: MessageBody = self.send_json(Method::POST, endpoint, &serde_json::json!({ "password": password })).await?;
        Ok(body.message)
    }

    pub async fn current_user(&self) -> Result<User> {
        if !self.is_authenticated().await { return Err(StorefrontError::Unauthorized); }
        self.get("/auth/me").await
    }

    /// Sends JSON, or multipart form data when a new photo is attached.
    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<User> {
        update.validate()?;
        let body = match update.photo {
            Some(photo) => {
                let mut form = MultipartBody::new().text("name", update.name).text("username", update.username);
                if let Some(phone) = update.phone { form = form.text("phone", phone); }
                if let Some(bio) = update.bio { form = form.text("bio", bio); }
                RequestBody::Multipart(form.file("image", photo))
            }
            None => RequestBody::Json(serde_json::json!({
                "name": update.name,
                "username": update.username,
                "phone": update.phone,
                "bio": update.bio,
            })),
        };
        self.send_body(Method::PUT, "/auth/profile", body).await
    }

    pub async fn change_password(&self, request: &ChangePasswordRequest) -> Result<String> {
        request.validate()?;
        let body: MessageBody = self.send_json(Method::PUT, "/auth/change-password", request).await?;
        Ok(body.message)
    }

    pub async fn logout(&self) { self.set_token(None).await; }

    async fn start_session(&self, body: SessionBody) -> Result<User> {
        match (body.token, body.user) {
            (Some(token), Some(user)) => {
                self.set_token(Some(token)).await;
                tracing::info!(user = %user.username, "signed in");
                Ok(user)
            }
            _ => Err(StorefrontError::Api { status: 200, message: "session response without token".into() }),
        }
    }
}
