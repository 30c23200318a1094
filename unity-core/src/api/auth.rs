// Hindu Unity - A community platform for members, volunteers and leaders
// Copyright (C) 2025 Hindu Unity Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Auth service calls

use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::error::UnityResult;
use crate::models::{AuthUser, Role, TokenResponse};

use super::client::BackendClient;

/// Result of a sign-up request
#[derive(Debug, Clone)]
pub enum SignUpOutcome {
    /// The account is usable right away
    SignedIn(TokenResponse),
    /// A confirmation email was sent
    ConfirmationRequired { user_id: Option<String> },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SignUpBody {
    Session(TokenResponse),
    User(AuthUser),
    Other(serde_json::Value),
}

impl BackendClient {
    /// Register a new account; the profile row is created by the backend
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
        role: Role,
    ) -> UnityResult<SignUpOutcome> {
        info!("Signing up {}", email);

        let body = json!({
            "email": email,
            "password": password,
            "data": {
                "full_name": full_name,
                "role": role.as_str(),
            },
        });

        let response: SignUpBody = self.auth_json(Method::POST, "signup", Some(&body)).await?;
        Ok(match response {
            SignUpBody::Session(grant) => SignUpOutcome::SignedIn(grant),
            SignUpBody::User(user) => SignUpOutcome::ConfirmationRequired {
                user_id: Some(user.id),
            },
            SignUpBody::Other(_) => SignUpOutcome::ConfirmationRequired { user_id: None },
        })
    }

    /// Password grant
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> UnityResult<TokenResponse> {
        let body = json!({ "email": email, "password": password });
        self.auth_json(Method::POST, "token?grant_type=password", Some(&body))
            .await
    }

    /// Refresh-token grant
    pub async fn refresh_session(&self, refresh_token: &str) -> UnityResult<TokenResponse> {
        let body = json!({ "refresh_token": refresh_token });
        self.auth_json(Method::POST, "token?grant_type=refresh_token", Some(&body))
            .await
    }

    /// Revoke the current session
    pub async fn sign_out(&self) -> UnityResult<()> {
        let url = self.auth_url("logout")?;
        self.send("POST auth/logout", self.request(Method::POST, url))
            .await?;
        Ok(())
    }

    /// User behind the current token
    pub async fn current_user(&self) -> UnityResult<AuthUser> {
        self.auth_json::<(), _>(Method::GET, "user", None).await
    }

    /// Set a new password for the user behind the current token
    pub async fn update_password(&self, new_password: &str) -> UnityResult<AuthUser> {
        let body = json!({ "password": new_password });
        self.auth_json(Method::PUT, "user", Some(&body)).await
    }

    /// Send a password recovery email
    pub async fn send_recovery_email(&self, email: &str, redirect_to: Option<&str>) -> UnityResult<()> {
        let path = match redirect_to {
            Some(to) => format!("recover?redirect_to={}", urlencoding::encode(to)),
            None => "recover".to_string(),
        };
        let body = json!({ "email": email });
        let _: serde_json::Value = self.auth_json(Method::POST, &path, Some(&body)).await?;
        Ok(())
    }

    /// Permanently delete an account (requires an administrative token)
    pub async fn delete_auth_user(&self, user_id: &str) -> UnityResult<()> {
        let url = self.auth_url(&format!("admin/users/{}", user_id))?;
        self.send("DELETE auth/admin/users", self.request(Method::DELETE, url))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::tests::client;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn password_grant_returns_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .and(body_partial_json(serde_json::json!({"email": "a@b.in"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at",
                "token_type": "bearer",
                "expires_in": 3600,
                "refresh_token": "rt",
                "user": {"id": "u1", "email": "a@b.in"}
            })))
            .mount(&server)
            .await;

        let grant = client(&server).sign_in_with_password("a@b.in", "secret").await.unwrap();
        assert_eq!(grant.user.id, "u1");
        assert_eq!(grant.refresh_token, "rt");
    }

    #[tokio::test]
    async fn invalid_credentials_surface_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Invalid login credentials"
            })))
            .mount(&server)
            .await;

        let err = client(&server).sign_in_with_password("a@b.in", "bad").await.unwrap_err();
        assert!(err.to_string().contains("Invalid login credentials"));
    }

    #[tokio::test]
    async fn sign_up_without_session_needs_confirmation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/signup"))
            .and(body_partial_json(serde_json::json!({"data": {"role": "volunteer"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "u9",
                "email": "v@b.in"
            })))
            .mount(&server)
            .await;

        let outcome = client(&server)
            .sign_up("v@b.in", "secret1", "Vikram", Role::Volunteer)
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            SignUpOutcome::ConfirmationRequired { user_id: Some(ref id) } if id == "u9"
        ));
    }
}
