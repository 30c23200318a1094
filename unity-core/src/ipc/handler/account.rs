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

//! Sign-in, password and profile operations

use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{required, validate_new_password, ActiveSession, MessageHandler};
use crate::access::Viewer;
use crate::api::auth::SignUpOutcome;
use crate::error::{UnityError, UnityResult};
use crate::models::{
    ChangePasswordRequest, ClaimStatus, FollowCounts, FollowUser, Post, Profile, RecoveryLink,
    ResetPasswordRequest, SessionInfo, SignInRequest, SignUpRequest, StoredSession,
    TokenClaims, UploadTarget,
};

/// Minimum time between two recovery emails
pub(super) const RESET_COOLDOWN: Duration = Duration::from_secs(120);

const MAX_BIO_CHARS: usize = 500;
const MIN_NAME_CHARS: usize = 2;

#[derive(Deserialize)]
pub(super) struct UserParams {
    user_id: String,
}

#[derive(Deserialize)]
pub(super) struct ForgotPasswordParams {
    email: String,
    #[serde(default)]
    redirect_to: Option<String>,
}

#[derive(Deserialize)]
pub(super) struct NameParams {
    full_name: String,
}

#[derive(Deserialize)]
pub(super) struct BioParams {
    #[serde(default)]
    bio: Option<String>,
}

#[derive(Deserialize)]
pub(super) struct AvatarParams {
    file_path: String,
}

/// Trimmed display name of at least two characters
fn validate_name(name: &str) -> UnityResult<String> {
    let name = name.trim();
    if name.chars().count() < MIN_NAME_CHARS {
        return Err(UnityError::validation("Name must be at least 2 characters"));
    }
    Ok(name.to_string())
}

/// Trimmed bio; blank clears it
fn normalize_bio(bio: Option<&str>) -> UnityResult<Option<String>> {
    let bio = bio.map(str::trim).unwrap_or_default();
    if bio.chars().count() > MAX_BIO_CHARS {
        return Err(UnityError::validation("Bio must be 500 characters or less"));
    }
    Ok((!bio.is_empty()).then(|| bio.to_string()))
}

impl MessageHandler {
    pub(super) async fn sign_up(&self, request: SignUpRequest) -> UnityResult<Value> {
        let email = required(&request.email, "Email")?;
        let full_name = validate_name(&request.full_name)?;
        validate_new_password(&request.password, &request.confirm_password)?;
        if !request.role.is_self_selectable() {
            return Err(UnityError::validation("That role cannot be chosen at sign up"));
        }

        let outcome = self
            .anon
            .sign_up(&email, &request.password, &full_name, request.role)
            .await?;

        match outcome {
            SignUpOutcome::ConfirmationRequired { user_id } => Ok(json!({
                "status": "confirmation_required",
                "user_id": user_id,
            })),
            SignUpOutcome::SignedIn(grant) => {
                match self.establish(StoredSession::from_grant(&grant)).await {
                    Ok(info) => Ok(json!({ "status": "signed_in", "session": info })),
                    Err(UnityError::PendingApproval) => Ok(json!({ "status": "pending_approval" })),
                    Err(e) => Err(e),
                }
            }
        }
    }

    pub(super) async fn sign_in(&self, request: SignInRequest) -> UnityResult<SessionInfo> {
        let email = required(&request.email, "Email")?;
        let grant = self
            .anon
            .sign_in_with_password(&email, &request.password)
            .await?;
        self.establish(StoredSession::from_grant(&grant)).await
    }

    /// Load the profile behind a token and make it the active session
    ///
    /// Suspended accounts and executives awaiting approval are signed out
    /// again and rejected.
    async fn establish(&self, stored: StoredSession) -> UnityResult<SessionInfo> {
        let client = self.anon.with_token(&stored.access_token);

        let (profile, roles) = tokio::try_join!(
            client.get_profile(&stored.user_id),
            client.get_user_roles(&stored.user_id),
        )?;
        let profile = profile.ok_or_else(|| UnityError::NotFound("profile".to_string()))?;
        let viewer = Viewer::from_profile(&profile, roles);

        let rejection = if profile.is_suspended {
            Some(UnityError::AccountSuspended)
        } else if profile.is_pending_executive() && !viewer.is_super_admin() {
            Some(UnityError::PendingApproval)
        } else {
            None
        };
        if let Some(error) = rejection {
            if let Err(e) = client.sign_out().await {
                warn!("Sign out after rejected sign in failed: {}", e);
            }
            return Err(error);
        }

        self.cache.save_session(&stored).await?;
        if let Err(e) = client.touch_activity(&stored.user_id).await {
            warn!("Failed to record activity: {}", e);
        }

        let session = ActiveSession {
            client,
            stored,
            profile,
            viewer,
        };
        let info = session.info();
        let token = session.stored.access_token.clone();
        info!("Signed in as {} ({})", session.user_id(), session.viewer.roles.highest().as_str());

        *self.session.write().await = Some(session);
        self.restart_realtime(&token).await;

        Ok(info)
    }

    /// Exchange the refresh token of an expiring session
    pub(super) async fn refresh_active(&self, session: ActiveSession) -> UnityResult<ActiveSession> {
        let grant = match self.anon.refresh_session(&session.stored.refresh_token).await {
            Ok(grant) => grant,
            Err(e) => {
                warn!("Token refresh failed: {}", e);
                self.end_session("session expired").await;
                return Err(UnityError::NotAuthenticated);
            }
        };

        let stored = StoredSession {
            created_at: session.stored.created_at,
            ..StoredSession::from_grant(&grant)
        };
        self.cache.save_session(&stored).await?;

        let refreshed = ActiveSession {
            client: self.anon.with_token(&stored.access_token),
            stored,
            ..session
        };
        *self.session.write().await = Some(refreshed.clone());
        // channel joins carry the token
        self.restart_realtime(&refreshed.stored.access_token).await;
        Ok(refreshed)
    }

    pub(super) async fn sign_out(&self) -> UnityResult<Value> {
        self.end_session("signed out").await;
        Ok(json!({ "success": true }))
    }

    pub(super) async fn session_info(&self) -> Option<SessionInfo> {
        self.session.read().await.as_ref().map(ActiveSession::info)
    }

    /// Resume the session kept in the cache
    pub(super) async fn restore_session(&self) -> UnityResult<Option<SessionInfo>> {
        let Some(stored) = self.cache.load_session().await? else {
            return Ok(None);
        };

        let stored = if stored.is_expired() {
            match self.anon.refresh_session(&stored.refresh_token).await {
                Ok(grant) => StoredSession::from_grant(&grant),
                Err(e) => {
                    info!("Stored session could not be refreshed: {}", e);
                    self.cache.clear_session().await?;
                    return Ok(None);
                }
            }
        } else {
            stored
        };

        match self.establish(stored).await {
            Ok(info) => Ok(Some(info)),
            Err(e) if e.is_unauthorized() => {
                self.cache.clear_session().await?;
                Ok(None)
            }
            Err(e) => {
                self.cache.clear_session().await?;
                Err(e)
            }
        }
    }

    pub(super) async fn forgot_password(&self, params: ForgotPasswordParams) -> UnityResult<Value> {
        let email = required(&params.email, "Email")?;

        let mut last = self.last_reset_request.lock().await;
        if let Some(sent_at) = *last {
            let elapsed = sent_at.elapsed();
            if elapsed < RESET_COOLDOWN {
                let remaining = RESET_COOLDOWN - elapsed;
                return Err(UnityError::Cooldown {
                    remaining_secs: remaining.as_secs().max(1),
                });
            }
        }

        self.anon
            .send_recovery_email(&email, params.redirect_to.as_deref())
            .await?;
        *last = Some(Instant::now());

        Ok(json!({ "sent": true, "cooldown_secs": RESET_COOLDOWN.as_secs() }))
    }

    pub(super) async fn reset_password(&self, request: ResetPasswordRequest) -> UnityResult<Value> {
        let link = RecoveryLink::parse(&request.recovery_link)?;
        let claims = TokenClaims::decode(&link.access_token)?;
        if claims.is_expired_at(chrono::Utc::now()) {
            return Err(UnityError::validation("invalid or expired reset link"));
        }
        validate_new_password(&request.new_password, &request.confirm_password)?;

        let client = self.anon.with_token(&link.access_token);
        client.update_password(&request.new_password).await?;
        if let Err(e) = client.sign_out().await {
            warn!("Sign out after password reset failed: {}", e);
        }

        info!("Password reset for {}", claims.sub);
        Ok(json!({ "success": true }))
    }

    pub(super) async fn change_password(&self, request: ChangePasswordRequest) -> UnityResult<Value> {
        let session = self.current().await?;
        validate_new_password(&request.new_password, &request.confirm_password)?;

        let email = session
            .stored
            .email
            .clone()
            .or_else(|| session.profile.email.clone())
            .ok_or_else(|| UnityError::validation("no email on this account"))?;

        // re-verify with the current password before changing it
        self.anon
            .sign_in_with_password(&email, &request.current_password)
            .await
            .map_err(|e| match e {
                UnityError::Api { status: 400, .. } => {
                    UnityError::validation("Current password is incorrect")
                }
                other => other,
            })?;

        session.client.update_password(&request.new_password).await?;
        Ok(json!({ "success": true }))
    }

    // ===== PROFILE =====

    /// Fetch the signed-in user's profile, ending the session if suspended
    pub(super) async fn own_profile(&self) -> UnityResult<Profile> {
        let session = self.current().await?;
        let profile = session
            .client
            .get_profile(session.user_id())
            .await?
            .ok_or_else(|| UnityError::NotFound("profile".to_string()))?;

        if profile.is_suspended {
            self.end_session("account suspended").await;
            return Err(UnityError::AccountSuspended);
        }

        self.store_profile(profile.clone()).await;
        Ok(profile)
    }

    pub(super) async fn public_profile(&self, params: UserParams) -> UnityResult<Value> {
        let client = self.client_or_anon().await;
        let profile = client
            .get_public_profile(&params.user_id)
            .await?
            .ok_or_else(|| UnityError::NotFound(format!("user {}", params.user_id)))?;

        Ok(json!({
            "role_label": profile.role.label(),
            "profile": profile,
        }))
    }

    pub(super) async fn profile_posts(&self, params: UserParams) -> UnityResult<Vec<Post>> {
        self.client_or_anon().await.user_posts(&params.user_id).await
    }

    pub(super) async fn update_name(&self, params: NameParams) -> UnityResult<Profile> {
        let full_name = validate_name(&params.full_name)?;
        let session = self.current().await?;
        let profile = session
            .client
            .update_profile(session.user_id(), &json!({ "full_name": full_name }))
            .await?;
        self.store_profile(profile.clone()).await;
        Ok(profile)
    }

    pub(super) async fn update_bio(&self, params: BioParams) -> UnityResult<Profile> {
        let bio = normalize_bio(params.bio.as_deref())?;
        let session = self.current().await?;
        let profile = session
            .client
            .update_profile(session.user_id(), &json!({ "bio": bio }))
            .await?;
        self.store_profile(profile.clone()).await;
        Ok(profile)
    }

    pub(super) async fn upload_avatar(&self, params: AvatarParams) -> UnityResult<Profile> {
        let session = self.current().await?;
        let uploaded = session
            .client
            .upload_file(
                session.user_id(),
                &PathBuf::from(&params.file_path),
                UploadTarget::Avatar,
            )
            .await?;

        let profile = session
            .client
            .update_profile(session.user_id(), &json!({ "avatar_url": uploaded.public_url }))
            .await?;
        self.store_profile(profile.clone()).await;
        Ok(profile)
    }

    pub(super) async fn follow_counts(&self, params: UserParams) -> UnityResult<FollowCounts> {
        self.client_or_anon().await.follow_counts(&params.user_id).await
    }

    pub(super) async fn followers(&self, params: UserParams) -> UnityResult<Vec<FollowUser>> {
        self.client_or_anon().await.followers(&params.user_id).await
    }

    pub(super) async fn following(&self, params: UserParams) -> UnityResult<Vec<FollowUser>> {
        self.client_or_anon().await.following(&params.user_id).await
    }

    pub(super) async fn claim_status(&self, params: UserParams) -> UnityResult<ClaimStatus> {
        self.client_or_anon().await.claim_status(&params.user_id).await
    }

    pub(super) async fn follow(&self, params: UserParams) -> UnityResult<Value> {
        let session = self.current().await?;
        if params.user_id == session.user_id() {
            return Err(UnityError::validation("You cannot follow yourself"));
        }

        let (counts, already) = futures::try_join!(
            session.client.follow_counts(&params.user_id),
            session.client.is_following(session.user_id(), &params.user_id),
        )?;
        if already {
            return Ok(json!({ "following": true, "counts": counts }));
        }

        session.client.follow(session.user_id(), &params.user_id).await?;
        Ok(json!({ "following": true, "counts": counts.followed() }))
    }

    pub(super) async fn unfollow(&self, params: UserParams) -> UnityResult<Value> {
        let session = self.current().await?;
        let (counts, following) = futures::try_join!(
            session.client.follow_counts(&params.user_id),
            session.client.is_following(session.user_id(), &params.user_id),
        )?;
        if !following {
            return Ok(json!({ "following": false, "counts": counts }));
        }

        session.client.unfollow(session.user_id(), &params.user_id).await?;
        Ok(json!({ "following": false, "counts": counts.unfollowed() }))
    }

    pub(super) async fn is_following(&self, params: UserParams) -> UnityResult<bool> {
        match self.current().await {
            Ok(session) => {
                session
                    .client
                    .is_following(session.user_id(), &params.user_id)
                    .await
            }
            Err(UnityError::NotAuthenticated) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    #[test]
    fn names_are_trimmed_and_checked() {
        assert_eq!(validate_name("  Asha ").unwrap(), "Asha");
        assert!(validate_name(" A ").is_err());
    }

    #[test]
    fn blank_bio_clears() {
        assert_eq!(normalize_bio(Some("   ")).unwrap(), None);
        assert_eq!(normalize_bio(None).unwrap(), None);
        assert_eq!(normalize_bio(Some(" hi ")).unwrap().as_deref(), Some("hi"));
        assert!(normalize_bio(Some(&"x".repeat(501))).is_err());
        assert!(normalize_bio(Some(&"x".repeat(500))).is_ok());
    }

    #[test]
    fn executives_are_self_selectable_but_admins_are_not() {
        assert!(Role::Executive.is_self_selectable());
        assert!(!Role::SuperAdmin.is_self_selectable());
    }
}
