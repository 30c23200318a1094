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

//! User management, import review and dashboards

use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::{start_of_local_day, ActiveSession, MessageHandler};
use crate::error::{UnityError, UnityResult};
use crate::models::{
    filter_imported_accounts, filter_profiles, ClaimFilter, DashboardStats, ImportStatus,
    ImportedAccount, ManagedUser, PendingPost, PlatformStats, PostTypeCounts, Profile,
};

/// Window within which a user counts as live
const LIVE_WINDOW_MINUTES: i64 = 5;

#[derive(Deserialize)]
pub(super) struct DirectoryParams {
    #[serde(default)]
    search: String,
}

#[derive(Deserialize)]
pub(super) struct TargetParams {
    user_id: String,
}

#[derive(Deserialize)]
pub(super) struct SuspendParams {
    user_id: String,
    suspended: bool,
}

#[derive(Deserialize)]
pub(super) struct ImportParams {
    twitter_unique_id: String,
}

#[derive(Deserialize)]
pub(super) struct ImportedAccountParams {
    #[serde(default)]
    search: String,
    #[serde(default)]
    filter: ClaimFilter,
}

#[derive(Deserialize)]
pub(super) struct ClaimParams {
    user_id: String,
    claimed: bool,
}

impl MessageHandler {
    async fn staff_session(&self, action: &str) -> UnityResult<ActiveSession> {
        let session = self.current().await?;
        session.viewer.require(session.viewer.is_staff(), action)?;
        Ok(session)
    }

    async fn super_admin_session(&self, action: &str) -> UnityResult<ActiveSession> {
        let session = self.current().await?;
        session.viewer.require(session.viewer.is_super_admin(), action)?;
        Ok(session)
    }

    /// Profile of a user the viewer is allowed to manage
    async fn managed_target(&self, session: &ActiveSession, user_id: &str) -> UnityResult<Profile> {
        let target = session
            .client
            .get_profile(user_id)
            .await?
            .ok_or_else(|| UnityError::NotFound(format!("user {}", user_id)))?;

        session
            .viewer
            .require(session.viewer.can_manage(&target.id, target.role), "manage this user")?;
        Ok(target)
    }

    async fn pending_executive(&self, session: &ActiveSession, user_id: &str) -> UnityResult<Profile> {
        let target = session
            .client
            .get_profile(user_id)
            .await?
            .ok_or_else(|| UnityError::NotFound(format!("user {}", user_id)))?;

        if !target.is_pending_executive() {
            return Err(UnityError::validation("This user is not awaiting approval"));
        }
        Ok(target)
    }

    // ===== USERS =====

    pub(super) async fn user_directory(&self, params: DirectoryParams) -> UnityResult<Vec<ManagedUser>> {
        let session = self.staff_session("manage users").await?;
        let profiles = session.client.list_profiles().await?;

        Ok(filter_profiles(&profiles, &params.search)
            .into_iter()
            .map(|p| ManagedUser {
                role_label: p.role.label(),
                can_manage: session.viewer.can_manage(&p.id, p.role),
                profile: p.clone(),
            })
            .collect())
    }

    pub(super) async fn set_suspended(&self, params: SuspendParams) -> UnityResult<Value> {
        let session = self.staff_session("manage users").await?;
        let target = self.managed_target(&session, &params.user_id).await?;

        session.client.set_suspended(&target.id, params.suspended).await?;
        info!(
            "{} {} by {}",
            if params.suspended { "Suspended" } else { "Unsuspended" },
            target.id,
            session.user_id()
        );

        Ok(json!({ "user_id": target.id, "is_suspended": params.suspended }))
    }

    pub(super) async fn delete_user(&self, params: TargetParams) -> UnityResult<Value> {
        let session = self.staff_session("manage users").await?;
        let target = self.managed_target(&session, &params.user_id).await?;

        session.client.delete_auth_user(&target.id).await?;
        info!("Deleted user {} by {}", target.id, session.user_id());

        Ok(json!({ "deleted": true, "user_id": target.id }))
    }

    // ===== EXECUTIVE APPROVAL =====

    pub(super) async fn pending_executives(&self) -> UnityResult<Vec<Profile>> {
        let session = self.super_admin_session("review executives").await?;
        session.client.pending_executives().await
    }

    pub(super) async fn approve_executive(&self, params: TargetParams) -> UnityResult<Value> {
        let session = self.super_admin_session("approve executives").await?;
        let target = self.pending_executive(&session, &params.user_id).await?;

        session.client.approve_executive(&target.id).await?;
        info!("Approved executive {}", target.id);

        Ok(json!({ "user_id": target.id, "is_approved": true }))
    }

    /// Rejecting an executive removes the account
    pub(super) async fn reject_executive(&self, params: TargetParams) -> UnityResult<Value> {
        let session = self.super_admin_session("reject executives").await?;
        let target = self.pending_executive(&session, &params.user_id).await?;

        session.client.delete_auth_user(&target.id).await?;
        info!("Rejected executive {}", target.id);

        Ok(json!({ "deleted": true, "user_id": target.id }))
    }

    // ===== IMPORTED CONTENT =====

    pub(super) async fn pending_posts(&self) -> UnityResult<Vec<PendingPost>> {
        let session = self.super_admin_session("review imported posts").await?;
        session.client.pending_posts().await
    }

    /// Mark the import accepted, then publish it
    pub(super) async fn accept_pending_post(&self, params: ImportParams) -> UnityResult<Value> {
        let session = self.super_admin_session("review imported posts").await?;
        let pending = session
            .client
            .get_pending_post(&params.twitter_unique_id)
            .await?
            .ok_or_else(|| UnityError::NotFound(format!("pending post {}", params.twitter_unique_id)))?;

        if pending.status != ImportStatus::Pending {
            return Err(UnityError::validation("This post has already been reviewed"));
        }

        session
            .client
            .set_import_status(&pending.twitter_unique_id, ImportStatus::Accepted)
            .await?;
        session.client.insert_post_row(&pending.to_post_row()).await?;
        info!("Published imported post {}", pending.twitter_unique_id);

        Ok(json!({ "twitter_unique_id": pending.twitter_unique_id, "status": ImportStatus::Accepted }))
    }

    pub(super) async fn reject_pending_post(&self, params: ImportParams) -> UnityResult<Value> {
        let session = self.super_admin_session("review imported posts").await?;
        session
            .client
            .set_import_status(&params.twitter_unique_id, ImportStatus::Rejected)
            .await?;

        Ok(json!({ "twitter_unique_id": params.twitter_unique_id, "status": ImportStatus::Rejected }))
    }

    pub(super) async fn imported_accounts(
        &self,
        params: ImportedAccountParams,
    ) -> UnityResult<Vec<ImportedAccount>> {
        let session = self.super_admin_session("manage imported accounts").await?;
        let accounts = session.client.imported_accounts().await?;

        Ok(filter_imported_accounts(&accounts, &params.search, params.filter)
            .into_iter()
            .cloned()
            .collect())
    }

    pub(super) async fn toggle_claim(&self, params: ClaimParams) -> UnityResult<Value> {
        let session = self.super_admin_session("manage imported accounts").await?;
        session.client.set_claimed(&params.user_id, params.claimed).await?;
        Ok(json!({ "user_id": params.user_id, "claimed": params.claimed }))
    }

    // ===== DASHBOARDS =====

    pub(super) async fn platform_stats(&self) -> UnityResult<PlatformStats> {
        let session = self.super_admin_session("view platform stats").await?;
        let today = start_of_local_day();

        let (total_users, total_posts, posts_today) = tokio::try_join!(
            session.client.count_profiles(),
            session.client.count_posts(),
            session.client.count_posts_since(today),
        )?;

        Ok(PlatformStats {
            total_users,
            total_posts,
            posts_today,
        })
    }

    pub(super) async fn executive_dashboard(&self) -> UnityResult<DashboardStats> {
        let session = self.staff_session("view the dashboard").await?;
        let live_since = Utc::now() - chrono::Duration::minutes(LIVE_WINDOW_MINUTES);

        let (total_users, live_users, types) = tokio::try_join!(
            session.client.count_profiles(),
            session.client.count_active_profiles(live_since),
            session.client.post_types_since(start_of_local_day()),
        )?;

        Ok(DashboardStats {
            total_users,
            live_users,
            today_posts: PostTypeCounts::tally(types),
        })
    }
}
