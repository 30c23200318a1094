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

//! Role gating: role sets, the route table, route guards, navigation and
//! management rights
//!
//! These checks give the UI fast feedback. The backend enforces the same
//! rules with row-level security.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{UnityError, UnityResult};
use crate::models::{Profile, Role};

/// Every role a user holds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSet(BTreeSet<Role>);

impl RoleSet {
    /// Union of the profile role and the `user_roles` rows
    pub fn new(primary: Role, extra: impl IntoIterator<Item = Role>) -> Self {
        let mut roles: BTreeSet<Role> = extra.into_iter().collect();
        roles.insert(primary);
        Self(roles)
    }

    pub fn has(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    pub fn highest(&self) -> Role {
        self.0.iter().next_back().copied().unwrap_or_default()
    }

    pub fn to_vec(&self) -> Vec<Role> {
        self.0.iter().copied().collect()
    }
}

/// The signed-in user as seen by the gates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewer {
    pub user_id: String,
    pub roles: RoleSet,
    pub is_approved: bool,
    pub is_suspended: bool,
}

impl Viewer {
    pub fn from_profile(profile: &Profile, extra_roles: Vec<Role>) -> Self {
        Self {
            user_id: profile.id.clone(),
            roles: RoleSet::new(profile.role, extra_roles),
            is_approved: profile.is_approved,
            is_suspended: profile.is_suspended,
        }
    }

    pub fn is_super_admin(&self) -> bool {
        self.roles.has(Role::SuperAdmin)
    }

    /// Executive whose account has been approved
    pub fn is_approved_executive(&self) -> bool {
        self.roles.has(Role::Executive) && self.is_approved
    }

    /// Executive or super admin
    pub fn is_staff(&self) -> bool {
        self.is_super_admin() || self.is_approved_executive()
    }

    /// Volunteer, executive or super admin
    pub fn is_volunteer_or_above(&self) -> bool {
        self.roles.has(Role::Volunteer) || self.is_staff()
    }

    /// Role whose rules apply when managing other users
    pub fn acting_role(&self) -> Role {
        if self.is_super_admin() {
            Role::SuperAdmin
        } else if self.is_approved_executive() {
            Role::Executive
        } else if self.roles.has(Role::Volunteer) {
            Role::Volunteer
        } else {
            Role::Member
        }
    }

    /// Whether this viewer may suspend, approve or delete the target
    pub fn can_manage(&self, target_id: &str, target_role: Role) -> bool {
        if target_id == self.user_id {
            return false;
        }
        match self.acting_role() {
            Role::SuperAdmin => true,
            Role::Executive => matches!(target_role, Role::Member | Role::Volunteer),
            _ => false,
        }
    }

    pub fn can_delete_post(&self, author_id: &str) -> bool {
        author_id == self.user_id || self.is_staff()
    }

    pub fn can_delete_event(&self, creator_id: &str) -> bool {
        creator_id == self.user_id || self.is_super_admin()
    }

    /// Members only see their own response, not the totals
    pub fn can_see_response_counts(&self) -> bool {
        self.is_volunteer_or_above()
    }

    /// Fail with [`UnityError::PermissionDenied`] unless `allowed`
    pub fn require(&self, allowed: bool, action: &str) -> UnityResult<()> {
        if allowed {
            Ok(())
        } else {
            Err(UnityError::denied(format!("you don't have permission to {}", action)))
        }
    }
}

/// Who may open a route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    Public,
    /// Only when signed out
    GuestOnly,
    Authenticated,
    Volunteer,
    Staff,
    SuperAdmin,
}

/// Client-facing routes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "name", content = "id", rename_all = "snake_case")]
pub enum Route {
    Feed,
    Home,
    Auth,
    Events,
    ManageUsers,
    Admin,
    LiveStream,
    Profile,
    User(String),
    Post(String),
    ApproveExecutive,
    PendingPosts,
    ImportedAccounts,
    ExecutiveDashboard,
    OrganiseProtest,
    ForgotPassword,
    ResetPassword,
    NotFound,
}

impl Route {
    /// Match a path, ignoring query, fragment and trailing slash
    pub fn parse(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or("");
        let trimmed = path.trim_end_matches('/');
        let segments: Vec<&str> = trimmed.split('/').skip(1).collect();

        match segments.as_slice() {
            [] => Route::Feed,
            ["home"] => Route::Home,
            ["auth"] => Route::Auth,
            ["events"] => Route::Events,
            ["manage-users"] => Route::ManageUsers,
            ["admin"] => Route::Admin,
            ["live-stream"] => Route::LiveStream,
            ["profile"] => Route::Profile,
            ["user", id] if !id.is_empty() => Route::User(id.to_string()),
            ["post", id] if !id.is_empty() => Route::Post(id.to_string()),
            ["approve-executive"] => Route::ApproveExecutive,
            ["pending-posts"] => Route::PendingPosts,
            ["imported-accounts"] => Route::ImportedAccounts,
            ["executive-dashboard"] => Route::ExecutiveDashboard,
            ["organise-protest"] => Route::OrganiseProtest,
            ["forgot-password"] => Route::ForgotPassword,
            ["reset-password"] => Route::ResetPassword,
            _ => Route::NotFound,
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Feed => "/".to_string(),
            Route::Home => "/home".to_string(),
            Route::Auth => "/auth".to_string(),
            Route::Events => "/events".to_string(),
            Route::ManageUsers => "/manage-users".to_string(),
            Route::Admin => "/admin".to_string(),
            Route::LiveStream => "/live-stream".to_string(),
            Route::Profile => "/profile".to_string(),
            Route::User(id) => format!("/user/{}", id),
            Route::Post(id) => format!("/post/{}", id),
            Route::ApproveExecutive => "/approve-executive".to_string(),
            Route::PendingPosts => "/pending-posts".to_string(),
            Route::ImportedAccounts => "/imported-accounts".to_string(),
            Route::ExecutiveDashboard => "/executive-dashboard".to_string(),
            Route::OrganiseProtest => "/organise-protest".to_string(),
            Route::ForgotPassword => "/forgot-password".to_string(),
            Route::ResetPassword => "/reset-password".to_string(),
            Route::NotFound => "/404".to_string(),
        }
    }

    pub fn access(&self) -> Access {
        match self {
            Route::Home | Route::Post(_) | Route::ResetPassword | Route::NotFound => Access::Public,
            Route::Auth | Route::ForgotPassword => Access::GuestOnly,
            Route::Feed
            | Route::Events
            | Route::LiveStream
            | Route::Profile
            | Route::User(_) => Access::Authenticated,
            Route::OrganiseProtest => Access::Volunteer,
            Route::ManageUsers | Route::ExecutiveDashboard => Access::Staff,
            Route::Admin
            | Route::ApproveExecutive
            | Route::PendingPosts
            | Route::ImportedAccounts => Access::SuperAdmin,
        }
    }
}

/// Outcome of a route guard
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "to", rename_all = "snake_case")]
pub enum GuardDecision {
    Allow,
    RedirectToAuth,
    RedirectHome,
    Redirect(String),
}

/// Decide whether `viewer` may open `route`
///
/// A suspended viewer is treated as signed out.
pub fn guard(route: &Route, viewer: Option<&Viewer>) -> GuardDecision {
    let viewer = viewer.filter(|v| !v.is_suspended);

    if let (Route::User(id), Some(v)) = (route, viewer) {
        if *id == v.user_id {
            return GuardDecision::Redirect(Route::Profile.path());
        }
    }

    let allowed = match (route.access(), viewer) {
        (Access::Public, _) => true,
        (Access::GuestOnly, None) => true,
        (Access::GuestOnly, Some(_)) => return GuardDecision::RedirectHome,
        (_, None) => return GuardDecision::RedirectToAuth,
        (Access::Authenticated, Some(_)) => true,
        (Access::Volunteer, Some(v)) => v.is_volunteer_or_above(),
        (Access::Staff, Some(v)) => v.is_staff(),
        (Access::SuperAdmin, Some(v)) => v.is_super_admin(),
    };

    if allowed {
        GuardDecision::Allow
    } else {
        GuardDecision::RedirectHome
    }
}

/// A navigation entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavItem {
    pub label: &'static str,
    pub path: String,
}

/// Navigation entries visible to the viewer
pub fn nav_items(viewer: Option<&Viewer>) -> Vec<NavItem> {
    let Some(viewer) = viewer.filter(|v| !v.is_suspended) else {
        return Vec::new();
    };

    let mut items = Vec::new();
    if viewer.is_volunteer_or_above() {
        items.push(NavItem { label: "Events", path: Route::Events.path() });
    }
    if viewer.is_staff() {
        items.push(NavItem { label: "Manage Users", path: Route::ManageUsers.path() });
    }
    if viewer.is_super_admin() {
        items.push(NavItem { label: "Dashboard", path: Route::Admin.path() });
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewer(id: &str, roles: &[Role], approved: bool) -> Viewer {
        let (primary, extra) = roles.split_first().expect("at least one role");
        Viewer {
            user_id: id.to_string(),
            roles: RoleSet::new(*primary, extra.to_vec()),
            is_approved: approved,
            is_suspended: false,
        }
    }

    #[test]
    fn role_set_is_union() {
        let roles = RoleSet::new(Role::Member, vec![Role::SuperAdmin, Role::Member]);
        assert_eq!(roles.to_vec(), vec![Role::Member, Role::SuperAdmin]);
        assert_eq!(roles.highest(), Role::SuperAdmin);
    }

    #[test]
    fn routes_parse() {
        assert_eq!(Route::parse("/"), Route::Feed);
        assert_eq!(Route::parse(""), Route::Feed);
        assert_eq!(Route::parse("/events/"), Route::Events);
        assert_eq!(Route::parse("/user/abc?tab=posts"), Route::User("abc".into()));
        assert_eq!(Route::parse("/post/p1#comments"), Route::Post("p1".into()));
        assert_eq!(Route::parse("/user/"), Route::NotFound);
        assert_eq!(Route::parse("/nowhere"), Route::NotFound);
    }

    #[test]
    fn signed_out_visitors_go_to_auth() {
        assert_eq!(guard(&Route::Feed, None), GuardDecision::RedirectToAuth);
        assert_eq!(guard(&Route::Post("p".into()), None), GuardDecision::Allow);
        assert_eq!(guard(&Route::Auth, None), GuardDecision::Allow);
    }

    #[test]
    fn own_user_page_redirects_to_profile() {
        let me = viewer("me", &[Role::Member], false);
        assert_eq!(
            guard(&Route::User("me".into()), Some(&me)),
            GuardDecision::Redirect("/profile".into())
        );
        assert_eq!(guard(&Route::User("you".into()), Some(&me)), GuardDecision::Allow);
        assert_eq!(guard(&Route::Auth, Some(&me)), GuardDecision::RedirectHome);
    }

    #[test]
    fn executive_routes_need_approval() {
        let pending = viewer("e", &[Role::Executive], false);
        let approved = viewer("e", &[Role::Executive], true);
        assert_eq!(guard(&Route::ManageUsers, Some(&pending)), GuardDecision::RedirectHome);
        assert_eq!(guard(&Route::ManageUsers, Some(&approved)), GuardDecision::Allow);
        assert_eq!(guard(&Route::Admin, Some(&approved)), GuardDecision::RedirectHome);
    }

    #[test]
    fn suspended_viewer_is_signed_out() {
        let mut admin = viewer("a", &[Role::SuperAdmin], true);
        admin.is_suspended = true;
        assert_eq!(guard(&Route::Admin, Some(&admin)), GuardDecision::RedirectToAuth);
        assert!(nav_items(Some(&admin)).is_empty());
    }

    #[test]
    fn navigation_by_role() {
        let labels = |v: &Viewer| nav_items(Some(v)).into_iter().map(|i| i.label).collect::<Vec<_>>();
        assert!(labels(&viewer("m", &[Role::Member], false)).is_empty());
        assert_eq!(labels(&viewer("v", &[Role::Volunteer], false)), vec!["Events"]);
        assert_eq!(
            labels(&viewer("e", &[Role::Executive], true)),
            vec!["Events", "Manage Users"]
        );
        assert_eq!(
            labels(&viewer("s", &[Role::Member, Role::SuperAdmin], false)),
            vec!["Events", "Manage Users", "Dashboard"]
        );
    }

    #[test]
    fn management_rights() {
        let admin = viewer("a", &[Role::SuperAdmin], false);
        let exec = viewer("e", &[Role::Executive], true);
        let volunteer = viewer("v", &[Role::Volunteer], false);

        assert!(admin.can_manage("x", Role::Executive));
        assert!(!admin.can_manage("a", Role::SuperAdmin));
        assert!(exec.can_manage("x", Role::Volunteer));
        assert!(!exec.can_manage("x", Role::Executive));
        assert!(!exec.can_manage("x", Role::SuperAdmin));
        assert!(!volunteer.can_manage("x", Role::Member));
    }

    #[test]
    fn delete_rights() {
        let member = viewer("m", &[Role::Member], false);
        let exec = viewer("e", &[Role::Executive], true);
        assert!(member.can_delete_post("m"));
        assert!(!member.can_delete_post("x"));
        assert!(exec.can_delete_post("x"));
        assert!(!exec.can_delete_event("x"));
        assert!(member.require(false, "delete this").is_err());
    }
}
