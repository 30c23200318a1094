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

//! Error types for backend operations

use thiserror::Error;

use crate::models::{error_codes, IpcError};

/// Result type for operations against the hosted backend
pub type UnityResult<T> = Result<T, UnityError>;

/// Errors that can occur while serving a request
#[derive(Debug, Error)]
pub enum UnityError {
    #[error("unknown method: {0}")]
    UnknownMethod(String),

    #[error("not signed in")]
    NotAuthenticated,

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("{0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("you've already voted in this poll")]
    AlreadyVoted,

    #[error("your account has been suspended by an administrator")]
    AccountSuspended,

    #[error("your executive account is awaiting admin approval")]
    PendingApproval,

    #[error("please wait {remaining_secs}s before trying again")]
    Cooldown { remaining_secs: u64 },

    #[error("backend returned {status}: {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl UnityError {
    /// Shorthand for a validation failure
    pub fn validation(message: impl Into<String>) -> Self {
        UnityError::Validation(message.into())
    }

    /// Shorthand for a permission failure
    pub fn denied(message: impl Into<String>) -> Self {
        UnityError::PermissionDenied(message.into())
    }

    /// True when the backend rejected a row as a duplicate
    pub fn is_conflict(&self) -> bool {
        match self {
            UnityError::Api { status, code, .. } => {
                *status == 409 || code.as_deref() == Some("23505")
            }
            _ => false,
        }
    }

    /// True when the backend rejected the access token
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, UnityError::Api { status: 401, .. })
    }

    /// IPC error code for this error
    pub fn code(&self) -> i32 {
        match self {
            UnityError::UnknownMethod(_) => error_codes::METHOD_NOT_FOUND,
            UnityError::NotAuthenticated => error_codes::NOT_AUTHENTICATED,
            UnityError::PermissionDenied(_) => error_codes::PERMISSION_DENIED,
            UnityError::Validation(_) => error_codes::INVALID_PARAMS,
            UnityError::NotFound(_) => error_codes::NOT_FOUND,
            UnityError::AlreadyVoted => error_codes::CONFLICT,
            UnityError::AccountSuspended => error_codes::ACCOUNT_SUSPENDED,
            UnityError::PendingApproval => error_codes::PENDING_APPROVAL,
            UnityError::Cooldown { .. } => error_codes::RATE_LIMITED,
            UnityError::Api { status: 401, .. } => error_codes::NOT_AUTHENTICATED,
            UnityError::Api { status: 403, .. } => error_codes::PERMISSION_DENIED,
            e if e.is_conflict() => error_codes::CONFLICT,
            UnityError::Api { .. } => error_codes::API_ERROR,
            UnityError::Http(_) => error_codes::NETWORK_ERROR,
            UnityError::Serialization(_) | UnityError::Storage(_) | UnityError::Io(_) => {
                error_codes::INTERNAL_ERROR
            }
        }
    }
}

impl From<&UnityError> for IpcError {
    fn from(error: &UnityError) -> Self {
        let ipc = IpcError::new(error.code(), error.to_string());
        match error {
            UnityError::Api { status, code, .. } => ipc.with_data(serde_json::json!({
                "status": status,
                "code": code,
            })),
            UnityError::Cooldown { remaining_secs } => ipc.with_data(serde_json::json!({
                "remaining_secs": remaining_secs,
            })),
            _ => ipc,
        }
    }
}

impl From<sqlx::Error> for UnityError {
    fn from(error: sqlx::Error) -> Self {
        UnityError::Storage(error.to_string())
    }
}

impl From<anyhow::Error> for UnityError {
    fn from(error: anyhow::Error) -> Self {
        UnityError::Storage(format!("{:#}", error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16, code: Option<&str>) -> UnityError {
        UnityError::Api {
            status,
            code: code.map(str::to_string),
            message: "boom".to_string(),
        }
    }

    #[test]
    fn unique_violation_is_conflict() {
        assert!(api(409, None).is_conflict());
        assert!(api(400, Some("23505")).is_conflict());
        assert!(!api(400, Some("22P02")).is_conflict());
        assert!(!UnityError::AlreadyVoted.is_conflict());
    }

    #[test]
    fn codes_follow_error_kind() {
        assert_eq!(api(401, None).code(), error_codes::NOT_AUTHENTICATED);
        assert_eq!(api(403, None).code(), error_codes::PERMISSION_DENIED);
        assert_eq!(api(409, None).code(), error_codes::CONFLICT);
        assert_eq!(api(500, None).code(), error_codes::API_ERROR);
        assert_eq!(
            UnityError::validation("bad").code(),
            error_codes::INVALID_PARAMS
        );
    }

    #[test]
    fn ipc_error_carries_backend_code() {
        let ipc = IpcError::from(&api(400, Some("23505")));
        assert_eq!(ipc.code, error_codes::CONFLICT);
        let data = ipc.data.expect("api errors carry data");
        assert_eq!(data["code"], "23505");
        assert_eq!(data["status"], 400);
    }
}
