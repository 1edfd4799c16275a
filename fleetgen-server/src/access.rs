//! Role-based permission check.
//!
//! Callers present their roles in the `x-user-roles` header as a
//! comma-separated list. Holding any one of an operation's required roles is
//! enough.

use axum::http::HeaderMap;
use thiserror::Error;

pub const READ_ROLES: &[&str] = &["VEHICLE_READ"];
pub const WRITE_ROLES: &[&str] = &["VEHICLE_WRITE"];

pub const ROLES_HEADER: &str = "x-user-roles";

/// Error code reported to clients on a denied call.
pub const PERMISSION_DENIED_ERROR_CODE: u16 = 2;

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Permission denied: {operation} requires one of {required:?}")]
pub struct PermissionDenied {
    pub operation: String,
    pub required: Vec<String>,
}

pub trait PermissionCheck: Send + Sync {
    fn check(
        &self,
        granted: &[String],
        required: &[&str],
        operation: &str,
    ) -> Result<(), PermissionDenied>;
}

/// Grants a call when any required role is held, or when enforcement is off.
#[derive(Debug, Clone, Copy)]
pub struct RoleValidator {
    enforce: bool,
}

impl RoleValidator {
    pub fn new(enforce: bool) -> Self {
        Self { enforce }
    }
}

impl PermissionCheck for RoleValidator {
    fn check(
        &self,
        granted: &[String],
        required: &[&str],
        operation: &str,
    ) -> Result<(), PermissionDenied> {
        if !self.enforce || required.is_empty() {
            return Ok(());
        }
        if granted.iter().any(|role| required.contains(&role.as_str())) {
            return Ok(());
        }
        tracing::warn!(operation, ?granted, ?required, "Permission denied");
        Err(PermissionDenied {
            operation: operation.to_string(),
            required: required.iter().map(|r| r.to_string()).collect(),
        })
    }
}

/// Roles listed in the request's roles header.
pub fn roles_from_headers(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(ROLES_HEADER)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|role| !role.is_empty())
        .map(str::to_string)
        .collect()
}
