//! Errors reported to clients as ERR packets

use std::fmt;

use coshard_core::CoshardError;

use super::consts::{self, ER_ACCESS_DENIED_ERROR, ER_BAD_DB_ERROR, ER_HANDSHAKE_ERROR, ER_UNKNOWN_ERROR};

/// A MySQL error: code, SQLSTATE and message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlError {
    pub code: u16,
    pub state: String,
    pub message: String,
}

impl SqlError {
    /// Error with the SQLSTATE that belongs to `code`
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            state: consts::sql_state(code).to_string(),
            message: message.into(),
        }
    }

    pub fn access_denied(user: &str, host: &str, using_password: bool) -> Self {
        Self::new(
            ER_ACCESS_DENIED_ERROR,
            format!(
                "Access denied for user '{}'@'{}' (using password: {})",
                user,
                host,
                if using_password { "YES" } else { "NO" }
            ),
        )
    }

    pub fn bad_db(db: &str) -> Self {
        Self::new(ER_BAD_DB_ERROR, format!("Unknown database '{}'", db))
    }

    pub fn unsupported_command(command: u8) -> Self {
        Self::new(ER_UNKNOWN_ERROR, format!("command {} not supported now", command))
    }

    /// A backend connection could not be obtained
    pub fn backend_unavailable(reason: impl fmt::Display) -> Self {
        Self::new(ER_UNKNOWN_ERROR, format!("backend unavailable: {}", reason))
    }
}

impl fmt::Display for SqlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ERROR {} ({}): {}", self.code, self.state, self.message)
    }
}

impl std::error::Error for SqlError {}

impl From<&CoshardError> for SqlError {
    fn from(err: &CoshardError) -> Self {
        match err {
            e if e.is_backend_unavailable() => Self::backend_unavailable(e),
            CoshardError::Protocol(msg) => Self::new(ER_HANDSHAKE_ERROR, msg.clone()),
            other => Self::new(ER_UNKNOWN_ERROR, other.to_string()),
        }
    }
}

impl From<CoshardError> for SqlError {
    fn from(err: CoshardError) -> Self {
        Self::from(&err)
    }
}
