//! Staff sessions, roles, and WS-ticket management.
//!
//! ARCHITECTURE
//! ============
//! HTTP auth uses long-lived bearer session tokens, while websocket upgrades
//! use one-time short-lived tickets to avoid sending tokens over WS query
//! params. Tokens are stored sha256-hashed; a leaked sessions table cannot be
//! replayed.
//!
//! TRADE-OFFS
//! ==========
//! Ticket consumption is destructive (`DELETE ... RETURNING`) to guarantee
//! single use; this favors replay safety over reconnect convenience.

use std::fmt::Write;

use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[cfg(test)]
#[path = "staff_test.rs"]
mod tests;

#[derive(Debug, thiserror::Error)]
pub enum StaffError {
    #[error("invalid name or access code")]
    InvalidCredentials,
    #[error("role '{0}' cannot edit seating configuration")]
    Forbidden(&'static str),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl crate::frame::ErrorCode for StaffError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "E_UNAUTHORIZED",
            Self::Forbidden(_) => "E_FORBIDDEN",
            Self::Database(_) => "E_DATABASE",
        }
    }
}

/// Staff role, ordered by capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaffRole {
    /// Can view floorplans and seating configuration.
    Host,
    /// Can edit zones, tables, floorplans, combinations, and settings.
    Manager,
}

impl StaffRole {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Manager => "manager",
        }
    }

    #[must_use]
    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "host" => Some(Self::Host),
            "manager" => Some(Self::Manager),
            _ => None,
        }
    }
}

/// Staff row returned from session validation.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StaffMember {
    /// Unique staff identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Role as stored ("host" / "manager").
    pub role: String,
}

impl StaffMember {
    /// Parsed role; unknown strings demote to the weakest role.
    #[must_use]
    pub fn role(&self) -> StaffRole {
        StaffRole::from_str(&self.role).unwrap_or(StaffRole::Host)
    }
}

/// Reject callers whose role cannot mutate seating configuration.
///
/// # Errors
///
/// Returns `Forbidden` for any role below manager.
pub fn ensure_can_edit(staff: &StaffMember) -> Result<(), StaffError> {
    match staff.role() {
        StaffRole::Manager => Ok(()),
        StaffRole::Host => Err(StaffError::Forbidden("host")),
    }
}

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Generate a cryptographically random 32-byte hex token.
#[must_use]
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes_to_hex(&bytes)
}

/// Generate a short-lived 16-byte hex WS ticket.
#[must_use]
pub(crate) fn generate_ws_ticket() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes_to_hex(&bytes)
}

/// Sha256 digest as lowercase hex; applied to tokens and access codes at rest.
#[must_use]
pub fn hash_secret(secret: &str) -> String {
    bytes_to_hex(&Sha256::digest(secret.as_bytes()))
}

/// Validate a name + access code pair and open a session.
/// Returns the raw token (only ever shown once) and the staff member.
///
/// # Errors
///
/// Returns `InvalidCredentials` for unknown names or wrong codes.
pub async fn login(pool: &PgPool, name: &str, access_code: &str) -> Result<(String, StaffMember), StaffError> {
    let row = sqlx::query("SELECT id, name, role, access_code_hash FROM staff WHERE name = $1")
        .bind(name)
        .fetch_optional(pool)
        .await?
        .ok_or(StaffError::InvalidCredentials)?;

    let stored: String = row.get("access_code_hash");
    if stored != hash_secret(access_code) {
        return Err(StaffError::InvalidCredentials);
    }

    let staff = StaffMember { id: row.get("id"), name: row.get("name"), role: row.get("role") };
    let token = generate_token();
    sqlx::query("INSERT INTO staff_sessions (token_hash, staff_id) VALUES ($1, $2)")
        .bind(hash_secret(&token))
        .bind(staff.id)
        .execute(pool)
        .await?;

    Ok((token, staff))
}

/// Validate a session token and return the associated staff member.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn validate_session(pool: &PgPool, token: &str) -> Result<Option<StaffMember>, sqlx::Error> {
    let row = sqlx::query(
        r"SELECT st.id, st.name, st.role
          FROM staff_sessions s
          JOIN staff st ON st.id = s.staff_id
          WHERE s.token_hash = $1 AND s.expires_at > now()",
    )
    .bind(hash_secret(token))
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| StaffMember { id: r.get("id"), name: r.get("name"), role: r.get("role") }))
}

/// Delete a session by token.
///
/// # Errors
///
/// Returns a database error if the delete fails.
pub async fn delete_session(pool: &PgPool, token: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM staff_sessions WHERE token_hash = $1")
        .bind(hash_secret(token))
        .execute(pool)
        .await?;
    Ok(())
}

/// Create a short-lived WS ticket for the given staff member.
///
/// # Errors
///
/// Returns a database error if the insert fails.
pub async fn create_ws_ticket(pool: &PgPool, staff_id: Uuid) -> Result<String, sqlx::Error> {
    let ticket = generate_ws_ticket();
    sqlx::query("INSERT INTO ws_tickets (ticket, staff_id) VALUES ($1, $2)")
        .bind(&ticket)
        .bind(staff_id)
        .execute(pool)
        .await?;
    Ok(ticket)
}

/// Consume a WS ticket atomically, returning the staff member if valid.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn consume_ws_ticket(pool: &PgPool, ticket: &str) -> Result<Option<StaffMember>, sqlx::Error> {
    let row = sqlx::query(
        r"WITH consumed AS (
              DELETE FROM ws_tickets
              WHERE ticket = $1 AND expires_at > now()
              RETURNING staff_id
          )
          SELECT st.id, st.name, st.role
          FROM consumed c
          JOIN staff st ON st.id = c.staff_id",
    )
    .bind(ticket)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| StaffMember { id: r.get("id"), name: r.get("name"), role: r.get("role") }))
}

/// Ensure at least one manager account exists so a fresh deployment can log
/// in. The access code comes from `SEATMAP_BOOTSTRAP_CODE`; without it the
/// bootstrap is skipped (and logged) rather than inventing an unknowable
/// credential.
///
/// # Errors
///
/// Returns a database error if the check or insert fails.
pub async fn bootstrap_manager(pool: &PgPool) -> Result<(), sqlx::Error> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM staff")
        .fetch_one(pool)
        .await?;
    if count > 0 {
        return Ok(());
    }

    let Ok(code) = std::env::var("SEATMAP_BOOTSTRAP_CODE") else {
        tracing::warn!("staff table is empty and SEATMAP_BOOTSTRAP_CODE is unset; no manager bootstrapped");
        return Ok(());
    };

    sqlx::query("INSERT INTO staff (id, name, role, access_code_hash) VALUES ($1, $2, $3, $4)")
        .bind(Uuid::new_v4())
        .bind("manager")
        .bind(StaffRole::Manager.as_str())
        .bind(hash_secret(&code))
        .execute(pool)
        .await?;
    tracing::info!("bootstrapped initial manager account");
    Ok(())
}
