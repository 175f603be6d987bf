// ✉️ Invitation Entity - Joining an organization
//
// The raw token is handed out once, at issue time. Only its SHA-256 digest
// is stored, so a leaked database does not leak usable invitations.

use crate::db::{self, parse_timestamp, Event};
use crate::entities::User;
use crate::password::validate_password;
use crate::scoping::{ByOrganization, OrganizationScoped, Record};
use crate::validation::ValidationErrors;
use chrono::{DateTime, Duration, Utc};
use log::info;
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const DEFAULT_TTL_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invitation {
    pub id: i64,
    pub organization_id: i64,
    pub email: String,
    pub token_digest: String,
    pub invited_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
}

impl Invitation {
    /// Build a new invitation and its raw token
    pub fn issue(
        organization_id: i64,
        email: &str,
        invited_by: Option<&str>,
        ttl: Duration,
    ) -> (Invitation, String) {
        let token = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        let invitation = Invitation {
            id: 0,
            organization_id,
            email: email.trim().to_lowercase(),
            token_digest: Self::token_digest(&token),
            invited_by: invited_by.map(|s| s.to_string()),
            created_at: now,
            expires_at: now + ttl,
            accepted_at: None,
        };

        (invitation, token)
    }

    pub fn token_digest(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.trim().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_accepted(&self) -> bool {
        self.accepted_at.is_some()
    }
}

impl Record for Invitation {
    const TABLE: &'static str = "invitations";
    const COLUMNS: &'static str =
        "id, organization_id, email, token_digest, invited_by, created_at, expires_at, accepted_at";
    type Scope = ByOrganization;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let created_at: String = row.get(5)?;
        let expires_at: String = row.get(6)?;
        let accepted_at: Option<String> = row.get(7)?;

        Ok(Invitation {
            id: row.get(0)?,
            organization_id: row.get(1)?,
            email: row.get(2)?,
            token_digest: row.get(3)?,
            invited_by: row.get(4)?,
            created_at: parse_timestamp(5, &created_at)?,
            expires_at: parse_timestamp(6, &expires_at)?,
            accepted_at: accepted_at.map(|s| parse_timestamp(7, &s)).transpose()?,
        })
    }
}

impl OrganizationScoped for Invitation {
    fn organization_id(&self) -> i64 {
        self.organization_id
    }
}

// ============================================================================
// ACCEPTANCE
// ============================================================================

#[derive(Debug, Error)]
pub enum InvitationError {
    #[error("invitation not found")]
    NotFound,

    #[error("invitation expired on {0}")]
    Expired(DateTime<Utc>),

    #[error("invitation already accepted")]
    AlreadyAccepted,

    #[error("{0}")]
    WeakPassword(ValidationErrors),

    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

/// Accept an invitation and create the user inside the inviting organization
///
/// Password strength is checked here; storing credentials belongs to the
/// authentication layer.
pub fn accept_invitation(
    conn: &Connection,
    token: &str,
    password: &str,
    now: DateTime<Utc>,
) -> Result<User, InvitationError> {
    let invitation = db::find_invitation_by_digest(conn, &Invitation::token_digest(token))?
        .ok_or(InvitationError::NotFound)?;

    if invitation.is_accepted() {
        return Err(InvitationError::AlreadyAccepted);
    }
    if invitation.is_expired(now) {
        return Err(InvitationError::Expired(invitation.expires_at));
    }

    let mut errors = ValidationErrors::new("User");
    validate_password(password, &mut errors);
    if !errors.is_empty() {
        return Err(InvitationError::WeakPassword(errors));
    }

    // Marking, user creation and the audit event commit together, so a
    // failed insert leaves the invitation usable
    let tx = conn.unchecked_transaction().map_err(anyhow::Error::from)?;

    db::mark_invitation_accepted(&tx, invitation.id, now)?;

    let mut user = User::new(invitation.organization_id, &invitation.email);
    user.created_at = now;
    user.id = db::insert_user(&tx, &user)?;

    let event = Event::new(
        "invitation_accepted",
        "invitation",
        &invitation.id.to_string(),
        serde_json::json!({
            "organization_id": invitation.organization_id,
            "user_id": user.id,
        }),
        &invitation.email,
    );
    db::insert_event(&tx, &event)?;
    tx.commit().map_err(anyhow::Error::from)?;

    info!(
        "{} joined organization {}",
        invitation.email, invitation.organization_id
    );

    Ok(user)
}
