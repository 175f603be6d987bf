use crate::entities::{
    Contract, ContractFamily, FamilySeed, FamilyTree, Invitation, Organization, User,
};
use crate::scoping::{Query, Record};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

/// Parse an RFC 3339 column, reporting the column index on failure
pub fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Event for audit trail ("Every change is an event")
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

pub fn open_database(path: &std::path::Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database at {}", path.display()))?;
    setup_database(&conn)?;
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    // ==========================================================================
    // Organizations (global: tenants, contractors, clients)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS organizations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            is_contractor INTEGER NOT NULL DEFAULT 0,
            is_client INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Contracts (scoped by organization_id)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS contracts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            organization_id INTEGER NOT NULL REFERENCES organizations(id),
            reference TEXT NOT NULL,
            title TEXT NOT NULL,
            contractor_name TEXT,
            client_name TEXT,
            contractor_organization_id INTEGER REFERENCES organizations(id),
            client_organization_id INTEGER REFERENCES organizations(id),
            start_date TEXT,
            end_date TEXT,
            amount REAL,
            renewable INTEGER,
            family_code TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (organization_id, reference)
        )",
        [],
    )?;

    // ==========================================================================
    // Contract families (two-level reference data)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS contract_families (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT UNIQUE NOT NULL,
            name TEXT NOT NULL,
            parent_id INTEGER REFERENCES contract_families(id)
        )",
        [],
    )?;

    // ==========================================================================
    // Invitations & users (scoped by organization_id)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS invitations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            organization_id INTEGER NOT NULL REFERENCES organizations(id),
            email TEXT NOT NULL,
            token_digest TEXT UNIQUE NOT NULL,
            invited_by TEXT,
            created_at TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            accepted_at TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            organization_id INTEGER NOT NULL REFERENCES organizations(id),
            email TEXT UNIQUE NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail / event sourcing)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_contracts_organization ON contracts(organization_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_organizations_name ON organizations(name COLLATE NOCASE)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// EVENTS
// ============================================================================

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: parse_timestamp(1, &timestamp_str)?,
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e))
                })?,
                actor: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

// ============================================================================
// ORGANIZATIONS
// ============================================================================

pub fn insert_organization(conn: &Connection, org: &Organization) -> Result<i64> {
    conn.execute(
        "INSERT INTO organizations (name, is_contractor, is_client, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            org.name,
            org.is_contractor,
            org.is_client,
            org.created_at.to_rfc3339(),
        ],
    )?;

    Ok(conn.last_insert_rowid())
}

pub fn get_all_organizations(conn: &Connection) -> Result<Vec<Organization>> {
    Query::<Organization>::all().order_by("id").load(conn)
}

pub fn get_organization(conn: &Connection, id: i64) -> Result<Option<Organization>> {
    Query::<Organization>::all().where_eq("id", id).first(conn)
}

// ============================================================================
// CONTRACTS
// ============================================================================

pub fn insert_contract(conn: &Connection, contract: &Contract) -> Result<i64> {
    conn.execute(
        "INSERT INTO contracts (
            organization_id, reference, title, contractor_name, client_name,
            contractor_organization_id, client_organization_id,
            start_date, end_date, amount, renewable, family_code
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            contract.organization_id,
            contract.reference,
            contract.title,
            contract.contractor_name,
            contract.client_name,
            contract.contractor_organization_id,
            contract.client_organization_id,
            contract.start_date,
            contract.end_date,
            contract.amount,
            contract.renewable,
            contract.family_code,
        ],
    )
    .with_context(|| format!("Failed to insert contract {}", contract.reference))?;

    Ok(conn.last_insert_rowid())
}

/// Update the imported fields of a contract. Resolved organization ids are left alone.
pub fn update_contract_terms(conn: &Connection, contract: &Contract) -> Result<()> {
    conn.execute(
        "UPDATE contracts
         SET title = ?1, contractor_name = ?2, client_name = ?3,
             start_date = ?4, end_date = ?5, amount = ?6, renewable = ?7, family_code = ?8
         WHERE id = ?9",
        params![
            contract.title,
            contract.contractor_name,
            contract.client_name,
            contract.start_date,
            contract.end_date,
            contract.amount,
            contract.renewable,
            contract.family_code,
            contract.id,
        ],
    )?;

    Ok(())
}

pub fn get_contract(conn: &Connection, id: i64) -> Result<Option<Contract>> {
    Query::<Contract>::all().where_eq("id", id).first(conn)
}

pub fn find_contract_by_reference(
    conn: &Connection,
    organization_id: i64,
    reference: &str,
) -> Result<Option<Contract>> {
    Query::<Contract>::all()
        .where_eq("organization_id", organization_id)
        .where_eq("reference", reference.to_string())
        .first(conn)
}

pub fn count_contracts(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM contracts", [], |row| row.get(0))?;

    Ok(count)
}

// ============================================================================
// CONTRACT FAMILIES
// ============================================================================

/// Insert missing families and subfamilies. Existing codes are kept as-is.
/// Returns the number of rows inserted.
pub fn seed_contract_families(conn: &Connection, seed: &[FamilySeed]) -> Result<usize> {
    let mut inserted = 0;

    for (code, name, subfamilies) in seed {
        inserted += conn.execute(
            "INSERT OR IGNORE INTO contract_families (code, name, parent_id) VALUES (?1, ?2, NULL)",
            params![code, name],
        )?;

        let parent_id: i64 = conn.query_row(
            "SELECT id FROM contract_families WHERE code = ?1",
            [code],
            |row| row.get(0),
        )?;

        for (sub_code, sub_name) in subfamilies.iter() {
            inserted += conn.execute(
                "INSERT OR IGNORE INTO contract_families (code, name, parent_id) VALUES (?1, ?2, ?3)",
                params![sub_code, sub_name, parent_id],
            )?;
        }
    }

    Ok(inserted)
}

pub fn get_family_tree(conn: &Connection) -> Result<FamilyTree> {
    let rows = Query::<ContractFamily>::all().order_by("code").load(conn)?;
    let tree = FamilyTree::from_rows(rows).context("Contract family table is inconsistent")?;

    Ok(tree)
}

// ============================================================================
// INVITATIONS & USERS
// ============================================================================

pub fn insert_invitation(conn: &Connection, invitation: &Invitation) -> Result<i64> {
    conn.execute(
        "INSERT INTO invitations (
            organization_id, email, token_digest, invited_by, created_at, expires_at, accepted_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            invitation.organization_id,
            invitation.email,
            invitation.token_digest,
            invitation.invited_by,
            invitation.created_at.to_rfc3339(),
            invitation.expires_at.to_rfc3339(),
            invitation.accepted_at.map(|dt| dt.to_rfc3339()),
        ],
    )?;

    Ok(conn.last_insert_rowid())
}

pub fn find_invitation_by_digest(conn: &Connection, digest: &str) -> Result<Option<Invitation>> {
    let sql = format!(
        "SELECT {} FROM {} WHERE token_digest = ?1",
        Invitation::COLUMNS,
        Invitation::TABLE
    );

    let invitation = conn
        .query_row(&sql, [digest], |row| Invitation::from_row(row))
        .optional()?;

    Ok(invitation)
}

pub fn mark_invitation_accepted(conn: &Connection, id: i64, at: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "UPDATE invitations SET accepted_at = ?1 WHERE id = ?2",
        params![at.to_rfc3339(), id],
    )?;

    Ok(())
}

pub fn insert_user(conn: &Connection, user: &User) -> Result<i64> {
    conn.execute(
        "INSERT INTO users (organization_id, email, created_at) VALUES (?1, ?2, ?3)",
        params![user.organization_id, user.email, user.created_at.to_rfc3339()],
    )
    .with_context(|| format!("Failed to create user {}", user.email))?;

    Ok(conn.last_insert_rowid())
}
