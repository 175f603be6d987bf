// 🔗 Contractor/Client Linker - Free-text names → organization ids
//
// Imports leave contractor_name / client_name as typed by whoever filled the
// spreadsheet. This pass resolves them against existing organizations:
//
//   already linked    → counted, untouched
//   blank name        → counted, untouched
//   name matches      → foreign key written, audit event logged
//   no match          → name kept in the unmatched set for manual follow-up
//   save failed       → counted as failed, pass continues
//
// Organizations are never created here.

use crate::db::{insert_event, Event};
use crate::entities::{Organization, OrganizationIndex};
use crate::normalize::{clean_name, name_key};
use anyhow::{anyhow, Result};
use log::{debug, info, warn};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

// ============================================================================
// ROLE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Contractor,
    Client,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Contractor, Role::Client];

    /// Free-text column as imported
    pub fn name_column(&self) -> &'static str {
        match self {
            Role::Contractor => "contractor_name",
            Role::Client => "client_name",
        }
    }

    /// Resolved foreign key column
    pub fn id_column(&self) -> &'static str {
        match self {
            Role::Contractor => "contractor_organization_id",
            Role::Client => "client_organization_id",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::Contractor => "CONTRACTORS",
            Role::Client => "CLIENTS",
        }
    }
}

// ============================================================================
// OUTCOME
// ============================================================================

/// A contract waiting for its organization reference
#[derive(Debug, Clone, PartialEq)]
pub struct PendingLink {
    pub contract_id: i64,
    pub name: String,
}

/// A contract whose link could not be saved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkAnomaly {
    pub contract_id: i64,
    pub name: String,
    pub organization_id: i64,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoleStats {
    pub linked: usize,
    pub already_linked: usize,
    pub not_found: usize,
    pub no_name: usize,
    pub failed: usize,

    /// Cleaned names with no matching organization, sorted. Spellings that
    /// differ only by case are listed once, as first seen.
    pub unmatched: BTreeSet<String>,

    pub anomalies: Vec<LinkAnomaly>,
}

impl RoleStats {
    pub fn unmatched_names(&self) -> Vec<&str> {
        self.unmatched.iter().map(|s| s.as_str()).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkReport {
    pub contractors: RoleStats,
    pub clients: RoleStats,
}

impl LinkReport {
    pub fn for_role(&self, role: Role) -> &RoleStats {
        match role {
            Role::Contractor => &self.contractors,
            Role::Client => &self.clients,
        }
    }

    fn for_role_mut(&mut self, role: Role) -> &mut RoleStats {
        match role {
            Role::Contractor => &mut self.contractors,
            Role::Client => &mut self.clients,
        }
    }

    pub fn has_unmatched(&self) -> bool {
        !self.contractors.unmatched.is_empty() || !self.clients.unmatched.is_empty()
    }

    pub fn has_failures(&self) -> bool {
        self.contractors.failed > 0 || self.clients.failed > 0
    }
}

// ============================================================================
// STORE
// ============================================================================

/// What the Linker needs from persistence
pub trait LinkStore {
    /// Contracts whose resolved id for `role` is already set
    fn count_already_linked(&self, role: Role) -> Result<usize>;

    /// Contracts with no resolved id and a blank name for `role`
    fn count_without_name(&self, role: Role) -> Result<usize>;

    /// Contracts with no resolved id and a non-blank name for `role`
    fn pending(&self, role: Role) -> Result<Vec<PendingLink>>;

    fn organizations(&self) -> Result<Vec<Organization>>;

    fn save_link(&mut self, contract_id: i64, role: Role, organization_id: i64) -> Result<()>;
}

/// SQLite-backed store. Each saved link also writes a `contract_linked` event.
pub struct SqliteLinkStore<'a> {
    conn: &'a Connection,
    actor: String,
}

impl<'a> SqliteLinkStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        SqliteLinkStore {
            conn,
            actor: "organization_linker".to_string(),
        }
    }

    fn count_where(&self, clause: &str) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM contracts WHERE {}", clause);
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl LinkStore for SqliteLinkStore<'_> {
    fn count_already_linked(&self, role: Role) -> Result<usize> {
        self.count_where(&format!("{} IS NOT NULL", role.id_column()))
    }

    fn count_without_name(&self, role: Role) -> Result<usize> {
        self.count_where(&format!(
            "{} IS NULL AND TRIM(COALESCE({}, '')) = ''",
            role.id_column(),
            role.name_column()
        ))
    }

    fn pending(&self, role: Role) -> Result<Vec<PendingLink>> {
        let sql = format!(
            "SELECT id, {name} FROM contracts
             WHERE {id} IS NULL AND TRIM(COALESCE({name}, '')) <> ''
             ORDER BY id",
            name = role.name_column(),
            id = role.id_column()
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let pending = stmt
            .query_map([], |row| {
                Ok(PendingLink {
                    contract_id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(pending)
    }

    fn organizations(&self) -> Result<Vec<Organization>> {
        crate::db::get_all_organizations(self.conn)
    }

    fn save_link(&mut self, contract_id: i64, role: Role, organization_id: i64) -> Result<()> {
        let sql = format!(
            "UPDATE contracts SET {id} = ?1 WHERE id = ?2 AND {id} IS NULL",
            id = role.id_column()
        );

        // The link and its audit event land together or not at all
        let tx = self.conn.unchecked_transaction()?;

        let updated = tx.execute(&sql, params![organization_id, contract_id])?;
        if updated == 0 {
            return Err(anyhow!(
                "contract {} no longer waits for a {} link",
                contract_id,
                role.name_column()
            ));
        }

        let event = Event::new(
            "contract_linked",
            "contract",
            &contract_id.to_string(),
            serde_json::json!({
                "field": role.id_column(),
                "organization_id": organization_id,
            }),
            &self.actor,
        );
        insert_event(&tx, &event)?;
        tx.commit()?;

        Ok(())
    }
}

// ============================================================================
// LINKER
// ============================================================================

/// Run one pass for `role` against a prebuilt organization index
pub fn link_role<S: LinkStore>(
    store: &mut S,
    index: &OrganizationIndex,
    role: Role,
) -> Result<RoleStats> {
    let mut stats = RoleStats {
        already_linked: store.count_already_linked(role)?,
        no_name: store.count_without_name(role)?,
        ..RoleStats::default()
    };

    let mut unmatched_keys = HashSet::new();

    for pending in store.pending(role)? {
        let name = clean_name(&pending.name);

        // Whitespace the database does not consider blank (tabs, newlines)
        if name.is_empty() {
            stats.no_name += 1;
            continue;
        }

        let Some(org) = index.find_by_name(&name) else {
            debug!("{:?} {:?} on contract {} not found", role, name, pending.contract_id);
            stats.not_found += 1;
            if unmatched_keys.insert(name_key(&name)) {
                stats.unmatched.insert(name);
            }
            continue;
        };

        match store.save_link(pending.contract_id, role, org.id) {
            Ok(()) => {
                debug!(
                    "Linked contract {} {:?} → organization {} ({})",
                    pending.contract_id, role, org.id, org.name
                );
                stats.linked += 1;
            }
            Err(e) => {
                warn!(
                    "Failed to save {:?} link for contract {}: {:#}",
                    role, pending.contract_id, e
                );
                stats.failed += 1;
                stats.anomalies.push(LinkAnomaly {
                    contract_id: pending.contract_id,
                    name,
                    organization_id: org.id,
                    error: format!("{:#}", e),
                });
            }
        }
    }

    info!(
        "{}: {} linked, {} already linked, {} not found, {} without name, {} failed",
        role.label(),
        stats.linked,
        stats.already_linked,
        stats.not_found,
        stats.no_name,
        stats.failed
    );

    Ok(stats)
}

/// Link contractors, then clients
pub fn run_linker<S: LinkStore>(store: &mut S) -> Result<LinkReport> {
    let index = OrganizationIndex::new(store.organizations()?);
    let mut report = LinkReport::default();

    for role in Role::ALL {
        *report.for_role_mut(role) = link_role(store, &index, role)?;
    }

    Ok(report)
}

// ============================================================================
// TESTS
// ============================================================================
