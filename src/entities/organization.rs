// 🏢 Organization Entity - Tenants, contractors and clients
//
// One table serves three purposes: the owning tenant of contracts, and the
// contractor / client parties referenced by contracts.
//
// Display names are free text; matching is case and whitespace insensitive:
// "Acme Corp", " ACME  corp", "acme corp" → same key "acme corp"

use crate::db::parse_timestamp;
use crate::normalize::{clean_name, name_key};
use crate::scoping::{Global, Record};
use chrono::{DateTime, Utc};
use log::warn;
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// ORGANIZATION ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    /// Database id (0 until inserted)
    pub id: i64,

    /// Display name
    pub name: String,

    pub is_contractor: bool,
    pub is_client: bool,

    pub created_at: DateTime<Utc>,
}

impl Organization {
    pub fn new(name: &str) -> Self {
        Organization {
            id: 0,
            name: clean_name(name),
            is_contractor: false,
            is_client: false,
            created_at: Utc::now(),
        }
    }

    pub fn contractor(mut self) -> Self {
        self.is_contractor = true;
        self
    }

    pub fn client(mut self) -> Self {
        self.is_client = true;
        self
    }

    /// Matching key for this organization's name
    pub fn name_key(&self) -> String {
        name_key(&self.name)
    }
}

impl Record for Organization {
    const TABLE: &'static str = "organizations";
    const COLUMNS: &'static str = "id, name, is_contractor, is_client, created_at";
    type Scope = Global;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let created_at: String = row.get(4)?;

        Ok(Organization {
            id: row.get(0)?,
            name: row.get(1)?,
            is_contractor: row.get(2)?,
            is_client: row.get(3)?,
            created_at: parse_timestamp(4, &created_at)?,
        })
    }
}

// ============================================================================
// ORGANIZATION INDEX
// ============================================================================

/// Name lookup over a snapshot of organizations
///
/// Several organizations may share the same key. `find_by_name` resolves
/// that deterministically:
/// 1. prefer organizations whose cleaned name equals the cleaned input exactly (case-sensitive)
/// 2. then the lowest id
pub struct OrganizationIndex {
    by_key: HashMap<String, Vec<Organization>>,
}

impl OrganizationIndex {
    pub fn new(organizations: Vec<Organization>) -> Self {
        let mut by_key: HashMap<String, Vec<Organization>> = HashMap::new();

        for org in organizations {
            by_key.entry(org.name_key()).or_default().push(org);
        }

        for candidates in by_key.values_mut() {
            candidates.sort_by_key(|o| o.id);
        }

        OrganizationIndex { by_key }
    }

    /// All organizations sharing the input's key, lowest id first
    pub fn candidates(&self, name: &str) -> &[Organization] {
        self.by_key
            .get(&name_key(name))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Organization> {
        let candidates = self.candidates(name);

        if candidates.len() > 1 {
            warn!(
                "{} organizations match {:?} (ids {:?}), applying tie-break",
                candidates.len(),
                name,
                candidates.iter().map(|o| o.id).collect::<Vec<_>>()
            );
        }

        let cleaned = clean_name(name);
        candidates
            .iter()
            .find(|o| clean_name(&o.name) == cleaned)
            .or_else(|| candidates.first())
    }

    /// Number of distinct name keys
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn org(id: i64, name: &str) -> Organization {
        let mut o = Organization::new(name);
        o.id = id;
        o
    }

    #[test]
    fn test_organization_creation() {
        let o = Organization::new("  Acme   Corp ").contractor();
        assert_eq!(o.id, 0);
        assert_eq!(o.name, "Acme Corp");
        assert!(o.is_contractor);
        assert!(!o.is_client);
        assert_eq!(o.name_key(), "acme corp");
    }

    #[test]
    fn test_find_by_name_case_insensitive() {
        let index = OrganizationIndex::new(vec![org(1, "Acme Corp"), org(2, "Globex")]);

        assert_eq!(index.find_by_name("acme corp").map(|o| o.id), Some(1));
        assert_eq!(index.find_by_name("  ACME   CORP ").map(|o| o.id), Some(1));
        assert_eq!(index.find_by_name("GLOBEX").map(|o| o.id), Some(2));
        assert!(index.find_by_name("Ghost Inc").is_none());
    }

    #[test]
    fn test_tie_break_prefers_exact_case() {
        let index = OrganizationIndex::new(vec![org(2, "Acme Corp"), org(1, "acme corp")]);

        assert_eq!(index.candidates("ACME CORP").len(), 2);
        assert_eq!(index.find_by_name("Acme Corp").map(|o| o.id), Some(2));
        assert_eq!(index.find_by_name("acme corp").map(|o| o.id), Some(1));
    }

    #[test]
    fn test_tie_break_falls_back_to_lowest_id() {
        let index = OrganizationIndex::new(vec![
            org(9, "Acme Corp"),
            org(3, "acme corp"),
            org(5, "ACME Corp"),
        ]);

        assert_eq!(index.find_by_name("ACME CORP").map(|o| o.id), Some(3));
        assert_eq!(index.len(), 1);
    }
}
