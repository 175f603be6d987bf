// 📄 Contract Entity
//
// Contractor and client arrive as free text from imports. The Linker later
// resolves them to organization ids; until then the *_organization_id
// fields stay None.

use crate::scoping::{ByOrganization, OrganizationScoped, Record};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    /// Database id (0 until inserted)
    pub id: i64,

    /// Owning tenant
    pub organization_id: i64,

    /// Business reference, unique per owning organization
    pub reference: String,
    pub title: String,

    // ========================================================================
    // PARTIES (free text as imported + resolved references)
    // ========================================================================
    pub contractor_name: Option<String>,
    pub client_name: Option<String>,
    pub contractor_organization_id: Option<i64>,
    pub client_organization_id: Option<i64>,

    // ========================================================================
    // TERMS
    // ========================================================================
    /// ISO date when normalization succeeded, raw text otherwise
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub amount: Option<f64>,
    pub renewable: Option<bool>,
    pub family_code: Option<String>,
}

impl Contract {
    pub fn new(organization_id: i64, reference: &str, title: &str) -> Self {
        Contract {
            id: 0,
            organization_id,
            reference: reference.trim().to_string(),
            title: title.trim().to_string(),
            contractor_name: None,
            client_name: None,
            contractor_organization_id: None,
            client_organization_id: None,
            start_date: None,
            end_date: None,
            amount: None,
            renewable: None,
            family_code: None,
        }
    }

    pub fn with_contractor(mut self, name: &str) -> Self {
        self.contractor_name = Some(name.to_string());
        self
    }

    pub fn with_client(mut self, name: &str) -> Self {
        self.client_name = Some(name.to_string());
        self
    }
}

impl Record for Contract {
    const TABLE: &'static str = "contracts";
    const COLUMNS: &'static str = "id, organization_id, reference, title, \
        contractor_name, client_name, contractor_organization_id, client_organization_id, \
        start_date, end_date, amount, renewable, family_code";
    type Scope = ByOrganization;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Contract {
            id: row.get(0)?,
            organization_id: row.get(1)?,
            reference: row.get(2)?,
            title: row.get(3)?,
            contractor_name: row.get(4)?,
            client_name: row.get(5)?,
            contractor_organization_id: row.get(6)?,
            client_organization_id: row.get(7)?,
            start_date: row.get(8)?,
            end_date: row.get(9)?,
            amount: row.get(10)?,
            renewable: row.get(11)?,
            family_code: row.get(12)?,
        })
    }
}

impl OrganizationScoped for Contract {
    fn organization_id(&self) -> i64 {
        self.organization_id
    }
}
