// 👤 User Entity - member of exactly one organization

use crate::db::parse_timestamp;
use crate::scoping::{ByOrganization, OrganizationScoped, Record};
use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub organization_id: i64,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(organization_id: i64, email: &str) -> Self {
        User {
            id: 0,
            organization_id,
            email: email.trim().to_lowercase(),
            created_at: Utc::now(),
        }
    }
}

impl Record for User {
    const TABLE: &'static str = "users";
    const COLUMNS: &'static str = "id, organization_id, email, created_at";
    type Scope = ByOrganization;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let created_at: String = row.get(3)?;

        Ok(User {
            id: row.get(0)?,
            organization_id: row.get(1)?,
            email: row.get(2)?,
            created_at: parse_timestamp(3, &created_at)?,
        })
    }
}

impl OrganizationScoped for User {
    fn organization_id(&self) -> i64 {
        self.organization_id
    }
}
