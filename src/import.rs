// 📥 Contract Import - CSV → SQLite
//
// Rows are upserted by (owning organization, reference). Re-importing the
// same file is a no-op; a changed row is updated field by field. Resolved
// contractor/client ids are never touched here, that is the Linker's job.

use crate::db::{find_contract_by_reference, insert_contract, insert_event, update_contract_terms, Event};
use crate::entities::Contract;
use crate::normalize::{compare_fields, normalize_boolean, normalize_date, FieldComparison, FieldKind, FieldValue};
use anyhow::{Context, Result};
use log::{info, warn};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

/// One CSV row, as typed in the source spreadsheet
#[derive(Debug, Clone, Deserialize)]
pub struct ContractRow {
    pub reference: String,
    pub title: String,
    #[serde(default)]
    pub contractor_name: Option<String>,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub renewable: Option<String>,
    #[serde(default)]
    pub family_code: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub warnings: Vec<String>,
    /// (reference, changed field)
    pub changes: Vec<(String, FieldComparison)>,
}

impl ImportSummary {
    pub fn summary(&self) -> String {
        format!(
            "{} inserted, {} updated, {} unchanged, {} warnings",
            self.inserted,
            self.updated,
            self.unchanged,
            self.warnings.len()
        )
    }
}

pub fn load_contracts_csv<R: Read>(reader: R) -> Result<Vec<ContractRow>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::Headers).from_reader(reader);

    let mut rows = Vec::new();
    for (i, result) in rdr.deserialize().enumerate() {
        // Header is line 1
        let row: ContractRow =
            result.with_context(|| format!("Failed to deserialize contract on line {}", i + 2))?;
        rows.push(row);
    }

    Ok(rows)
}

pub fn load_contracts_file(path: &Path) -> Result<Vec<ContractRow>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open CSV file {}", path.display()))?;
    load_contracts_csv(file)
}

/// Build the contract a row describes, collecting normalization warnings
fn row_to_contract(organization_id: i64, row: &ContractRow, warnings: &mut Vec<String>) -> Contract {
    let mut contract = Contract::new(organization_id, &row.reference, &row.title);
    contract.contractor_name = non_blank(&row.contractor_name);
    contract.client_name = non_blank(&row.client_name);
    contract.amount = row.amount;
    contract.family_code = non_blank(&row.family_code);

    contract.start_date = normalized_date(&row.reference, "start_date", &row.start_date, warnings);
    contract.end_date = normalized_date(&row.reference, "end_date", &row.end_date, warnings);

    let renewable = FieldValue::from_optional(row.renewable.as_deref());
    contract.renewable = normalize_boolean(&renewable);
    if contract.renewable.is_none() && !renewable.is_null() {
        warnings.push(format!(
            "{}: renewable {:?} is not a yes/no value, left empty",
            row.reference,
            renewable.display()
        ));
    }

    contract
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

fn normalized_date(
    reference: &str,
    field: &str,
    raw: &Option<String>,
    warnings: &mut Vec<String>,
) -> Option<String> {
    let value = FieldValue::from_optional(raw.as_deref());
    if value.is_null() {
        return None;
    }

    let normalized = normalize_date(&value);
    if !normalized.ok {
        warnings.push(format!(
            "{}: {} {:?} is not a recognised date, kept as-is",
            reference, field, normalized.value
        ));
    }
    Some(normalized.value)
}

/// Field-by-field diff between a stored contract and its incoming version
pub fn diff_contracts(current: &Contract, incoming: &Contract) -> Vec<FieldComparison> {
    let text = |v: &Option<String>| FieldValue::from_optional(v.as_deref());
    let amount = |v: Option<f64>| v.map(FieldValue::Number).unwrap_or(FieldValue::Null);
    let flag = |v: Option<bool>| v.map(FieldValue::Bool).unwrap_or(FieldValue::Null);

    let comparisons = vec![
        compare_fields(
            "title",
            FieldKind::Text,
            &FieldValue::Text(current.title.clone()),
            &FieldValue::Text(incoming.title.clone()),
        ),
        compare_fields("contractor_name", FieldKind::Text, &text(&current.contractor_name), &text(&incoming.contractor_name)),
        compare_fields("client_name", FieldKind::Text, &text(&current.client_name), &text(&incoming.client_name)),
        compare_fields("start_date", FieldKind::Date, &text(&current.start_date), &text(&incoming.start_date)),
        compare_fields("end_date", FieldKind::Date, &text(&current.end_date), &text(&incoming.end_date)),
        compare_fields("amount", FieldKind::Text, &amount(current.amount), &amount(incoming.amount)),
        compare_fields("renewable", FieldKind::Boolean, &flag(current.renewable), &flag(incoming.renewable)),
        compare_fields("family_code", FieldKind::Text, &text(&current.family_code), &text(&incoming.family_code)),
    ];

    comparisons.into_iter().filter(|c| c.changed).collect()
}

/// Upsert rows into `organization_id`'s contracts
pub fn import_contracts(
    conn: &Connection,
    organization_id: i64,
    rows: &[ContractRow],
) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();

    for row in rows {
        if row.reference.trim().is_empty() {
            summary
                .warnings
                .push(format!("row with title {:?} has no reference, skipped", row.title));
            continue;
        }

        let incoming = row_to_contract(organization_id, row, &mut summary.warnings);

        match find_contract_by_reference(conn, organization_id, &incoming.reference)? {
            None => {
                let id = insert_contract(conn, &incoming)?;
                summary.inserted += 1;

                let event = Event::new(
                    "contract_imported",
                    "contract",
                    &id.to_string(),
                    serde_json::json!({ "reference": incoming.reference }),
                    "csv_importer",
                );
                insert_event(conn, &event)?;
            }
            Some(current) => {
                let changes = diff_contracts(&current, &incoming);
                if changes.is_empty() {
                    summary.unchanged += 1;
                    continue;
                }

                let mut updated = incoming.clone();
                updated.id = current.id;
                update_contract_terms(conn, &updated)?;
                summary.updated += 1;

                let event = Event::new(
                    "contract_updated",
                    "contract",
                    &current.id.to_string(),
                    serde_json::json!({ "changes": changes }),
                    "csv_importer",
                );
                insert_event(conn, &event)?;

                summary
                    .changes
                    .extend(changes.into_iter().map(|c| (incoming.reference.clone(), c)));
            }
        }
    }

    for warning in &summary.warnings {
        warn!("{}", warning);
    }
    info!("Contract import for organization {}: {}", organization_id, summary.summary());

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_contract, insert_organization, setup_database};
    use crate::entities::Organization;

    const CSV: &str = "\
reference,title,contractor_name,client_name,start_date,end_date,amount,renewable,family_code
C-001,Office cleaning,Acme Corp,City Hall,15/01/2024,2024-12-31,12000.5,oui,SER-NET
C-002,Security,  Guard Co ,,2024-02-01,someday,,maybe,
";

    fn test_db() -> (Connection, i64) {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        let tenant = insert_organization(&conn, &Organization::new("Tenant")).unwrap();
        (conn, tenant)
    }

    #[test]
    fn test_load_and_normalize_rows() {
        let (conn, tenant) = test_db();
        let rows = load_contracts_csv(CSV.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);

        let summary = import_contracts(&conn, tenant, &rows).unwrap();
        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.warnings.len(), 2);

        let c1 = find_contract_by_reference(&conn, tenant, "C-001").unwrap().unwrap();
        assert_eq!(c1.start_date.as_deref(), Some("2024-01-15"));
        assert_eq!(c1.end_date.as_deref(), Some("2024-12-31"));
        assert_eq!(c1.renewable, Some(true));
        assert_eq!(c1.amount, Some(12000.5));
        assert!(c1.contractor_organization_id.is_none());

        let c2 = find_contract_by_reference(&conn, tenant, "C-002").unwrap().unwrap();
        assert_eq!(c2.contractor_name.as_deref(), Some("Guard Co"));
        assert_eq!(c2.client_name, None);
        assert_eq!(c2.end_date.as_deref(), Some("someday"));
        assert_eq!(c2.renewable, None);
        assert_eq!(c2.family_code, None);
    }

    #[test]
    fn test_reimport_is_unchanged() {
        let (conn, tenant) = test_db();
        let rows = load_contracts_csv(CSV.as_bytes()).unwrap();

        import_contracts(&conn, tenant, &rows).unwrap();
        let second = import_contracts(&conn, tenant, &rows).unwrap();

        assert_eq!(second.inserted, 0);
        assert_eq!(second.updated, 0);
        assert_eq!(second.unchanged, 2);
    }

    #[test]
    fn test_changed_row_updates_terms_only() {
        let (conn, tenant) = test_db();
        let acme = insert_organization(&conn, &Organization::new("Acme Corp")).unwrap();
        let rows = load_contracts_csv(CSV.as_bytes()).unwrap();
        import_contracts(&conn, tenant, &rows).unwrap();

        let mut c1 = find_contract_by_reference(&conn, tenant, "C-001").unwrap().unwrap();
        conn.execute(
            "UPDATE contracts SET contractor_organization_id = ?1 WHERE id = ?2",
            rusqlite::params![acme, c1.id],
        )
        .unwrap();

        let mut changed = rows.clone();
        changed[0].start_date = Some("2024-01-15".to_string()); // same date, other format
        changed[0].title = "Office & window cleaning".to_string();

        let summary = import_contracts(&conn, tenant, &changed).unwrap();
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.unchanged, 1);
        assert_eq!(summary.changes.len(), 1);
        assert_eq!(summary.changes[0].0, "C-001");
        assert_eq!(summary.changes[0].1.field, "title");

        c1 = get_contract(&conn, c1.id).unwrap().unwrap();
        assert_eq!(c1.title, "Office & window cleaning");
        assert_eq!(c1.contractor_organization_id, Some(acme));
    }

    #[test]
    fn test_bad_amount_is_an_error() {
        let csv = "reference,title,amount\nC-9,Broken,twelve\n";
        let err = load_contracts_csv(csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
