// 🏢 Organization Scoping - Data isolation between tenants
//
// A record type is either organization-scoped (carries the owning
// organization's id) or global. Each `Record` impl declares which through
// its `Scope` type: `ByOrganization` is only available to types implementing
// `OrganizationScoped`, so the flag and the owner lookup cannot disagree.
//
// Scoped records are only visible to, and only mutable by, their owner.
// Global records "belong" to everyone, so global resources need their own
// access rules on top of this one.

use crate::entities::Organization;
use crate::validation::{ValidationErrors, BASE};
use anyhow::{Context, Result};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};
use std::marker::PhantomData;

pub const UNAUTHORIZED_ACCESS: &str = "unauthorized access to this resource";

/// Column carrying the owning organization on scoped tables
pub const ORGANIZATION_COLUMN: &str = "organization_id";

// ============================================================================
// RECORD TRAITS
// ============================================================================

/// A persisted record type
pub trait Record: Sized {
    const TABLE: &'static str;

    /// Comma separated column list, in the order `from_row` reads them
    const COLUMNS: &'static str;

    /// `ByOrganization` or `Global`
    type Scope: Scoping<Self>;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

/// Capability of records owned by exactly one organization
pub trait OrganizationScoped: Record {
    fn organization_id(&self) -> i64;
}

/// Static scoping declaration of a record type
pub trait Scoping<R> {
    const ORGANIZATION_SCOPED: bool;

    /// Owning organization, `None` for global types
    fn owner(record: &R) -> Option<i64>;
}

/// Rows carry an `organization_id` and belong to that organization only
pub struct ByOrganization;

impl<R: OrganizationScoped> Scoping<R> for ByOrganization {
    const ORGANIZATION_SCOPED: bool = true;

    fn owner(record: &R) -> Option<i64> {
        Some(record.organization_id())
    }
}

/// Rows are shared by every organization
pub struct Global;

impl<R> Scoping<R> for Global {
    const ORGANIZATION_SCOPED: bool = false;

    fn owner(_record: &R) -> Option<i64> {
        None
    }
}

// ============================================================================
// QUERY
// ============================================================================

/// Equality-only query over one record type
#[derive(Debug, Clone)]
pub struct Query<R> {
    predicates: Vec<(&'static str, Value)>,
    order_by: Option<&'static str>,
    marker: PhantomData<fn() -> R>,
}

impl<R: Record> Query<R> {
    pub fn all() -> Self {
        Query {
            predicates: Vec::new(),
            order_by: None,
            marker: PhantomData,
        }
    }

    /// Narrow to rows where `column = value`
    pub fn where_eq(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.predicates.push((column, value.into()));
        self
    }

    pub fn order_by(mut self, clause: &'static str) -> Self {
        self.order_by = Some(clause);
        self
    }

    pub fn predicates(&self) -> &[(&'static str, Value)] {
        &self.predicates
    }

    /// Render as parameterized SQL (`?1`, `?2`, ... in predicate order)
    pub fn to_sql(&self) -> String {
        let mut sql = format!("SELECT {} FROM {}", R::COLUMNS, R::TABLE);

        if !self.predicates.is_empty() {
            let clauses: Vec<String> = self
                .predicates
                .iter()
                .enumerate()
                .map(|(i, (column, _))| format!("{} = ?{}", column, i + 1))
                .collect();
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        if let Some(order) = self.order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(order);
        }

        sql
    }

    pub fn load(&self, conn: &Connection) -> Result<Vec<R>> {
        let sql = self.to_sql();
        let mut stmt = conn
            .prepare(&sql)
            .with_context(|| format!("Failed to prepare query on {}", R::TABLE))?;

        let rows = stmt
            .query_map(params_from_iter(self.predicates.iter().map(|(_, v)| v)), |row| {
                R::from_row(row)
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    pub fn first(&self, conn: &Connection) -> Result<Option<R>> {
        Ok(self.load(conn)?.into_iter().next())
    }
}

// ============================================================================
// SCOPING RULE
// ============================================================================

pub fn organization_scoped<R: Record>() -> bool {
    <R::Scope as Scoping<R>>::ORGANIZATION_SCOPED
}

/// Narrow `query` to the acting organization's rows.
/// Unscoped types and a missing organization leave the query unchanged.
pub fn scoped_to_current_organization<R: Record>(
    query: Query<R>,
    organization: Option<&Organization>,
) -> Query<R> {
    match organization {
        Some(org) if organization_scoped::<R>() => query.where_eq(ORGANIZATION_COLUMN, org.id),
        _ => query,
    }
}

pub fn belongs_to_organization<R: Record>(record: &R, organization: Option<&Organization>) -> bool {
    let Some(org) = organization else {
        return false;
    };

    match <R::Scope as Scoping<R>>::owner(record) {
        Some(owner) => owner == org.id,
        None => true,
    }
}

/// Adds a base error when a scoped record is touched by another organization
pub fn validate_organization_access<R: Record>(
    record: &R,
    organization: Option<&Organization>,
    errors: &mut ValidationErrors,
) {
    if !organization_scoped::<R>() || organization.is_none() {
        return;
    }

    if !belongs_to_organization(record, organization) {
        errors.add(BASE, UNAUTHORIZED_ACCESS);
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct Note {
        id: i64,
        organization_id: i64,
        body: String,
    }

    impl Record for Note {
        const TABLE: &'static str = "notes";
        const COLUMNS: &'static str = "id, organization_id, body";
        type Scope = ByOrganization;

        fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
            Ok(Note {
                id: row.get(0)?,
                organization_id: row.get(1)?,
                body: row.get(2)?,
            })
        }
    }

    impl OrganizationScoped for Note {
        fn organization_id(&self) -> i64 {
            self.organization_id
        }
    }

    struct Country {
        _code: String,
    }

    impl Record for Country {
        const TABLE: &'static str = "countries";
        const COLUMNS: &'static str = "code";
        type Scope = Global;

        fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
            Ok(Country { _code: row.get(0)? })
        }
    }

    fn org(id: i64) -> Organization {
        let mut org = Organization::new("Acme Corp");
        org.id = id;
        org
    }

    fn note(organization_id: i64) -> Note {
        Note {
            id: 1,
            organization_id,
            body: "hello".to_string(),
        }
    }

    fn setup(conn: &Connection) {
        conn.execute_batch(
            "CREATE TABLE notes (id INTEGER PRIMARY KEY, organization_id INTEGER NOT NULL, body TEXT);
             INSERT INTO notes (id, organization_id, body) VALUES (1, 1, 'mine'), (2, 2, 'theirs'), (3, 1, 'also mine');
             CREATE TABLE countries (code TEXT);
             INSERT INTO countries (code) VALUES ('FR'), ('BE');",
        )
        .unwrap();
    }

    #[test]
    fn test_scoped_flag_is_static() {
        assert!(organization_scoped::<Note>());
        assert!(!organization_scoped::<Country>());
    }

    #[test]
    fn test_unscoped_always_belongs() {
        let country = Country { _code: "FR".to_string() };
        assert!(belongs_to_organization(&country, Some(&org(1))));
        assert!(belongs_to_organization(&country, Some(&org(99))));
    }

    #[test]
    fn test_no_organization_never_belongs() {
        assert!(!belongs_to_organization(&note(1), None));
        assert!(!belongs_to_organization(&Country { _code: "FR".to_string() }, None));
    }

    #[test]
    fn test_owner_comes_from_capability() {
        assert_eq!(<ByOrganization as Scoping<Note>>::owner(&note(4)), Some(4));
        assert_eq!(<Global as Scoping<Country>>::owner(&Country { _code: "FR".to_string() }), None);
    }

    #[test]
    fn test_scoped_belongs_iff_ids_equal() {
        assert!(belongs_to_organization(&note(1), Some(&org(1))));
        assert!(!belongs_to_organization(&note(1), Some(&org(2))));
    }

    #[test]
    fn test_validate_access_adds_error_only_on_mismatch() {
        let mut errors = ValidationErrors::new("Note");
        validate_organization_access(&note(1), Some(&org(1)), &mut errors);
        assert!(errors.is_empty());

        validate_organization_access(&note(1), None, &mut errors);
        assert!(errors.is_empty());

        validate_organization_access(&Country { _code: "BE".to_string() }, Some(&org(2)), &mut errors);
        assert!(errors.is_empty());

        validate_organization_access(&note(1), Some(&org(2)), &mut errors);
        assert_eq!(errors.on(BASE), vec![UNAUTHORIZED_ACCESS]);
    }

    #[test]
    fn test_query_sql_rendering() {
        let query = Query::<Note>::all()
            .where_eq("body", "x".to_string())
            .order_by("id");
        assert_eq!(query.to_sql(), "SELECT id, organization_id, body FROM notes WHERE body = ?1 ORDER BY id");

        let scoped = scoped_to_current_organization(query, Some(&org(7)));
        assert_eq!(
            scoped.to_sql(),
            "SELECT id, organization_id, body FROM notes WHERE body = ?1 AND organization_id = ?2 ORDER BY id"
        );
        assert_eq!(scoped.predicates()[1].1, Value::Integer(7));
    }

    #[test]
    fn test_scoped_query_narrows_rows() {
        let conn = Connection::open_in_memory().unwrap();
        setup(&conn);

        let all = Query::<Note>::all().order_by("id").load(&conn).unwrap();
        assert_eq!(all.len(), 3);

        let mine = scoped_to_current_organization(Query::<Note>::all().order_by("id"), Some(&org(1)))
            .load(&conn)
            .unwrap();
        let ids: Vec<i64> = mine.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert!(mine.iter().all(|n| n.body != "theirs"));

        let unchanged = scoped_to_current_organization(Query::<Note>::all(), None)
            .load(&conn)
            .unwrap();
        assert_eq!(unchanged.len(), 3);
    }

    #[test]
    fn test_unscoped_query_ignores_organization() {
        let conn = Connection::open_in_memory().unwrap();
        setup(&conn);

        let query = scoped_to_current_organization(Query::<Country>::all(), Some(&org(1)));
        assert!(query.predicates().is_empty());
        assert_eq!(query.load(&conn).unwrap().len(), 2);
    }
}
