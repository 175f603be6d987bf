// Contract Registry - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod config;
pub mod db;
pub mod entities;
pub mod import;
pub mod linker;
pub mod normalize;
pub mod password;
pub mod report;
pub mod scoping;
pub mod validation;

// Re-export commonly used types
pub use config::{Config, ConfigError};
pub use db::{
    Event, open_database, setup_database, insert_event, get_events_for_entity,
    insert_organization, get_all_organizations, get_organization,
    insert_contract, get_contract, count_contracts,
    seed_contract_families, get_family_tree, insert_invitation,
};
pub use entities::{
    Organization, OrganizationIndex, Contract,
    ContractFamily, FamilyTree, FamilyTreeError, DEFAULT_FAMILIES,
    Invitation, InvitationError, User, accept_invitation,
};
pub use import::{ContractRow, ImportSummary, import_contracts, load_contracts_csv, load_contracts_file};
pub use linker::{LinkReport, LinkStore, Role, RoleStats, SqliteLinkStore, run_linker};
pub use normalize::{FieldValue, Normalized, FieldComparison, normalize_date, normalize_boolean, compare_fields};
pub use password::{PasswordRule, check_password, validate_password};
pub use report::{render_family_summary, render_link_report};
pub use scoping::{
    ByOrganization, Global, OrganizationScoped, Query, Record, Scoping,
    organization_scoped, scoped_to_current_organization,
    belongs_to_organization, validate_organization_access,
};
pub use validation::{ValidationError, ValidationErrors};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
