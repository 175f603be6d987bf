use anyhow::{bail, Context, Result};
use chrono::Duration;
use std::env;
use std::path::Path;

use contract_registry::{
    get_all_organizations, get_family_tree, get_organization, import_contracts, insert_invitation,
    insert_organization, load_contracts_file, open_database, render_family_summary,
    render_link_report, run_linker, scoped_to_current_organization, seed_contract_families,
    Config, Contract, Invitation, Organization, Query, SqliteLinkStore, DEFAULT_FAMILIES,
};
use contract_registry::entities::DEFAULT_TTL_DAYS;

const USAGE: &str = "\
Usage: contract-registry <command>

Commands:
  init                                         Create the database schema
  seed-families                                Seed contract families and print a summary
  add-organization <name> [--contractor] [--client]
  organizations                                List organizations
  import <csv> --organization <id>             Import contracts owned by an organization
  link                                         Link contractor/client names to organizations
  contracts --organization <id>                List an organization's contracts
  invite <organization-id> <email>             Invite a user into an organization

Environment:
  CONTRACT_REGISTRY_DB    database path (default: contracts.db)
  RUST_LOG                log level (default: info)";

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(command) = args.first() else {
        println!("{}", USAGE);
        return Ok(());
    };

    let config = Config::from_env()?;
    let rest = &args[1..];

    match command.as_str() {
        "init" => run_init(&config),
        "seed-families" => run_seed_families(&config),
        "add-organization" => run_add_organization(&config, rest),
        "organizations" => run_organizations(&config),
        "import" => run_import(&config, rest),
        "link" => run_link(&config),
        "contracts" => run_contracts(&config, rest),
        "invite" => run_invite(&config, rest),
        "help" | "--help" | "-h" => {
            println!("{}", USAGE);
            Ok(())
        }
        other => {
            eprintln!("❌ Unknown command: {}\n", other);
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    }
}

/// Value following `--flag`, if any
fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

fn organization_arg(args: &[String]) -> Result<i64> {
    let raw = flag_value(args, "--organization").context("--organization <id> is required")?;
    raw.parse::<i64>()
        .with_context(|| format!("Invalid organization id: {}", raw))
}

fn run_init(config: &Config) -> Result<()> {
    open_database(&config.database_path)?;
    println!("✓ Database initialized at {}", config.database_path.display());
    Ok(())
}

fn run_seed_families(config: &Config) -> Result<()> {
    let conn = open_database(&config.database_path)?;

    println!("🌱 Seeding contract families...");
    let inserted = seed_contract_families(&conn, DEFAULT_FAMILIES)?;
    println!("✓ Inserted {} new rows\n", inserted);

    let tree = get_family_tree(&conn)?;
    print!("{}", render_family_summary(&tree));
    Ok(())
}

fn run_add_organization(config: &Config, args: &[String]) -> Result<()> {
    let Some(name) = args.iter().find(|a| !a.starts_with("--")) else {
        bail!("add-organization needs a name");
    };

    let mut org = Organization::new(name);
    if args.iter().any(|a| a == "--contractor") {
        org = org.contractor();
    }
    if args.iter().any(|a| a == "--client") {
        org = org.client();
    }

    let conn = open_database(&config.database_path)?;
    let id = insert_organization(&conn, &org)?;
    println!("✓ Organization #{} {}", id, org.name);
    Ok(())
}

fn run_organizations(config: &Config) -> Result<()> {
    let conn = open_database(&config.database_path)?;

    for org in get_all_organizations(&conn)? {
        let mut roles = Vec::new();
        if org.is_contractor {
            roles.push("contractor");
        }
        if org.is_client {
            roles.push("client");
        }
        println!("{:>5}  {}  [{}]", org.id, org.name, roles.join(", "));
    }
    Ok(())
}

fn run_import(config: &Config, args: &[String]) -> Result<()> {
    let Some(csv_path) = args.first().filter(|a| !a.starts_with("--")) else {
        bail!("import needs a CSV path");
    };
    let organization_id = organization_arg(args)?;

    println!("📥 Contract Import - CSV → SQLite");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let conn = open_database(&config.database_path)?;
    if get_organization(&conn, organization_id)?.is_none() {
        bail!("Organization {} does not exist", organization_id);
    }

    println!("\n📂 Loading CSV...");
    let rows = load_contracts_file(Path::new(csv_path))?;
    println!("✓ Loaded {} rows from {}", rows.len(), csv_path);

    println!("\n💾 Importing contracts...");
    let summary = import_contracts(&conn, organization_id, &rows)?;
    println!("✓ {}", summary.summary());

    for (reference, change) in &summary.changes {
        println!(
            "  ~ {} {}: {:?} → {:?}",
            reference, change.field, change.current, change.incoming
        );
    }
    for warning in &summary.warnings {
        println!("  ⚠️  {}", warning);
    }

    Ok(())
}

fn run_link(config: &Config) -> Result<()> {
    let conn = open_database(&config.database_path)?;
    let mut store = SqliteLinkStore::new(&conn);

    let report = run_linker(&mut store)?;
    print!("{}", render_link_report(&report));
    Ok(())
}

fn run_contracts(config: &Config, args: &[String]) -> Result<()> {
    let organization_id = organization_arg(args)?;
    let conn = open_database(&config.database_path)?;

    let organization = get_organization(&conn, organization_id)?
        .with_context(|| format!("Organization {} does not exist", organization_id))?;

    let contracts = scoped_to_current_organization(
        Query::<Contract>::all().order_by("reference"),
        Some(&organization),
    )
    .load(&conn)?;

    println!("📄 {} contracts for {}", contracts.len(), organization.name);
    for c in contracts {
        println!(
            "  {}  {}  contractor: {}  client: {}",
            c.reference,
            c.title,
            party(&c.contractor_name, c.contractor_organization_id),
            party(&c.client_name, c.client_organization_id),
        );
    }
    Ok(())
}

fn party(name: &Option<String>, organization_id: Option<i64>) -> String {
    match (name, organization_id) {
        (Some(n), Some(id)) => format!("{} (#{})", n, id),
        (Some(n), None) => format!("{} (unlinked)", n),
        (None, Some(id)) => format!("#{}", id),
        (None, None) => "-".to_string(),
    }
}

fn run_invite(config: &Config, args: &[String]) -> Result<()> {
    let (Some(raw_id), Some(email)) = (args.first(), args.get(1)) else {
        bail!("invite needs <organization-id> <email>");
    };
    let organization_id: i64 = raw_id
        .parse()
        .with_context(|| format!("Invalid organization id: {}", raw_id))?;

    let conn = open_database(&config.database_path)?;
    if get_organization(&conn, organization_id)?.is_none() {
        bail!("Organization {} does not exist", organization_id);
    }

    let invited_by = env::var("USER").ok();
    let (invitation, token) = Invitation::issue(
        organization_id,
        email,
        invited_by.as_deref(),
        Duration::days(DEFAULT_TTL_DAYS),
    );
    insert_invitation(&conn, &invitation)?;

    println!("✉️  Invitation for {} created", invitation.email);
    println!("   Token (shown once): {}", token);
    println!("   Expires: {}", invitation.expires_at.to_rfc3339());
    Ok(())
}
