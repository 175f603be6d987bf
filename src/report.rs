// 📋 Reports - Plain-text output for the linker and the family seed
//
// Operational runbooks parse the linker report line by line. Keep the
// wording and glyph prefixes stable.

use crate::entities::FamilyTree;
use crate::linker::{LinkReport, Role};
use std::fmt::Write;

const BANNER: &str = "============================================================";
const RULE: &str = "------------------------------------------------------------";

/// Render the linker outcome
pub fn render_link_report(report: &LinkReport) -> String {
    let mut out = String::new();

    // Writing to a String cannot fail
    let _ = writeln!(out, "{}", BANNER);
    let _ = writeln!(out, "LINKING CONTRACTORS AND CLIENTS TO ORGANIZATIONS");
    let _ = writeln!(out, "{}", BANNER);

    for role in Role::ALL {
        let stats = report.for_role(role);
        let _ = writeln!(out);
        let _ = writeln!(out, "{}:", role.label());
        let _ = writeln!(out, "  ✅ Linked: {}", stats.linked);
        let _ = writeln!(out, "  ⏭️  Already linked: {}", stats.already_linked);
        let _ = writeln!(out, "  ❌ Not found: {}", stats.not_found);
        let _ = writeln!(out, "  ⚠️  No name: {}", stats.no_name);
        if stats.failed > 0 {
            let _ = writeln!(out, "  💥 Failed to save: {}", stats.failed);
        }
    }

    let _ = writeln!(out);

    if report.has_unmatched() {
        let _ = writeln!(out, "{}", RULE);
        let _ = writeln!(out, "UNMATCHED ORGANIZATIONS");
        let _ = writeln!(out, "{}", RULE);

        for role in Role::ALL {
            let stats = report.for_role(role);
            if stats.unmatched.is_empty() {
                continue;
            }

            let _ = writeln!(out);
            let _ = writeln!(out, "{} ({}):", role.label(), stats.unmatched.len());
            for name in &stats.unmatched {
                let _ = writeln!(out, "  - {}", name);
            }
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "Next steps:");
        let _ = writeln!(
            out,
            "  1. Create the missing organizations (names are matched case-insensitively)"
        );
        let _ = writeln!(out, "  2. Re-run: contract-registry link");
    } else {
        let _ = writeln!(
            out,
            "✅ All contractors and clients are linked to an organization."
        );
    }

    if report.has_failures() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Failed contracts:");
        for role in Role::ALL {
            for anomaly in &report.for_role(role).anomalies {
                let _ = writeln!(
                    out,
                    "  - contract {} ({} \"{}\"): {}",
                    anomaly.contract_id,
                    role.name_column(),
                    anomaly.name,
                    anomaly.error
                );
            }
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "{}", BANNER);
    let _ = writeln!(out, "DONE");
    let _ = writeln!(out, "{}", BANNER);

    out
}

/// Render the contract family seed summary
pub fn render_family_summary(tree: &FamilyTree) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "🗂️  Contract families");
    let _ = writeln!(out, "  Families: {}", tree.family_count());
    let _ = writeln!(out, "  Subfamilies: {}", tree.subfamily_count());
    let _ = writeln!(out, "  Total: {}", tree.total());
    let _ = writeln!(out);

    for node in &tree.families {
        let _ = writeln!(
            out,
            "  {} - {} ({} subfamilies)",
            node.family.code,
            node.family.name,
            node.subfamilies.len()
        );
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::ContractFamily;
    use crate::linker::{LinkAnomaly, RoleStats};

    fn stats(linked: usize, already: usize, not_found: usize, no_name: usize, unmatched: &[&str]) -> RoleStats {
        RoleStats {
            linked,
            already_linked: already,
            not_found,
            no_name,
            unmatched: unmatched.iter().map(|s| s.to_string()).collect(),
            ..RoleStats::default()
        }
    }

    #[test]
    fn test_report_with_unmatched_names() {
        let report = LinkReport {
            contractors: stats(3, 1, 2, 0, &["Zeta SA", "Ghost Inc"]),
            clients: stats(0, 0, 0, 4, &[]),
        };

        let text = render_link_report(&report);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[1], "LINKING CONTRACTORS AND CLIENTS TO ORGANIZATIONS");
        assert!(lines.contains(&"CONTRACTORS:"));
        assert!(lines.contains(&"  ✅ Linked: 3"));
        assert!(lines.contains(&"  ⏭️  Already linked: 1"));
        assert!(lines.contains(&"  ❌ Not found: 2"));
        assert!(lines.contains(&"  ⚠️  No name: 4"));
        assert!(lines.contains(&"CONTRACTORS (2):"));
        assert!(!lines.contains(&"CLIENTS (0):"));
        assert!(!text.contains("Failed to save"));

        let ghost = lines.iter().position(|l| *l == "  - Ghost Inc").unwrap();
        let zeta = lines.iter().position(|l| *l == "  - Zeta SA").unwrap();
        assert!(ghost < zeta);

        assert!(text.contains("Next steps:"));
        assert_eq!(lines[lines.len() - 2], "DONE");
    }

    #[test]
    fn test_report_all_linked() {
        let report = LinkReport {
            contractors: stats(2, 0, 0, 0, &[]),
            clients: stats(2, 0, 0, 0, &[]),
        };

        let text = render_link_report(&report);
        assert!(!text.contains("UNMATCHED ORGANIZATIONS"));
        assert!(text.contains("✅ All contractors and clients are linked to an organization."));
        assert!(text.trim_end().ends_with(BANNER));
    }

    #[test]
    fn test_report_lists_failures() {
        let mut contractors = stats(1, 0, 0, 0, &[]);
        contractors.failed = 1;
        contractors.anomalies.push(LinkAnomaly {
            contract_id: 7,
            name: "Acme Corp".to_string(),
            organization_id: 3,
            error: "database is locked".to_string(),
        });

        let report = LinkReport {
            contractors,
            clients: RoleStats::default(),
        };

        let text = render_link_report(&report);
        assert!(text.contains("  💥 Failed to save: 1"));
        assert!(text.contains("  - contract 7 (contractor_name \"Acme Corp\"): database is locked"));
    }

    #[test]
    fn test_family_summary() {
        let rows = vec![
            ContractFamily { id: 1, code: "SER".to_string(), name: "Services".to_string(), parent_id: None },
            ContractFamily { id: 2, code: "SER-NET".to_string(), name: "Cleaning".to_string(), parent_id: Some(1) },
            ContractFamily { id: 3, code: "FOU".to_string(), name: "Supplies".to_string(), parent_id: None },
        ];
        let tree = FamilyTree::from_rows(rows).unwrap();

        let text = render_family_summary(&tree);
        assert!(text.contains("  Families: 2"));
        assert!(text.contains("  Subfamilies: 1"));
        assert!(text.contains("  Total: 3"));

        let fou = text.find("  FOU - Supplies (0 subfamilies)").unwrap();
        let ser = text.find("  SER - Services (1 subfamilies)").unwrap();
        assert!(fou < ser);
    }
}
