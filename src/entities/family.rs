// 🗂️ Contract Family Entity - Two-level classification
//
//   family (code, name)
//     └── subfamily (code, name, parent)
//
// A subfamily has exactly one parent, and that parent is a family.
// Rows are created once by the seed and are reference data afterwards.

use crate::scoping::{Global, Record};
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractFamily {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub parent_id: Option<i64>,
}

impl ContractFamily {
    pub fn is_subfamily(&self) -> bool {
        self.parent_id.is_some()
    }
}

impl Record for ContractFamily {
    const TABLE: &'static str = "contract_families";
    const COLUMNS: &'static str = "id, code, name, parent_id";
    type Scope = Global;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(ContractFamily {
            id: row.get(0)?,
            code: row.get(1)?,
            name: row.get(2)?,
            parent_id: row.get(3)?,
        })
    }
}

// ============================================================================
// FAMILY TREE
// ============================================================================

#[derive(Debug, Error, PartialEq)]
pub enum FamilyTreeError {
    #[error("subfamily {code} references unknown parent id {parent_id}")]
    UnknownParent { code: String, parent_id: i64 },

    #[error("subfamily {code} has a subfamily ({parent_code}) as parent, only two levels are allowed")]
    TooDeep { code: String, parent_code: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct FamilyNode {
    pub family: ContractFamily,
    pub subfamilies: Vec<ContractFamily>,
}

/// Families ordered by code, each with its subfamilies ordered by code
#[derive(Debug, Clone, Serialize)]
pub struct FamilyTree {
    pub families: Vec<FamilyNode>,
}

impl FamilyTree {
    pub fn from_rows(rows: Vec<ContractFamily>) -> Result<Self, FamilyTreeError> {
        let by_id: HashMap<i64, &ContractFamily> = rows.iter().map(|f| (f.id, f)).collect();

        for row in rows.iter().filter(|r| r.is_subfamily()) {
            let parent_id = row.parent_id.unwrap_or_default();
            match by_id.get(&parent_id) {
                None => {
                    return Err(FamilyTreeError::UnknownParent {
                        code: row.code.clone(),
                        parent_id,
                    })
                }
                Some(parent) if parent.is_subfamily() => {
                    return Err(FamilyTreeError::TooDeep {
                        code: row.code.clone(),
                        parent_code: parent.code.clone(),
                    })
                }
                Some(_) => {}
            }
        }

        let (mut tops, subs): (Vec<ContractFamily>, Vec<ContractFamily>) =
            rows.into_iter().partition(|r| !r.is_subfamily());
        tops.sort_by(|a, b| a.code.cmp(&b.code));

        let mut families: Vec<FamilyNode> = tops
            .into_iter()
            .map(|family| FamilyNode {
                family,
                subfamilies: Vec::new(),
            })
            .collect();

        for sub in subs {
            if let Some(node) = families
                .iter_mut()
                .find(|n| Some(n.family.id) == sub.parent_id)
            {
                node.subfamilies.push(sub);
            }
        }

        for node in &mut families {
            node.subfamilies.sort_by(|a, b| a.code.cmp(&b.code));
        }

        Ok(FamilyTree { families })
    }

    pub fn family_count(&self) -> usize {
        self.families.len()
    }

    pub fn subfamily_count(&self) -> usize {
        self.families.iter().map(|n| n.subfamilies.len()).sum()
    }

    pub fn total(&self) -> usize {
        self.family_count() + self.subfamily_count()
    }

    pub fn find_by_code(&self, code: &str) -> Option<&ContractFamily> {
        self.families.iter().find_map(|n| {
            if n.family.code == code {
                Some(&n.family)
            } else {
                n.subfamilies.iter().find(|s| s.code == code)
            }
        })
    }
}

// ============================================================================
// SEED DATA
// ============================================================================

/// (code, name, subfamilies)
pub type FamilySeed = (&'static str, &'static str, &'static [(&'static str, &'static str)]);

pub const DEFAULT_FAMILIES: &[FamilySeed] = &[
    (
        "FOU",
        "Supplies",
        &[
            ("FOU-BUR", "Office supplies"),
            ("FOU-INF", "IT hardware"),
            ("FOU-MOB", "Furniture"),
            ("FOU-VEH", "Vehicles"),
        ],
    ),
    (
        "MAI",
        "Maintenance",
        &[
            ("MAI-BAT", "Building maintenance"),
            ("MAI-CVC", "Heating and ventilation"),
            ("MAI-ASC", "Elevators"),
        ],
    ),
    (
        "PIN",
        "Intellectual services",
        &[
            ("PIN-AMO", "Project management assistance"),
            ("PIN-ETU", "Studies and audits"),
            ("PIN-JUR", "Legal advice"),
        ],
    ),
    (
        "SER",
        "Services",
        &[
            ("SER-NET", "Cleaning"),
            ("SER-GAR", "Security"),
            ("SER-RES", "Catering"),
            ("SER-TEL", "Telecommunications"),
            ("SER-ASS", "Insurance"),
        ],
    ),
    (
        "TRA",
        "Works",
        &[
            ("TRA-GRO", "Structural works"),
            ("TRA-VRD", "Roads and utilities"),
            ("TRA-SEC", "Finishing works"),
        ],
    ),
];

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: i64, code: &str, parent_id: Option<i64>) -> ContractFamily {
        ContractFamily {
            id,
            code: code.to_string(),
            name: format!("Family {}", code),
            parent_id,
        }
    }

    #[test]
    fn test_tree_groups_and_sorts() {
        let tree = FamilyTree::from_rows(vec![
            row(1, "SER", None),
            row(2, "SER-NET", Some(1)),
            row(3, "FOU", None),
            row(4, "SER-GAR", Some(1)),
        ])
        .unwrap();

        assert_eq!(tree.family_count(), 2);
        assert_eq!(tree.subfamily_count(), 2);
        assert_eq!(tree.total(), 4);
        assert_eq!(tree.families[0].family.code, "FOU");
        assert!(tree.families[0].subfamilies.is_empty());

        let codes: Vec<&str> = tree.families[1].subfamilies.iter().map(|s| s.code.as_str()).collect();
        assert_eq!(codes, vec!["SER-GAR", "SER-NET"]);

        assert_eq!(tree.find_by_code("SER-NET").map(|f| f.id), Some(2));
        assert!(tree.find_by_code("XXX").is_none());
    }

    #[test]
    fn test_tree_rejects_unknown_parent() {
        let err = FamilyTree::from_rows(vec![row(1, "SER", None), row(2, "SER-NET", Some(42))]).unwrap_err();
        assert_eq!(
            err,
            FamilyTreeError::UnknownParent {
                code: "SER-NET".to_string(),
                parent_id: 42
            }
        );
    }

    #[test]
    fn test_tree_rejects_three_levels() {
        let err = FamilyTree::from_rows(vec![
            row(1, "SER", None),
            row(2, "SER-NET", Some(1)),
            row(3, "SER-NET-VIT", Some(2)),
        ])
        .unwrap_err();

        assert!(matches!(err, FamilyTreeError::TooDeep { .. }));
        assert!(err.to_string().contains("only two levels"));
    }

    #[test]
    fn test_default_seed_codes_are_prefixed_by_parent() {
        for (code, _, subs) in DEFAULT_FAMILIES {
            for (sub_code, _) in subs.iter() {
                assert!(sub_code.starts_with(*code), "{} not under {}", sub_code, code);
            }
        }
    }
}
