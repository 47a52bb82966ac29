//! Drift detection between two loaded datasets.
//!
//! # Invariants
//! - Systems are matched by id first, then by name among the rest.
//! - Only identity and position are compared (`name`, `x`, `y`, `z`, plus
//!   `id` for name matches); descriptive fields are not drift.
//! - Comparison is pure: running it twice on unchanged input yields equal
//!   reports.

use crate::model::arena::{EntityArena, SystemIndex};
use crate::model::system::System;
use std::collections::HashSet;
use std::fmt::Write as _;

/// Maximum names kept per only-in list.
pub const DIFF_LIST_LIMIT: usize = 20;

const COORDINATE_EPSILON: f64 = 1e-9;

/// Compared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffField {
    Id,
    Name,
    X,
    Y,
    Z,
}

impl DiffField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::X => "x",
            Self::Y => "y",
            Self::Z => "z",
        }
    }
}

/// One field that disagrees between matched systems.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDifference {
    /// Flat-side name of the system.
    pub system: String,
    pub field: DiffField,
    pub flat_value: String,
    pub relational_value: String,
}

/// Result of comparing the two stores.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    pub flat_count: usize,
    pub relational_count: usize,
    /// First [`DIFF_LIST_LIMIT`] names present only in the flat file.
    pub only_in_flat: Vec<String>,
    pub only_in_flat_total: usize,
    /// First [`DIFF_LIST_LIMIT`] names present only in the database.
    pub only_in_relational: Vec<String>,
    pub only_in_relational_total: usize,
    pub differences: Vec<FieldDifference>,
}

impl SyncReport {
    pub fn in_sync(&self) -> bool {
        self.flat_count == self.relational_count
            && self.only_in_flat_total == 0
            && self.only_in_relational_total == 0
            && self.differences.is_empty()
    }

    /// Renders the report as human-readable text.
    pub fn report(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Sync check");
        let _ = writeln!(out, "  flat file systems:  {}", self.flat_count);
        let _ = writeln!(out, "  database systems:   {}", self.relational_count);
        let _ = writeln!(
            out,
            "  status:             {}",
            if self.in_sync() { "IN SYNC" } else { "OUT OF SYNC" }
        );

        write_name_list(
            &mut out,
            "only in flat file",
            &self.only_in_flat,
            self.only_in_flat_total,
        );
        write_name_list(
            &mut out,
            "only in database",
            &self.only_in_relational,
            self.only_in_relational_total,
        );

        if !self.differences.is_empty() {
            let _ = writeln!(out, "\nfield differences ({}):", self.differences.len());
            for diff in self.differences.iter().take(DIFF_LIST_LIMIT) {
                let _ = writeln!(
                    out,
                    "  - {} [{}]: flat={} database={}",
                    diff.system,
                    diff.field.as_str(),
                    diff.flat_value,
                    diff.relational_value
                );
            }
            if self.differences.len() > DIFF_LIST_LIMIT {
                let _ = writeln!(
                    out,
                    "  ... and {} more",
                    self.differences.len() - DIFF_LIST_LIMIT
                );
            }
        }
        out
    }
}

fn write_name_list(out: &mut String, title: &str, names: &[String], total: usize) {
    if total == 0 {
        return;
    }
    let _ = writeln!(out, "\n{title} ({total}):");
    for name in names {
        let _ = writeln!(out, "  - {name}");
    }
    if total > names.len() {
        let _ = writeln!(out, "  ... and {} more", total - names.len());
    }
}

/// Compares two arenas and reports drift.
pub fn compare(flat: &EntityArena, relational: &EntityArena) -> SyncReport {
    let mut report = SyncReport {
        flat_count: flat.len(),
        relational_count: relational.len(),
        ..SyncReport::default()
    };

    let mut claimed: HashSet<SystemIndex> = HashSet::new();
    let mut unmatched = Vec::new();

    for flat_index in flat.indices_by_name() {
        let flat_system = flat.system(flat_index);
        let by_id = flat_system
            .id
            .as_deref()
            .and_then(|id| relational.find_by_id(id))
            .filter(|index| !claimed.contains(index));
        match by_id {
            Some(rel_index) => {
                claimed.insert(rel_index);
                diff_pair(flat_system, relational.system(rel_index), false, &mut report);
            }
            None => unmatched.push(flat_index),
        }
    }

    for flat_index in unmatched {
        let flat_system = flat.system(flat_index);
        let by_name = relational
            .find_by_name(&flat_system.name)
            .filter(|index| !claimed.contains(index));
        match by_name {
            Some(rel_index) => {
                claimed.insert(rel_index);
                diff_pair(flat_system, relational.system(rel_index), true, &mut report);
            }
            None => {
                report.only_in_flat_total += 1;
                if report.only_in_flat.len() < DIFF_LIST_LIMIT {
                    report.only_in_flat.push(flat_system.name.clone());
                }
            }
        }
    }
    report.only_in_flat.sort();

    for rel_index in relational.indices_by_name() {
        if claimed.contains(&rel_index) {
            continue;
        }
        report.only_in_relational_total += 1;
        if report.only_in_relational.len() < DIFF_LIST_LIMIT {
            report
                .only_in_relational
                .push(relational.system(rel_index).name.clone());
        }
    }

    report
}

fn diff_pair(flat: &System, relational: &System, matched_by_name: bool, report: &mut SyncReport) {
    let mut push = |field: DiffField, flat_value: String, relational_value: String| {
        report.differences.push(FieldDifference {
            system: flat.name.clone(),
            field,
            flat_value,
            relational_value,
        });
    };

    if matched_by_name {
        if let (Some(flat_id), Some(rel_id)) = (&flat.id, &relational.id) {
            if flat_id != rel_id {
                push(DiffField::Id, flat_id.clone(), rel_id.clone());
            }
        }
    } else if flat.name != relational.name {
        push(DiffField::Name, flat.name.clone(), relational.name.clone());
    }

    for (field, flat_value, rel_value) in [
        (DiffField::X, flat.x, relational.x),
        (DiffField::Y, flat.y, relational.y),
        (DiffField::Z, flat.z, relational.z),
    ] {
        if (flat_value - rel_value).abs() > COORDINATE_EPSILON {
            push(field, flat_value.to_string(), rel_value.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{compare, DiffField, DIFF_LIST_LIMIT};
    use crate::model::arena::EntityArena;
    use crate::model::system::System;

    fn system(id: &str, name: &str, x: f64) -> System {
        let mut system = System::new(name, "Euclid", x, 0.0, 0.0);
        system.id = Some(id.to_string());
        system
    }

    #[test]
    fn identical_sets_are_in_sync() {
        let systems = vec![system("a", "Alpha", 1.0), system("b", "Beta", 2.0)];
        let (flat, _) = EntityArena::from_systems(systems.clone());
        let (relational, _) = EntityArena::from_systems(systems);

        let report = compare(&flat, &relational);
        assert!(report.in_sync());
        assert_eq!(report, compare(&flat, &relational));
    }

    #[test]
    fn id_match_reports_rename_and_moved_coordinates() {
        let (flat, _) = EntityArena::from_systems([system("a", "Alpha", 1.0)]);
        let (relational, _) = EntityArena::from_systems([system("a", "Alpha Prime", 3.0)]);

        let report = compare(&flat, &relational);
        let fields: Vec<DiffField> = report.differences.iter().map(|d| d.field).collect();
        assert_eq!(fields, vec![DiffField::Name, DiffField::X]);
        assert_eq!(report.only_in_flat_total, 0);
        assert!(!report.in_sync());
    }

    #[test]
    fn name_match_with_different_ids_reports_id() {
        let (flat, _) = EntityArena::from_systems([system("a", "Alpha", 1.0)]);
        let (relational, _) = EntityArena::from_systems([system("z", "Alpha", 1.0)]);

        let report = compare(&flat, &relational);
        assert_eq!(report.differences.len(), 1);
        assert_eq!(report.differences[0].field, DiffField::Id);
    }

    #[test]
    fn only_in_lists_are_truncated_but_totals_are_not() {
        let systems = (0..30).map(|n| system(&format!("id-{n}"), &format!("Sys {n:02}"), 0.0));
        let (flat, _) = EntityArena::from_systems(systems);
        let relational = EntityArena::new();

        let report = compare(&flat, &relational);
        assert_eq!(report.only_in_flat.len(), DIFF_LIST_LIMIT);
        assert_eq!(report.only_in_flat_total, 30);
        assert!(report.report().contains("... and 10 more"));
    }
}
