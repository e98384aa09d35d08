//! Primary vs joint appointment precedence.
//!
//! An affiliation export lists every appointment a faculty member holds. The
//! platform stores one affiliation per person: the appointment with the
//! largest roster percentage is the primary unit and the rest are joint
//! units. Equal percentages are broken by matching the department against
//! the person's home department, then by source order.

use std::collections::HashMap;

use thiserror::Error;

use crate::model::{AffiliationRecord, AppointmentRow, Unit, UserKey};

const PERCENT_EPSILON: f64 = 1e-9;
const DEPARTMENT_PREFIXES: [&str; 5] = [
    "department of ",
    "dept. of ",
    "dept of ",
    "dept. ",
    "dept ",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AffiliationError {
    #[error("no appointments to resolve")]
    NoAppointments,
}

/// Groups appointment lines per person, preserving first-seen order.
pub fn group_appointments(rows: Vec<AppointmentRow>) -> Vec<(UserKey, Vec<AppointmentRow>)> {
    let mut groups: Vec<(UserKey, Vec<AppointmentRow>)> = Vec::new();
    let mut index_by_key: HashMap<UserKey, usize> = HashMap::new();

    for row in rows {
        let Some(key) = row.user_key() else {
            continue;
        };
        match index_by_key.get(&key) {
            Some(&index) => groups[index].1.push(row),
            None => {
                index_by_key.insert(key.clone(), groups.len());
                groups.push((key, vec![row]));
            }
        }
    }

    groups
}

pub fn resolve_primary(
    home_department: Option<&str>,
    appointments: &[AppointmentRow],
) -> Result<AffiliationRecord, AffiliationError> {
    let merged = merge_duplicate_units(appointments);
    if merged.is_empty() {
        return Err(AffiliationError::NoAppointments);
    }

    let max_percent = merged
        .iter()
        .map(|appointment| appointment.roster_percent)
        .fold(f64::MIN, f64::max);
    let candidates: Vec<usize> = merged
        .iter()
        .enumerate()
        .filter(|(_, appointment)| (appointment.roster_percent - max_percent).abs() < PERCENT_EPSILON)
        .map(|(index, _)| index)
        .collect();

    let home = home_department
        .map(str::to_string)
        .or_else(|| {
            appointments
                .iter()
                .find_map(|appointment| appointment.home_department.clone())
        })
        .map(|name| normalize_department(&name));

    let primary_index = match (candidates.as_slice(), home) {
        ([only], _) => *only,
        (_, Some(home)) => candidates
            .iter()
            .copied()
            .find(|&index| matches_home(&merged[index], &home))
            .unwrap_or(candidates[0]),
        (_, None) => candidates[0],
    };

    let mut joint: Vec<&AppointmentRow> = merged
        .iter()
        .enumerate()
        .filter(|(index, _)| *index != primary_index)
        .map(|(_, appointment)| appointment)
        .collect();
    // Stable sort keeps source order among equal percentages.
    joint.sort_by(|left, right| right.roster_percent.total_cmp(&left.roster_percent));

    Ok(AffiliationRecord {
        email: appointments.iter().find_map(|a| a.email.clone()),
        institution_user_id: appointments
            .iter()
            .find_map(|a| a.institution_user_id.clone()),
        first_name: appointments.iter().find_map(|a| a.first_name.clone()),
        last_name: appointments.iter().find_map(|a| a.last_name.clone()),
        primary_unit: merged[primary_index].to_unit(),
        joint_units: joint.into_iter().map(AppointmentRow::to_unit).collect::<Vec<Unit>>(),
    })
}

/// Lowercased department name without "Department of" style prefixes.
pub fn normalize_department(name: &str) -> String {
    let lowered = name.to_lowercase().replace('&', " and ");
    let collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
    DEPARTMENT_PREFIXES
        .iter()
        .find_map(|prefix| collapsed.strip_prefix(prefix))
        .unwrap_or(&collapsed)
        .trim()
        .to_string()
}

fn matches_home(appointment: &AppointmentRow, home: &str) -> bool {
    normalize_department(appointment.department_name()) == home
        || normalize_department(&appointment.unit) == home
}

/// Folds repeated lines for the same unit into one, summing percentages.
fn merge_duplicate_units(appointments: &[AppointmentRow]) -> Vec<AppointmentRow> {
    let mut merged: Vec<AppointmentRow> = Vec::with_capacity(appointments.len());
    for appointment in appointments {
        let existing = merged.iter_mut().find(|candidate| {
            candidate.unit.eq_ignore_ascii_case(&appointment.unit)
                && normalize_department(candidate.department_name())
                    == normalize_department(appointment.department_name())
        });
        match existing {
            Some(candidate) => {
                candidate.roster_percent =
                    (candidate.roster_percent + appointment.roster_percent).min(100.0);
                if candidate.appointment_type.is_none() {
                    candidate.appointment_type = appointment.appointment_type.clone();
                }
            }
            None => merged.push(appointment.clone()),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn appointment(line: usize, unit: &str, department: &str, percent: f64) -> AppointmentRow {
        AppointmentRow {
            line,
            email: Some("ada@example.edu".to_string()),
            institution_user_id: None,
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            unit: unit.to_string(),
            department: Some(department.to_string()),
            faculty: None,
            roster_percent: percent,
            appointment_type: None,
            home_department: None,
        }
    }

    #[test]
    fn highest_roster_percentage_is_primary() {
        let record = resolve_primary(
            None,
            &[
                appointment(2, "MATH", "Mathematics", 40.0),
                appointment(3, "CPSC", "Computer Science", 60.0),
            ],
        )
        .expect("should resolve");

        assert_eq!(record.primary_unit.unit, "CPSC");
        assert_eq!(record.joint_units.len(), 1);
        assert_eq!(record.joint_units[0].unit, "MATH");
    }

    #[test]
    fn tie_is_broken_by_home_department_match() {
        let record = resolve_primary(
            Some("Dept. of Computer Science"),
            &[
                appointment(2, "MATH", "Mathematics", 50.0),
                appointment(3, "CPSC", "Department of Computer Science", 50.0),
            ],
        )
        .expect("should resolve");

        assert_eq!(record.primary_unit.unit, "CPSC");
    }

    #[test]
    fn home_department_column_is_used_without_explicit_home() {
        let mut first = appointment(2, "ECON", "Economics", 50.0);
        let mut second = appointment(3, "POLI", "Political Science", 50.0);
        first.home_department = None;
        second.home_department = Some("Political Science".to_string());

        let record = resolve_primary(None, &[first, second]).expect("should resolve");
        assert_eq!(record.primary_unit.unit, "POLI");
    }

    #[test]
    fn unresolved_tie_falls_back_to_source_order() {
        let record = resolve_primary(
            Some("History"),
            &[
                appointment(2, "ECON", "Economics", 50.0),
                appointment(3, "POLI", "Political Science", 50.0),
            ],
        )
        .expect("should resolve");

        assert_eq!(record.primary_unit.unit, "ECON");
        assert_eq!(record.joint_units[0].unit, "POLI");
    }

    #[test]
    fn ampersand_and_word_and_match() {
        assert_eq!(
            normalize_department("Department of  Earth & Ocean Sciences"),
            normalize_department("earth and ocean sciences")
        );
    }

    #[test]
    fn duplicate_units_merge_before_selection() {
        let record = resolve_primary(
            None,
            &[
                appointment(2, "CHEM", "Chemistry", 30.0),
                appointment(3, "PHYS", "Physics", 40.0),
                appointment(4, "CHEM", "Chemistry", 30.0),
            ],
        )
        .expect("should resolve");

        assert_eq!(record.primary_unit.unit, "CHEM");
        assert_eq!(record.primary_unit.roster_percent, 60.0);
        assert_eq!(record.joint_units.len(), 1);
    }

    #[test]
    fn joint_units_are_ordered_by_percentage_then_source_order() {
        let record = resolve_primary(
            None,
            &[
                appointment(2, "A", "Alpha", 10.0),
                appointment(3, "B", "Beta", 60.0),
                appointment(4, "C", "Gamma", 20.0),
                appointment(5, "D", "Delta", 10.0),
            ],
        )
        .expect("should resolve");

        let joint: Vec<&str> = record
            .joint_units
            .iter()
            .map(|unit| unit.unit.as_str())
            .collect();
        assert_eq!(joint, vec!["C", "A", "D"]);
    }

    #[test]
    fn empty_input_is_an_error() {
        assert_eq!(
            resolve_primary(None, &[]),
            Err(AffiliationError::NoAppointments)
        );
    }

    #[test]
    fn groups_by_email_in_first_seen_order() {
        let mut other = appointment(3, "PHYS", "Physics", 100.0);
        other.email = Some("grace@example.edu".to_string());
        let groups = group_appointments(vec![
            appointment(2, "MATH", "Mathematics", 50.0),
            other,
            appointment(4, "CPSC", "Computer Science", 50.0),
        ]);

        assert_eq!(groups.len(), 2);
        assert_eq!(
            groups[0].0,
            UserKey::Email("ada@example.edu".to_string())
        );
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[1].1[0].unit, "PHYS");
    }
}
