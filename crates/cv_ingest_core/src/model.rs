use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Upload categories, one per source export family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataCategory {
    Users,
    Affiliations,
    Declarations,
    Grants,
    Patents,
    CvData,
}

impl DataCategory {
    pub const ALL: [DataCategory; 6] = [
        Self::Users,
        Self::Affiliations,
        Self::Declarations,
        Self::Grants,
        Self::Patents,
        Self::CvData,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Affiliations => "affiliations",
            Self::Declarations => "declarations",
            Self::Grants => "grants",
            Self::Patents => "patents",
            Self::CvData => "cv_data",
        }
    }

    /// First path segment of upload keys routed to this category.
    pub fn key_prefix(self) -> &'static str {
        match self {
            Self::Users => "user-data",
            Self::Affiliations => "affiliations",
            Self::Declarations => "declarations",
            Self::Grants => "grants",
            Self::Patents => "patents",
            Self::CvData => "cv-data",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        let first = key.trim_start_matches('/').split('/').next()?;
        Self::ALL
            .into_iter()
            .find(|category| category.key_prefix() == first)
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL.into_iter().find(|category| {
            category.as_str() == normalized || category.key_prefix().replace('-', "_") == normalized
        })
    }
}

impl fmt::Display for DataCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRecord {
    pub first_name: String,
    pub last_name: String,
    pub preferred_name: Option<String>,
    pub email: String,
    pub institution_user_id: Option<String>,
    pub role: String,
    pub primary_department: Option<String>,
    pub primary_faculty: Option<String>,
    pub campus: Option<String>,
    pub rank: Option<String>,
    pub job_title: Option<String>,
}

/// Identity used to group appointment lines for the same person.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserKey {
    Email(String),
    InstitutionId(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppointmentRow {
    pub line: usize,
    pub email: Option<String>,
    pub institution_user_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub unit: String,
    pub department: Option<String>,
    pub faculty: Option<String>,
    pub roster_percent: f64,
    pub appointment_type: Option<String>,
    pub home_department: Option<String>,
}

impl AppointmentRow {
    pub fn user_key(&self) -> Option<UserKey> {
        if let Some(email) = &self.email {
            return Some(UserKey::Email(email.to_ascii_lowercase()));
        }
        self.institution_user_id
            .as_ref()
            .map(|id| UserKey::InstitutionId(id.clone()))
    }

    /// Department name used for precedence matching, falling back to the unit.
    pub fn department_name(&self) -> &str {
        self.department.as_deref().unwrap_or(&self.unit)
    }

    pub fn to_unit(&self) -> Unit {
        Unit {
            unit: self.unit.clone(),
            department: self.department.clone(),
            faculty: self.faculty.clone(),
            roster_percent: self.roster_percent,
            appointment_type: self.appointment_type.clone(),
        }
    }
}

/// Serialized shape of the `primary_unit` / `joint_units` JSON blobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Unit {
    pub unit: String,
    pub department: Option<String>,
    pub faculty: Option<String>,
    pub roster_percent: f64,
    pub appointment_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AffiliationRecord {
    pub email: Option<String>,
    pub institution_user_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub primary_unit: Unit,
    pub joint_units: Vec<Unit>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeclarationRecord {
    pub email: String,
    pub reporting_year: i32,
    pub merit: bool,
    pub promotion: bool,
    pub honorific: Option<String>,
    pub other_data: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GrantRecord {
    pub holder_email: Option<String>,
    pub holder_name: String,
    pub agency: String,
    pub program: Option<String>,
    pub title: String,
    pub amount: Option<i64>,
    pub year: i32,
    pub department: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PatentRecord {
    pub inventor_email: Option<String>,
    pub inventor_names: String,
    pub title: String,
    pub patent_number: String,
    pub country: Option<String>,
    pub issue_date: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CvDataRecord {
    pub email: String,
    pub section_title: String,
    pub data_details: Map<String, Value>,
}

/// Catalog row describing one CV section; read-only for ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataSection {
    pub data_section_id: String,
    pub title: String,
    pub data_type: String,
    pub attributes: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    Skipped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_resolves_from_upload_key() {
        assert_eq!(
            DataCategory::from_key("user-data/2026/hr_feed.csv"),
            Some(DataCategory::Users)
        );
        assert_eq!(
            DataCategory::from_key("/cv-data/courses.csv"),
            Some(DataCategory::CvData)
        );
        assert_eq!(DataCategory::from_key("unknown/file.csv"), None);
    }

    #[test]
    fn category_parses_names_and_prefixes() {
        assert_eq!(DataCategory::parse("cv-data"), Some(DataCategory::CvData));
        assert_eq!(DataCategory::parse("CV_DATA"), Some(DataCategory::CvData));
        assert_eq!(DataCategory::parse("user-data"), Some(DataCategory::Users));
        assert_eq!(DataCategory::parse("grants"), Some(DataCategory::Grants));
        assert_eq!(DataCategory::parse("templates"), None);
    }

    #[test]
    fn appointment_key_prefers_email() {
        let row = AppointmentRow {
            line: 2,
            email: Some("A.Smith@Example.edu".to_string()),
            institution_user_id: Some("1001".to_string()),
            first_name: None,
            last_name: None,
            unit: "MEDI".to_string(),
            department: None,
            faculty: None,
            roster_percent: 100.0,
            appointment_type: None,
            home_department: None,
        };

        assert_eq!(
            row.user_key(),
            Some(UserKey::Email("a.smith@example.edu".to_string()))
        );
        assert_eq!(row.department_name(), "MEDI");
    }
}
