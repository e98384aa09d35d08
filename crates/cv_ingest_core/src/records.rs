//! Typed records built from mapped rows, including derived columns.

use serde_json::{Map, Value};

use crate::clean::{date_range, format_month_year};
use crate::column_map::MappedRow;
use crate::model::{
    AppointmentRow, CvDataRecord, DeclarationRecord, GrantRecord, PatentRecord, UserRecord,
};
use crate::report::RowError;

pub const DEFAULT_ROLE: &str = "Faculty";

pub fn user_from_row(row: &MappedRow) -> Result<UserRecord, RowError> {
    let first_name = require_text(row, "first_name")?;
    Ok(UserRecord {
        preferred_name: row
            .owned_text("preferred_name")
            .or_else(|| Some(first_name.clone())),
        first_name,
        last_name: require_text(row, "last_name")?,
        email: require_text(row, "email")?,
        institution_user_id: row.owned_text("institution_user_id"),
        role: row
            .owned_text("role")
            .unwrap_or_else(|| DEFAULT_ROLE.to_string()),
        primary_department: row.owned_text("primary_department"),
        primary_faculty: row.owned_text("primary_faculty"),
        campus: row.owned_text("campus"),
        rank: row.owned_text("rank"),
        job_title: row.owned_text("job_title"),
    })
}

pub fn appointment_from_row(row: &MappedRow) -> Result<AppointmentRow, RowError> {
    let email = row.owned_text("email");
    let institution_user_id = row.owned_text("institution_user_id");
    if email.is_none() && institution_user_id.is_none() {
        return Err(RowError::MissingField {
            line: row.line,
            field: "email",
        });
    }

    let roster_percent = row
        .float("roster_percent")
        .ok_or(RowError::MissingField {
            line: row.line,
            field: "roster_percent",
        })?;

    Ok(AppointmentRow {
        line: row.line,
        email,
        institution_user_id,
        first_name: row.owned_text("first_name"),
        last_name: row.owned_text("last_name"),
        unit: require_text(row, "unit")?,
        department: row.owned_text("department"),
        faculty: row.owned_text("faculty"),
        roster_percent,
        appointment_type: row.owned_text("appointment_type"),
        home_department: row.owned_text("home_department"),
    })
}

pub fn declaration_from_row(row: &MappedRow) -> Result<DeclarationRecord, RowError> {
    let reporting_year = require_year(row, "reporting_year")?;
    Ok(DeclarationRecord {
        email: require_text(row, "email")?,
        reporting_year,
        merit: row.flag("merit").unwrap_or(false),
        promotion: row.flag("promotion").unwrap_or(false),
        honorific: row.owned_text("honorific"),
        other_data: extras_object(row),
    })
}

pub fn grant_from_row(row: &MappedRow) -> Result<GrantRecord, RowError> {
    let year = match row.int("year") {
        Some(year) => year_from_i64(row.line, "year", year)?,
        None => row
            .date("start_date")
            .map(|date| chrono::Datelike::year(&date))
            .ok_or(RowError::MissingField {
                line: row.line,
                field: "year",
            })?,
    };

    let holder_name = match row.owned_text("holder_name") {
        Some(name) => name,
        None => match (row.text("first_name"), row.text("last_name")) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (None, Some(last)) => last.to_string(),
            _ => {
                return Err(RowError::MissingField {
                    line: row.line,
                    field: "holder_name",
                })
            }
        },
    };

    Ok(GrantRecord {
        holder_email: row.owned_text("holder_email"),
        holder_name,
        agency: require_text(row, "agency")?,
        program: row.owned_text("program"),
        title: require_text(row, "title")?,
        amount: row.int("amount"),
        year,
        department: row.owned_text("department"),
    })
}

pub fn patent_from_row(row: &MappedRow) -> Result<PatentRecord, RowError> {
    Ok(PatentRecord {
        inventor_email: row.owned_text("inventor_email"),
        inventor_names: require_text(row, "inventor_names")?,
        title: require_text(row, "title")?,
        patent_number: normalize_patent_number(&require_text(row, "patent_number")?),
        country: row.owned_text("country"),
        issue_date: row.date("issue_date").map(format_month_year),
        status: row.owned_text("status"),
    })
}

pub fn cv_data_from_row(row: &MappedRow) -> Result<CvDataRecord, RowError> {
    let mut data_details = Map::new();
    if let Some(title) = row.text("title") {
        data_details.insert("title".to_string(), Value::from(title));
    }
    if let Some(dates) = date_range(row.date("start_date"), row.date("end_date")) {
        data_details.insert("dates".to_string(), Value::from(dates));
    }
    data_details.extend(extras_object(row));

    Ok(CvDataRecord {
        email: require_text(row, "email")?,
        section_title: require_text(row, "section_title")?,
        data_details,
    })
}

/// Patent numbers are compared without spacing, separators, or case.
pub fn normalize_patent_number(raw: &str) -> String {
    raw.chars()
        .filter(|ch| ch.is_ascii_alphanumeric())
        .map(|ch| ch.to_ascii_uppercase())
        .collect()
}

fn extras_object(row: &MappedRow) -> Map<String, Value> {
    row.extras
        .iter()
        .map(|(header, value)| (header.clone(), Value::from(value.as_str())))
        .collect()
}

fn require_text(row: &MappedRow, field: &'static str) -> Result<String, RowError> {
    row.owned_text(field).ok_or(RowError::MissingField {
        line: row.line,
        field,
    })
}

fn require_year(row: &MappedRow, field: &'static str) -> Result<i32, RowError> {
    let value = row.int(field).ok_or(RowError::MissingField {
        line: row.line,
        field,
    })?;
    year_from_i64(row.line, field, value)
}

fn year_from_i64(line: usize, field: &'static str, value: i64) -> Result<i32, RowError> {
    i32::try_from(value).map_err(|_| RowError::InvalidField {
        line,
        field,
        message: format!("{value} is not a valid year"),
    })
}
