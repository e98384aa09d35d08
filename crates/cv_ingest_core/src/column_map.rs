//! Declarative column remapping.
//!
//! Every upload category is described by a static [`ColumnMap`]: an ordered
//! list of target fields, the header spellings each source system uses for
//! them, and the cleaning transform to apply. Applying a map is a pure
//! function of the row, so re-ingesting the same file always produces the
//! same records.

mod lookups;
mod tables;

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::Serialize;

use crate::clean::{
    clean_email, clean_text, lookup, parse_amount, parse_date, parse_flag, parse_percent,
    parse_year, title_case_name,
};
use crate::model::DataCategory;
use crate::report::RowError;

pub use lookups::{
    AGENCY_NAMES, APPOINTMENT_TYPES, COUNTRY_NAMES, FACULTY_NAMES, PATENT_STATUSES, RANK_NAMES,
    ROLE_NAMES,
};
pub use tables::{AFFILIATIONS, CV_DATA, DECLARATIONS, GRANTS, PATENTS, USERS};

/// One data line keyed by normalized header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub line: usize,
    pub cells: Vec<(String, String)>,
}

impl RawRow {
    pub fn new(line: usize, cells: Vec<(String, String)>) -> Self {
        Self { line, cells }
    }

    pub fn get(&self, header: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(name, _)| name == header)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    Text,
    Name,
    Email,
    Date,
    Year,
    Amount,
    Percent,
    Flag,
    Lookup(&'static [(&'static str, &'static str)]),
}

impl Transform {
    fn apply(self, raw: &str) -> Result<Option<FieldValue>, String> {
        let value = match self {
            Self::Text => clean_text(raw).map(FieldValue::Text),
            Self::Name => title_case_name(raw).map(FieldValue::Text),
            Self::Email => clean_email(raw)?.map(FieldValue::Text),
            Self::Date => Some(FieldValue::Date(parse_date(raw)?)),
            Self::Year => Some(FieldValue::Int(i64::from(parse_year(raw)?))),
            Self::Amount => Some(FieldValue::Int(parse_amount(raw)?)),
            Self::Percent => Some(FieldValue::Float(parse_percent(raw)?)),
            Self::Flag => Some(FieldValue::Bool(parse_flag(raw)?)),
            Self::Lookup(table) => lookup(table, raw).map(FieldValue::Text),
        };
        Ok(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnRule {
    pub target: &'static str,
    pub aliases: &'static [&'static str],
    pub transform: Transform,
    pub required: bool,
}

pub const fn optional(
    target: &'static str,
    aliases: &'static [&'static str],
    transform: Transform,
) -> ColumnRule {
    ColumnRule {
        target,
        aliases,
        transform,
        required: false,
    }
}

pub const fn required(
    target: &'static str,
    aliases: &'static [&'static str],
    transform: Transform,
) -> ColumnRule {
    ColumnRule {
        target,
        aliases,
        transform,
        required: true,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Date(NaiveDate),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl FieldValue {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Text(text) => serde_json::Value::from(text.as_str()),
            Self::Date(date) => serde_json::Value::from(date.format("%Y-%m-%d").to_string()),
            Self::Int(number) => serde_json::Value::from(*number),
            Self::Float(number) => serde_json::Value::from(*number),
            Self::Bool(flag) => serde_json::Value::from(*flag),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MappedRow {
    pub line: usize,
    pub fields: BTreeMap<&'static str, FieldValue>,
    /// Cleaned cells no rule consumed, in source order.
    pub extras: Vec<(String, String)>,
}

impl MappedRow {
    pub fn text(&self, target: &str) -> Option<&str> {
        match self.fields.get(target) {
            Some(FieldValue::Text(text)) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn owned_text(&self, target: &str) -> Option<String> {
        self.text(target).map(str::to_string)
    }

    pub fn date(&self, target: &str) -> Option<NaiveDate> {
        match self.fields.get(target) {
            Some(FieldValue::Date(date)) => Some(*date),
            _ => None,
        }
    }

    pub fn int(&self, target: &str) -> Option<i64> {
        match self.fields.get(target) {
            Some(FieldValue::Int(number)) => Some(*number),
            _ => None,
        }
    }

    pub fn float(&self, target: &str) -> Option<f64> {
        match self.fields.get(target) {
            Some(FieldValue::Float(number)) => Some(*number),
            Some(FieldValue::Int(number)) => Some(*number as f64),
            _ => None,
        }
    }

    pub fn flag(&self, target: &str) -> Option<bool> {
        match self.fields.get(target) {
            Some(FieldValue::Bool(flag)) => Some(*flag),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub category: DataCategory,
    pub rules: &'static [ColumnRule],
}

impl ColumnMap {
    pub fn apply(&self, row: &RawRow) -> Result<MappedRow, RowError> {
        let mut fields = BTreeMap::new();
        let mut consumed: BTreeSet<&str> = BTreeSet::new();

        for rule in self.rules {
            consumed.extend(rule.aliases.iter().copied());
            let raw = rule
                .aliases
                .iter()
                .filter_map(|alias| row.get(alias))
                .find(|value| clean_text(value).is_some());

            let Some(raw) = raw else {
                if rule.required {
                    return Err(RowError::MissingField {
                        line: row.line,
                        field: rule.target,
                    });
                }
                continue;
            };

            let value = rule
                .transform
                .apply(raw)
                .map_err(|message| RowError::InvalidField {
                    line: row.line,
                    field: rule.target,
                    message,
                })?;
            if let Some(value) = value {
                fields.insert(rule.target, value);
            } else if rule.required {
                return Err(RowError::MissingField {
                    line: row.line,
                    field: rule.target,
                });
            }
        }

        let extras = row
            .cells
            .iter()
            .filter(|(header, _)| !header.is_empty() && !consumed.contains(header.as_str()))
            .filter_map(|(header, value)| clean_text(value).map(|text| (header.clone(), text)))
            .collect();

        Ok(MappedRow {
            line: row.line,
            fields,
            extras,
        })
    }

    /// Required targets for which none of the aliases appear in `headers`.
    pub fn missing_required_columns(&self, headers: &[String]) -> Vec<String> {
        self.rules
            .iter()
            .filter(|rule| rule.required)
            .filter(|rule| {
                !rule
                    .aliases
                    .iter()
                    .any(|alias| headers.iter().any(|header| header == alias))
            })
            .map(|rule| rule.target.to_string())
            .collect()
    }
}

pub fn column_map_for(category: DataCategory) -> &'static ColumnMap {
    match category {
        DataCategory::Users => &USERS,
        DataCategory::Affiliations => &AFFILIATIONS,
        DataCategory::Declarations => &DECLARATIONS,
        DataCategory::Grants => &GRANTS,
        DataCategory::Patents => &PATENTS,
        DataCategory::CvData => &CV_DATA,
    }
}
