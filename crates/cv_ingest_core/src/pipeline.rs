//! Load → clean → upsert for one uploaded object.
//!
//! Rows are handled one at a time, each written with its own statement.
//! A bad row is recorded and skipped. A record store outage stops the
//! upload; the report keeps the counts written so far and is marked aborted.

use thiserror::Error;

use crate::affiliation::{group_appointments, resolve_primary};
use crate::clean::normalize_header;
use crate::column_map::{column_map_for, ColumnMap, RawRow};
use crate::model::{
    AffiliationRecord, CvDataRecord, DataCategory, DataSection, DeclarationRecord, GrantRecord,
    PatentRecord, UpsertOutcome, UserKey, UserRecord,
};
use crate::records::{
    appointment_from_row, cv_data_from_row, declaration_from_row, grant_from_row,
    patent_from_row, user_from_row,
};
use crate::report::{IngestError, IngestionReport, RowError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    /// The store refused this record; later records may still succeed.
    #[error("{0}")]
    Rejected(String),
    /// The store cannot be reached; the upload is aborted.
    #[error("{0}")]
    Unavailable(String),
}

/// Relational writes needed by ingestion.
///
/// Implementations resolve users by email (or institution id for
/// affiliations) and reject records for unknown users with
/// [`SinkError::Rejected`].
pub trait RecordSink {
    fn upsert_user(&self, user: &UserRecord) -> Result<UpsertOutcome, SinkError>;

    /// Stored home department of the user identified by `key`, if any.
    fn primary_department(&self, key: &UserKey) -> Result<Option<String>, SinkError>;

    fn upsert_affiliation(
        &self,
        affiliation: &AffiliationRecord,
    ) -> Result<UpsertOutcome, SinkError>;

    fn declaration_exists(&self, email: &str, reporting_year: i32) -> Result<bool, SinkError>;

    fn insert_declaration(&self, declaration: &DeclarationRecord) -> Result<(), SinkError>;

    fn grant_exists(&self, grant: &GrantRecord) -> Result<bool, SinkError>;

    fn insert_grant(&self, grant: &GrantRecord) -> Result<(), SinkError>;

    fn patent_exists(&self, patent_number: &str) -> Result<bool, SinkError>;

    fn insert_patent(&self, patent: &PatentRecord) -> Result<(), SinkError>;

    fn find_data_section(&self, title: &str) -> Result<Option<DataSection>, SinkError>;

    fn upsert_cv_data(
        &self,
        section: &DataSection,
        record: &CvDataRecord,
    ) -> Result<UpsertOutcome, SinkError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUpload {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

pub fn parse_csv(body: &[u8]) -> Result<ParsedUpload, IngestError> {
    let body = body.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(body);
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .from_reader(body);

    let headers: Vec<String> = reader
        .byte_headers()
        .map_err(|error| IngestError::Csv(error.to_string()))?
        .iter()
        .map(|field| normalize_header(&String::from_utf8_lossy(field)))
        .collect();
    if headers.iter().all(String::is_empty) {
        return Err(IngestError::EmptyInput);
    }

    let mut rows = Vec::new();
    for (index, record) in reader.byte_records().enumerate() {
        let record = record.map_err(|error| IngestError::Csv(error.to_string()))?;
        let line = record
            .position()
            .map(|position| position.line() as usize)
            .unwrap_or(index + 2);
        let cells: Vec<(String, String)> = headers
            .iter()
            .zip(record.iter())
            .map(|(header, field)| (header.clone(), String::from_utf8_lossy(field).into_owned()))
            .collect();
        if cells.iter().all(|(_, value)| value.trim().is_empty()) {
            continue;
        }
        rows.push(RawRow::new(line, cells));
    }

    Ok(ParsedUpload { headers, rows })
}

pub fn ingest(
    category: DataCategory,
    source_key: &str,
    body: &[u8],
    sink: &dyn RecordSink,
) -> Result<IngestionReport, IngestError> {
    let span = tracing::info_span!("ingest", category = %category, source_key);
    let _entered = span.enter();

    let mut report = IngestionReport::new(category, source_key, body);
    let upload = parse_csv(body)?;
    let map = column_map_for(category);

    let missing = map.missing_required_columns(&upload.headers);
    if !missing.is_empty() {
        return Err(IngestError::MissingColumns(missing));
    }

    report.rows_read = upload.rows.len();
    tracing::info!(event = "ingest_started", rows = report.rows_read);

    let outcome = if category == DataCategory::Affiliations {
        ingest_affiliations(map, &upload.rows, sink, &mut report)
    } else {
        ingest_rows(category, map, &upload.rows, sink, &mut report)
    };
    if let Err(message) = outcome {
        report.abort(message);
        return Ok(report);
    }

    tracing::info!(
        event = "ingest_completed",
        inserted = report.inserted,
        updated = report.updated,
        skipped = report.skipped,
        failed = report.failed,
    );
    Ok(report)
}

/// Writes rows until the store becomes unavailable; the outage message is
/// returned so the caller can close the report.
fn ingest_rows(
    category: DataCategory,
    map: &ColumnMap,
    rows: &[RawRow],
    sink: &dyn RecordSink,
    report: &mut IngestionReport,
) -> Result<(), String> {
    for row in rows {
        match write_row(category, map, row, sink) {
            Ok(outcome) => report.record_outcome(outcome),
            Err(RowFailure::Row(error)) => report.record_error(&error),
            Err(RowFailure::Fatal(message)) => return Err(message),
        }
    }
    Ok(())
}

enum RowFailure {
    Row(RowError),
    Fatal(String),
}

impl From<RowError> for RowFailure {
    fn from(error: RowError) -> Self {
        Self::Row(error)
    }
}

fn sink_failure(line: usize) -> impl Fn(SinkError) -> RowFailure {
    move |error| match error {
        SinkError::Rejected(message) => RowFailure::Row(RowError::rejected(line, message)),
        SinkError::Unavailable(message) => RowFailure::Fatal(message),
    }
}

fn write_row(
    category: DataCategory,
    map: &ColumnMap,
    row: &RawRow,
    sink: &dyn RecordSink,
) -> Result<UpsertOutcome, RowFailure> {
    let mapped = map.apply(row)?;
    let failure = sink_failure(row.line);

    match category {
        DataCategory::Users => {
            let user = user_from_row(&mapped)?;
            sink.upsert_user(&user).map_err(failure)
        }
        DataCategory::Declarations => {
            let declaration = declaration_from_row(&mapped)?;
            if sink
                .declaration_exists(&declaration.email, declaration.reporting_year)
                .map_err(&failure)?
            {
                return Ok(UpsertOutcome::Skipped);
            }
            sink.insert_declaration(&declaration).map_err(failure)?;
            Ok(UpsertOutcome::Inserted)
        }
        DataCategory::Grants => {
            let grant = grant_from_row(&mapped)?;
            if sink.grant_exists(&grant).map_err(&failure)? {
                return Ok(UpsertOutcome::Skipped);
            }
            sink.insert_grant(&grant).map_err(failure)?;
            Ok(UpsertOutcome::Inserted)
        }
        DataCategory::Patents => {
            let patent = patent_from_row(&mapped)?;
            if sink.patent_exists(&patent.patent_number).map_err(&failure)? {
                return Ok(UpsertOutcome::Skipped);
            }
            sink.insert_patent(&patent).map_err(failure)?;
            Ok(UpsertOutcome::Inserted)
        }
        DataCategory::CvData => {
            let record = cv_data_from_row(&mapped)?;
            let Some(section) = sink
                .find_data_section(&record.section_title)
                .map_err(&failure)?
            else {
                return Err(RowFailure::Row(RowError::rejected(
                    row.line,
                    format!("unknown data section '{}'", record.section_title),
                )));
            };
            sink.upsert_cv_data(&section, &record).map_err(failure)
        }
        DataCategory::Affiliations => Err(RowFailure::Row(RowError::rejected(
            row.line,
            "affiliations are resolved per person, not per row",
        ))),
    }
}

fn ingest_affiliations(
    map: &ColumnMap,
    rows: &[RawRow],
    sink: &dyn RecordSink,
    report: &mut IngestionReport,
) -> Result<(), String> {
    let mut appointments = Vec::with_capacity(rows.len());
    for row in rows {
        match map.apply(row).and_then(|mapped| appointment_from_row(&mapped)) {
            Ok(appointment) => appointments.push(appointment),
            Err(error) => report.record_error(&error),
        }
    }

    for (key, group) in group_appointments(appointments) {
        let line = group.first().map(|appointment| appointment.line).unwrap_or(0);

        let home_department = match sink.primary_department(&key) {
            Ok(department) => department,
            Err(SinkError::Rejected(_)) => None,
            Err(SinkError::Unavailable(message)) => return Err(message),
        };

        let record = match resolve_primary(home_department.as_deref(), &group) {
            Ok(record) => record,
            Err(error) => {
                report.record_error(&RowError::rejected(line, error.to_string()));
                continue;
            }
        };

        match sink.upsert_affiliation(&record) {
            Ok(outcome) => report.record_outcome(outcome),
            Err(SinkError::Rejected(message)) => {
                report.record_error(&RowError::rejected(line, message))
            }
            Err(SinkError::Unavailable(message)) => return Err(message),
        }
    }

    Ok(())
}
