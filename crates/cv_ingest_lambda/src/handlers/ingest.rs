use std::time::Instant;

use cv_ingest_core::model::DataCategory;
use cv_ingest_core::object_keys::{archive_object_key, report_object_key};
use cv_ingest_core::pipeline::{ingest, RecordSink};
use cv_ingest_core::report::{HandlerResponse, IngestError, IngestionReport};
use serde_json::Value;

use crate::adapters::object_store::ObjectStore;

pub const ARCHIVE_STATUS_PROCESSED: &str = "processed";
pub const ARCHIVE_STATUS_FAILED: &str = "failed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerConfig {
    /// Bucket receiving reports and archived uploads. `None` writes next to
    /// the upload in its own bucket.
    pub report_bucket: Option<String>,
    pub report_prefix: String,
    pub archive_uploads: bool,
    pub run_date: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3ObjectRef {
    pub bucket: String,
    pub key: String,
}

impl S3ObjectRef {
    fn uri(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }
}

pub fn decode_s3_records(event: &Value) -> Result<Vec<S3ObjectRef>, String> {
    if let Some(records) = event.get("Records") {
        let records = records
            .as_array()
            .ok_or_else(|| "Records must be an array".to_string())?;
        if records.is_empty() {
            return Err("event contains no records".to_string());
        }
        return records
            .iter()
            .enumerate()
            .map(|(index, record)| {
                let bucket = record
                    .pointer("/s3/bucket/name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| format!("record {index} is missing s3.bucket.name"))?;
                let key = record
                    .pointer("/s3/object/key")
                    .and_then(Value::as_str)
                    .ok_or_else(|| format!("record {index} is missing s3.object.key"))?;
                Ok(S3ObjectRef {
                    bucket: bucket.to_string(),
                    key: url_decode_key(key),
                })
            })
            .collect();
    }

    let bucket = event.get("bucket").and_then(Value::as_str);
    let key = event.get("key").and_then(Value::as_str);
    match (bucket, key) {
        (Some(bucket), Some(key)) if !bucket.is_empty() && !key.is_empty() => {
            Ok(vec![S3ObjectRef {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }])
        }
        _ => Err("event must be an S3 notification or an object with bucket and key".to_string()),
    }
}

/// S3 notifications form-encode object keys: `+` is a space and other
/// reserved bytes arrive as `%XX`.
pub fn url_decode_key(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        match bytes[index] {
            b'+' => decoded.push(b' '),
            b'%' if index + 2 < bytes.len() => {
                match (hex_value(bytes[index + 1]), hex_value(bytes[index + 2])) {
                    (Some(high), Some(low)) => {
                        decoded.push(high << 4 | low);
                        index += 2;
                    }
                    _ => decoded.push(b'%'),
                }
            }
            byte => decoded.push(byte),
        }
        index += 1;
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Runs one upload through the pipeline and stores its report.
///
/// Returns the report whenever rows were attempted, including uploads
/// aborted by a record store outage. An upload rejected before any row is
/// returned as a message prefixed with the object URI. Report and archive
/// writes that fail are logged and never change the outcome.
pub fn ingest_object(
    object: &S3ObjectRef,
    category: DataCategory,
    body: &[u8],
    config: &HandlerConfig,
    object_store: &impl ObjectStore,
    sink: &dyn RecordSink,
) -> Result<IngestionReport, String> {
    let started_at = Instant::now();
    let output_bucket = config.report_bucket.as_deref().unwrap_or(&object.bucket);
    let outcome = ingest(category, &object.key, body, sink);

    let status = match &outcome {
        Ok(report) if report.aborted.is_none() => ARCHIVE_STATUS_PROCESSED,
        _ => ARCHIVE_STATUS_FAILED,
    };
    if config.archive_uploads {
        let archive_key = archive_object_key(
            &config.report_prefix,
            category,
            &config.run_date,
            status,
            &object.key,
        );
        if let Err(error) = object_store.put_object(output_bucket, &archive_key, body) {
            tracing::error!(
                event = "archive_write_failed",
                source = %object.uri(),
                archive_key = %archive_key,
                error = %error,
            );
        }
    }

    match outcome {
        Ok(report) => {
            write_report(&report, object, output_bucket, config, object_store);
            tracing::info!(
                event = "object_ingested",
                source = %object.uri(),
                category = %category,
                written = report.written(),
                skipped = report.skipped,
                failed = report.failed,
                aborted = report.aborted.is_some(),
                duration_ms = started_at.elapsed().as_millis() as u64,
            );
            Ok(report)
        }
        Err(error) => {
            tracing::error!(
                event = "object_failed",
                source = %object.uri(),
                category = %category,
                error = %error,
                duration_ms = started_at.elapsed().as_millis() as u64,
            );
            Err(format!("{}: {error}", object.uri()))
        }
    }
}

fn write_report(
    report: &IngestionReport,
    object: &S3ObjectRef,
    output_bucket: &str,
    config: &HandlerConfig,
    object_store: &impl ObjectStore,
) {
    let report_key = report_object_key(
        &config.report_prefix,
        report.category,
        &config.run_date,
        &object.key,
    );
    let written = serde_json::to_vec_pretty(report)
        .map_err(|error| format!("failed to serialize report: {error}"))
        .and_then(|body| object_store.put_object(output_bucket, &report_key, &body));
    if let Err(error) = written {
        tracing::error!(
            event = "report_write_failed",
            source = %object.uri(),
            report_key = %report_key,
            error = %error,
        );
    }
}

/// Entry point for S3-triggered invocations. Always returns a response;
/// every failure is folded into it.
pub fn handle_ingest_event(
    event: &Value,
    config: &HandlerConfig,
    object_store: &impl ObjectStore,
    sink: &dyn RecordSink,
) -> HandlerResponse {
    let objects = match decode_s3_records(event) {
        Ok(objects) => objects,
        Err(error) => {
            tracing::error!(event = "invalid_event", error = %error);
            return HandlerResponse::failed(error);
        }
    };

    let mut reports = Vec::with_capacity(objects.len());
    let mut fatal_errors = Vec::new();
    for object in &objects {
        let Some(category) = DataCategory::from_key(&object.key) else {
            let error = IngestError::UnknownCategory(object.key.clone());
            tracing::error!(event = "unknown_category", source = %object.uri());
            fatal_errors.push(format!("{}: {error}", object.uri()));
            continue;
        };

        let body = match object_store.get_object(&object.bucket, &object.key) {
            Ok(body) => body,
            Err(error) => {
                tracing::error!(event = "object_read_failed", source = %object.uri(), error = %error);
                fatal_errors.push(format!("{}: {error}", object.uri()));
                continue;
            }
        };

        match ingest_object(object, category, &body, config, object_store, sink) {
            Ok(report) => reports.push(report),
            Err(error) => fatal_errors.push(error),
        }
    }

    let response = HandlerResponse::from_outcomes(reports, fatal_errors);
    tracing::info!(
        event = "invocation_completed",
        objects = objects.len(),
        status = %response.status,
        status_code = response.status_code,
    );
    response
}
