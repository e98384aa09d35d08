use crate::model::DataCategory;

pub const DEFAULT_REPORT_PREFIX: &str = "ingestion";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetKind {
    IngestionReports,
    ArchivedUploads,
}

impl DatasetKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::IngestionReports => "ingestion_reports",
            Self::ArchivedUploads => "archived_uploads",
        }
    }
}

pub fn partition_prefix(
    base_prefix: &str,
    dataset: DatasetKind,
    category: DataCategory,
    run_date: &str,
) -> String {
    let trimmed = base_prefix.trim_matches('/');
    format!(
        "{trimmed}/dataset={}/category={}/run_date={run_date}",
        dataset.as_str(),
        category.as_str(),
    )
}

pub fn report_object_key(
    base_prefix: &str,
    category: DataCategory,
    run_date: &str,
    source_key: &str,
) -> String {
    format!(
        "{}/{}.json",
        partition_prefix(base_prefix, DatasetKind::IngestionReports, category, run_date),
        file_stem(source_key),
    )
}

pub fn archive_object_key(
    base_prefix: &str,
    category: DataCategory,
    run_date: &str,
    status: &str,
    source_key: &str,
) -> String {
    format!(
        "{}/status={status}/{}",
        partition_prefix(base_prefix, DatasetKind::ArchivedUploads, category, run_date),
        file_name(source_key),
    )
}

fn file_name(source_key: &str) -> &str {
    source_key
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or("upload")
}

fn file_stem(source_key: &str) -> &str {
    let name = file_name(source_key);
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}
