//! In-process [`RecordSink`] used for dry runs and tests.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use serde_json::{Map, Value};

use crate::model::{
    AffiliationRecord, CvDataRecord, DataSection, DeclarationRecord, GrantRecord, PatentRecord,
    UpsertOutcome, UserKey, UserRecord,
};
use crate::pipeline::{RecordSink, SinkError};

#[derive(Debug, Default, Clone)]
pub struct MemoryState {
    pub users: BTreeMap<String, UserRecord>,
    pub affiliations: BTreeMap<String, AffiliationRecord>,
    pub declarations: Vec<DeclarationRecord>,
    pub grants: Vec<GrantRecord>,
    pub patents: Vec<PatentRecord>,
    pub data_sections: Vec<DataSection>,
    pub cv_data: Vec<(String, String, Map<String, Value>)>,
}

/// Mirrors the PostgreSQL sink: users keyed by email, existence checks
/// before insert, records for unknown users rejected.
#[derive(Debug, Default)]
pub struct MemoryRecordSink {
    state: Mutex<MemoryState>,
    outage: Mutex<Option<Outage>>,
}

#[derive(Debug)]
struct Outage {
    calls_before_failure: usize,
    message: String,
}

impl MemoryRecordSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sections(sections: Vec<DataSection>) -> Self {
        let sink = Self::default();
        sink.lock().data_sections = sections;
        sink
    }

    pub fn seed_user(&self, user: UserRecord) {
        self.lock().users.insert(user.email.clone(), user);
    }

    /// Makes every later call fail with [`SinkError::Unavailable`].
    pub fn fail_with(&self, message: impl Into<String>) {
        self.fail_after(0, message);
    }

    /// Lets `calls` more calls succeed, then fails every later call with
    /// [`SinkError::Unavailable`].
    pub fn fail_after(&self, calls: usize, message: impl Into<String>) {
        *self
            .outage
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(Outage {
            calls_before_failure: calls,
            message: message.into(),
        });
    }

    pub fn snapshot(&self) -> MemoryState {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn available(&self) -> Result<MutexGuard<'_, MemoryState>, SinkError> {
        let mut outage = self
            .outage
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(outage) = outage.as_mut() {
            if outage.calls_before_failure == 0 {
                return Err(SinkError::Unavailable(outage.message.clone()));
            }
            outage.calls_before_failure -= 1;
        }
        Ok(self.lock())
    }
}

fn unknown_user(email: &str) -> SinkError {
    SinkError::Rejected(format!("no user with email '{email}'"))
}

fn same_grant(left: &GrantRecord, right: &GrantRecord) -> bool {
    left.holder_name.eq_ignore_ascii_case(&right.holder_name)
        && left.agency.eq_ignore_ascii_case(&right.agency)
        && left.title.eq_ignore_ascii_case(&right.title)
        && left.year == right.year
}

impl RecordSink for MemoryRecordSink {
    fn upsert_user(&self, user: &UserRecord) -> Result<UpsertOutcome, SinkError> {
        let mut state = self.available()?;
        let Some(existing) = state.users.get_mut(&user.email) else {
            state.users.insert(user.email.clone(), user.clone());
            return Ok(UpsertOutcome::Inserted);
        };

        // The stored role wins; blank feed columns keep stored values.
        existing.first_name = user.first_name.clone();
        existing.last_name = user.last_name.clone();
        for (stored, incoming) in [
            (&mut existing.institution_user_id, &user.institution_user_id),
            (&mut existing.preferred_name, &user.preferred_name),
            (&mut existing.primary_department, &user.primary_department),
            (&mut existing.primary_faculty, &user.primary_faculty),
            (&mut existing.campus, &user.campus),
            (&mut existing.rank, &user.rank),
            (&mut existing.job_title, &user.job_title),
        ] {
            if incoming.is_some() {
                stored.clone_from(incoming);
            }
        }
        Ok(UpsertOutcome::Updated)
    }

    fn primary_department(&self, key: &UserKey) -> Result<Option<String>, SinkError> {
        let state = self.available()?;
        let user = match key {
            UserKey::Email(email) => state.users.get(email),
            UserKey::InstitutionId(id) => state
                .users
                .values()
                .find(|user| user.institution_user_id.as_deref() == Some(id.as_str())),
        };
        Ok(user.and_then(|user| user.primary_department.clone()))
    }

    fn upsert_affiliation(
        &self,
        affiliation: &AffiliationRecord,
    ) -> Result<UpsertOutcome, SinkError> {
        let mut state = self.available()?;
        let user_email = match (&affiliation.email, &affiliation.institution_user_id) {
            (Some(email), _) if state.users.contains_key(email) => email.clone(),
            (_, Some(id)) => state
                .users
                .values()
                .find(|user| user.institution_user_id.as_deref() == Some(id.as_str()))
                .map(|user| user.email.clone())
                .ok_or_else(|| {
                    SinkError::Rejected(format!("no user with institution id '{id}'"))
                })?,
            (Some(email), None) => return Err(unknown_user(email)),
            (None, None) => {
                return Err(SinkError::Rejected(
                    "affiliation has no user identity".to_string(),
                ))
            }
        };

        let outcome = if state.affiliations.contains_key(&user_email) {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Inserted
        };
        state.affiliations.insert(user_email, affiliation.clone());
        Ok(outcome)
    }

    fn declaration_exists(&self, email: &str, reporting_year: i32) -> Result<bool, SinkError> {
        let state = self.available()?;
        Ok(state
            .declarations
            .iter()
            .any(|existing| existing.email == email && existing.reporting_year == reporting_year))
    }

    fn insert_declaration(&self, declaration: &DeclarationRecord) -> Result<(), SinkError> {
        let mut state = self.available()?;
        if !state.users.contains_key(&declaration.email) {
            return Err(unknown_user(&declaration.email));
        }
        state.declarations.push(declaration.clone());
        Ok(())
    }

    fn grant_exists(&self, grant: &GrantRecord) -> Result<bool, SinkError> {
        let state = self.available()?;
        Ok(state.grants.iter().any(|existing| same_grant(existing, grant)))
    }

    fn insert_grant(&self, grant: &GrantRecord) -> Result<(), SinkError> {
        self.available()?.grants.push(grant.clone());
        Ok(())
    }

    fn patent_exists(&self, patent_number: &str) -> Result<bool, SinkError> {
        let state = self.available()?;
        Ok(state
            .patents
            .iter()
            .any(|existing| existing.patent_number == patent_number))
    }

    fn insert_patent(&self, patent: &PatentRecord) -> Result<(), SinkError> {
        self.available()?.patents.push(patent.clone());
        Ok(())
    }

    fn find_data_section(&self, title: &str) -> Result<Option<DataSection>, SinkError> {
        let state = self.available()?;
        Ok(state
            .data_sections
            .iter()
            .find(|section| section.title.eq_ignore_ascii_case(title.trim()))
            .cloned())
    }

    fn upsert_cv_data(
        &self,
        section: &DataSection,
        record: &CvDataRecord,
    ) -> Result<UpsertOutcome, SinkError> {
        let mut state = self.available()?;
        if !state.users.contains_key(&record.email) {
            return Err(unknown_user(&record.email));
        }
        let duplicate = state.cv_data.iter().any(|(email, section_id, details)| {
            email == &record.email
                && section_id == &section.data_section_id
                && details == &record.data_details
        });
        if duplicate {
            return Ok(UpsertOutcome::Skipped);
        }
        state.cv_data.push((
            record.email.clone(),
            section.data_section_id.clone(),
            record.data_details.clone(),
        ));
        Ok(UpsertOutcome::Inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: &str, department: Option<&str>) -> UserRecord {
        UserRecord {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            preferred_name: None,
            email: "ada@example.edu".to_string(),
            institution_user_id: None,
            role: role.to_string(),
            primary_department: department.map(str::to_string),
            primary_faculty: None,
            campus: None,
            rank: None,
            job_title: None,
        }
    }

    #[test]
    fn feed_update_keeps_role_and_stored_values() {
        let sink = MemoryRecordSink::new();
        sink.seed_user(user("Admin", Some("Mathematics")));

        let outcome = sink
            .upsert_user(&user("Faculty", None))
            .expect("upsert should succeed");

        assert_eq!(outcome, UpsertOutcome::Updated);
        let stored = sink.snapshot().users["ada@example.edu"].clone();
        assert_eq!(stored.role, "Admin");
        assert_eq!(stored.primary_department.as_deref(), Some("Mathematics"));
    }

    #[test]
    fn department_lookup_accepts_email_or_institution_id() {
        let sink = MemoryRecordSink::new();
        let mut stored = user("Faculty", Some("Computer Science"));
        stored.institution_user_id = Some("1001".to_string());
        sink.seed_user(stored);

        for key in [
            UserKey::Email("ada@example.edu".to_string()),
            UserKey::InstitutionId("1001".to_string()),
        ] {
            assert_eq!(
                sink.primary_department(&key),
                Ok(Some("Computer Science".to_string()))
            );
        }
        assert_eq!(
            sink.primary_department(&UserKey::InstitutionId("9999".to_string())),
            Ok(None)
        );
    }

    #[test]
    fn outage_starts_after_the_allowed_calls() {
        let sink = MemoryRecordSink::new();
        sink.fail_after(1, "connection reset");

        assert_eq!(sink.patent_exists("US1234567"), Ok(false));
        assert!(matches!(
            sink.patent_exists("US1234567"),
            Err(SinkError::Unavailable(_))
        ));
    }

    #[test]
    fn outage_fails_every_call() {
        let sink = MemoryRecordSink::new();
        sink.fail_with("connection refused");

        assert_eq!(
            sink.patent_exists("US1234567"),
            Err(SinkError::Unavailable("connection refused".to_string()))
        );
    }
}
