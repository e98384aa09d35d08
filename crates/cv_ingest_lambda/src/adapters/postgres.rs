//! PostgreSQL-backed [`RecordSink`].
//!
//! Statements are runtime-checked (`sqlx::query`, not `sqlx::query!`) so the
//! crate builds without a database. The schema is owned elsewhere; the sink
//! assumes these tables:
//!
//! - `users(user_id uuid, email unique, institution_user_id, first_name,
//!   last_name, preferred_name, role, primary_department, primary_faculty,
//!   campus, rank, job_title)`
//! - `affiliations(user_id unique, first_name, last_name, primary_unit jsonb,
//!   joint_units jsonb)`
//! - `declarations(user_id, reporting_year, merit, promotion, honorific,
//!   other_data jsonb)`
//! - `grants(holder_email, holder_name, agency, program, title, amount, year,
//!   department)`
//! - `patents(inventor_email, inventor_names, title, patent_number, country,
//!   issue_date, status)`
//! - `data_sections(data_section_id uuid, title, data_type, attributes jsonb,
//!   archive)`
//! - `user_cv_data(user_id, data_section_id, data_details jsonb, editable)`

use cv_ingest_core::model::{
    AffiliationRecord, CvDataRecord, DataSection, DeclarationRecord, GrantRecord, PatentRecord,
    UpsertOutcome, UserKey, UserRecord,
};
use cv_ingest_core::pipeline::{RecordSink, SinkError};
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::Row;
use uuid::Uuid;

pub struct PgRecordSink {
    pool: PgPool,
}

impl PgRecordSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connections are opened on first use, so a cold start never blocks on
    /// the database.
    pub fn connect_lazy(database_url: &str, max_connections: u32) -> Result<Self, String> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_lazy(database_url)
            .map(Self::new)
            .map_err(|error| format!("invalid database url: {error}"))
    }

    async fn user_id_by_email(&self, email: &str) -> Result<Option<Uuid>, sqlx::Error> {
        sqlx::query_scalar::<_, Uuid>("SELECT user_id FROM users WHERE lower(email) = lower($1)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
    }

    async fn user_id_for_affiliation(
        &self,
        affiliation: &AffiliationRecord,
    ) -> Result<Option<Uuid>, sqlx::Error> {
        if let Some(email) = &affiliation.email {
            if let Some(user_id) = self.user_id_by_email(email).await? {
                return Ok(Some(user_id));
            }
        }
        match &affiliation.institution_user_id {
            Some(id) => {
                sqlx::query_scalar::<_, Uuid>(
                    "SELECT user_id FROM users WHERE institution_user_id = $1",
                )
                .bind(id)
                .fetch_optional(&self.pool)
                .await
            }
            None => Ok(None),
        }
    }
}

// A NULL archive flag counts as not archived.
const FIND_DATA_SECTION_SQL: &str = r#"
    SELECT data_section_id::text AS data_section_id, title, data_type, attributes
    FROM data_sections
    WHERE lower(title) = lower($1) AND COALESCE(archive, false) = false
    LIMIT 1
"#;

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}

fn classify(error: sqlx::Error) -> SinkError {
    match error {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Protocol(_)
        | sqlx::Error::WorkerCrashed => {
            SinkError::Unavailable(format!("database unavailable: {error}"))
        }
        other => SinkError::Rejected(format!("database rejected record: {other}")),
    }
}

fn unknown_user(email: &str) -> SinkError {
    SinkError::Rejected(format!("no user with email '{email}'"))
}

fn outcome_from_insert_flag(inserted: bool) -> UpsertOutcome {
    if inserted {
        UpsertOutcome::Inserted
    } else {
        UpsertOutcome::Updated
    }
}

impl RecordSink for PgRecordSink {
    fn upsert_user(&self, user: &UserRecord) -> Result<UpsertOutcome, SinkError> {
        block_on(async {
            // `xmax = 0` only holds for a freshly inserted tuple. The role
            // column is never overwritten by a feed.
            let row = sqlx::query(
                r#"
                INSERT INTO users (
                    user_id, email, institution_user_id, first_name, last_name,
                    preferred_name, role, primary_department, primary_faculty,
                    campus, rank, job_title
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                ON CONFLICT (email) DO UPDATE SET
                    institution_user_id = COALESCE(EXCLUDED.institution_user_id, users.institution_user_id),
                    first_name = EXCLUDED.first_name,
                    last_name = EXCLUDED.last_name,
                    preferred_name = COALESCE(EXCLUDED.preferred_name, users.preferred_name),
                    primary_department = COALESCE(EXCLUDED.primary_department, users.primary_department),
                    primary_faculty = COALESCE(EXCLUDED.primary_faculty, users.primary_faculty),
                    campus = COALESCE(EXCLUDED.campus, users.campus),
                    rank = COALESCE(EXCLUDED.rank, users.rank),
                    job_title = COALESCE(EXCLUDED.job_title, users.job_title)
                RETURNING (xmax = 0) AS inserted
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(&user.email)
            .bind(&user.institution_user_id)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(&user.preferred_name)
            .bind(&user.role)
            .bind(&user.primary_department)
            .bind(&user.primary_faculty)
            .bind(&user.campus)
            .bind(&user.rank)
            .bind(&user.job_title)
            .fetch_one(&self.pool)
            .await
            .map_err(classify)?;

            let inserted: bool = row.try_get("inserted").map_err(classify)?;
            Ok(outcome_from_insert_flag(inserted))
        })
    }

    fn primary_department(&self, key: &UserKey) -> Result<Option<String>, SinkError> {
        let (statement, value) = match key {
            UserKey::Email(email) => (
                "SELECT primary_department FROM users WHERE lower(email) = lower($1)",
                email,
            ),
            UserKey::InstitutionId(id) => (
                "SELECT primary_department FROM users WHERE institution_user_id = $1",
                id,
            ),
        };
        block_on(async {
            sqlx::query_scalar::<_, Option<String>>(statement)
                .bind(value)
                .fetch_optional(&self.pool)
                .await
                .map(Option::flatten)
                .map_err(classify)
        })
    }

    fn upsert_affiliation(
        &self,
        affiliation: &AffiliationRecord,
    ) -> Result<UpsertOutcome, SinkError> {
        block_on(async {
            let user_id = self
                .user_id_for_affiliation(affiliation)
                .await
                .map_err(classify)?
                .ok_or_else(|| match (&affiliation.email, &affiliation.institution_user_id) {
                    (_, Some(id)) => {
                        SinkError::Rejected(format!("no user with institution id '{id}'"))
                    }
                    (Some(email), None) => unknown_user(email),
                    (None, None) => {
                        SinkError::Rejected("affiliation has no user identity".to_string())
                    }
                })?;

            let row = sqlx::query(
                r#"
                INSERT INTO affiliations (user_id, first_name, last_name, primary_unit, joint_units)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (user_id) DO UPDATE SET
                    first_name = COALESCE(EXCLUDED.first_name, affiliations.first_name),
                    last_name = COALESCE(EXCLUDED.last_name, affiliations.last_name),
                    primary_unit = EXCLUDED.primary_unit,
                    joint_units = EXCLUDED.joint_units
                RETURNING (xmax = 0) AS inserted
                "#,
            )
            .bind(user_id)
            .bind(&affiliation.first_name)
            .bind(&affiliation.last_name)
            .bind(Json(&affiliation.primary_unit))
            .bind(Json(&affiliation.joint_units))
            .fetch_one(&self.pool)
            .await
            .map_err(classify)?;

            let inserted: bool = row.try_get("inserted").map_err(classify)?;
            Ok(outcome_from_insert_flag(inserted))
        })
    }

    fn declaration_exists(&self, email: &str, reporting_year: i32) -> Result<bool, SinkError> {
        block_on(async {
            sqlx::query_scalar::<_, bool>(
                r#"
                SELECT EXISTS (
                    SELECT 1
                    FROM declarations d
                    JOIN users u ON u.user_id = d.user_id
                    WHERE lower(u.email) = lower($1) AND d.reporting_year = $2
                )
                "#,
            )
            .bind(email)
            .bind(reporting_year)
            .fetch_one(&self.pool)
            .await
            .map_err(classify)
        })
    }

    fn insert_declaration(&self, declaration: &DeclarationRecord) -> Result<(), SinkError> {
        block_on(async {
            let user_id = self
                .user_id_by_email(&declaration.email)
                .await
                .map_err(classify)?
                .ok_or_else(|| unknown_user(&declaration.email))?;

            sqlx::query(
                r#"
                INSERT INTO declarations (user_id, reporting_year, merit, promotion, honorific, other_data)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(user_id)
            .bind(declaration.reporting_year)
            .bind(declaration.merit)
            .bind(declaration.promotion)
            .bind(&declaration.honorific)
            .bind(Json(&declaration.other_data))
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(classify)
        })
    }

    fn grant_exists(&self, grant: &GrantRecord) -> Result<bool, SinkError> {
        block_on(async {
            sqlx::query_scalar::<_, bool>(
                r#"
                SELECT EXISTS (
                    SELECT 1 FROM grants
                    WHERE lower(holder_name) = lower($1)
                      AND lower(agency) = lower($2)
                      AND lower(title) = lower($3)
                      AND year = $4
                )
                "#,
            )
            .bind(&grant.holder_name)
            .bind(&grant.agency)
            .bind(&grant.title)
            .bind(grant.year)
            .fetch_one(&self.pool)
            .await
            .map_err(classify)
        })
    }

    fn insert_grant(&self, grant: &GrantRecord) -> Result<(), SinkError> {
        block_on(async {
            sqlx::query(
                r#"
                INSERT INTO grants (holder_email, holder_name, agency, program, title, amount, year, department)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(&grant.holder_email)
            .bind(&grant.holder_name)
            .bind(&grant.agency)
            .bind(&grant.program)
            .bind(&grant.title)
            .bind(grant.amount)
            .bind(grant.year)
            .bind(&grant.department)
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(classify)
        })
    }

    fn patent_exists(&self, patent_number: &str) -> Result<bool, SinkError> {
        block_on(async {
            sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (SELECT 1 FROM patents WHERE patent_number = $1)",
            )
            .bind(patent_number)
            .fetch_one(&self.pool)
            .await
            .map_err(classify)
        })
    }

    fn insert_patent(&self, patent: &PatentRecord) -> Result<(), SinkError> {
        block_on(async {
            sqlx::query(
                r#"
                INSERT INTO patents (inventor_email, inventor_names, title, patent_number, country, issue_date, status)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(&patent.inventor_email)
            .bind(&patent.inventor_names)
            .bind(&patent.title)
            .bind(&patent.patent_number)
            .bind(&patent.country)
            .bind(&patent.issue_date)
            .bind(&patent.status)
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(classify)
        })
    }

    fn find_data_section(&self, title: &str) -> Result<Option<DataSection>, SinkError> {
        block_on(async {
            let row = sqlx::query(FIND_DATA_SECTION_SQL)
                .bind(title.trim())
                .fetch_optional(&self.pool)
                .await
                .map_err(classify)?;

            row.map(|row| -> Result<DataSection, sqlx::Error> {
                Ok(DataSection {
                    data_section_id: row.try_get("data_section_id")?,
                    title: row.try_get("title")?,
                    data_type: row.try_get("data_type")?,
                    attributes: row
                        .try_get::<Option<Json<Value>>, _>("attributes")?
                        .map(|Json(attributes)| attributes)
                        .unwrap_or(Value::Null),
                })
            })
            .transpose()
            .map_err(classify)
        })
    }

    fn upsert_cv_data(
        &self,
        section: &DataSection,
        record: &CvDataRecord,
    ) -> Result<UpsertOutcome, SinkError> {
        block_on(async {
            let user_id = self
                .user_id_by_email(&record.email)
                .await
                .map_err(classify)?
                .ok_or_else(|| unknown_user(&record.email))?;

            // Re-running an upload must not duplicate identical entries.
            let result = sqlx::query(
                r#"
                INSERT INTO user_cv_data (user_id, data_section_id, data_details, editable)
                SELECT $1, $2::uuid, $3, false
                WHERE NOT EXISTS (
                    SELECT 1 FROM user_cv_data
                    WHERE user_id = $1
                      AND data_section_id = $2::uuid
                      AND data_details = $3
                )
                "#,
            )
            .bind(user_id)
            .bind(&section.data_section_id)
            .bind(Json(&record.data_details))
            .execute(&self.pool)
            .await
            .map_err(classify)?;

            Ok(if result.rows_affected() == 0 {
                UpsertOutcome::Skipped
            } else {
                UpsertOutcome::Inserted
            })
        })
    }
}
