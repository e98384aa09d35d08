use super::lookups::{
    AGENCY_NAMES, APPOINTMENT_TYPES, COUNTRY_NAMES, FACULTY_NAMES, PATENT_STATUSES, RANK_NAMES,
    ROLE_NAMES,
};
use super::{optional, required, ColumnMap, Transform};
use crate::model::DataCategory;

const EMAIL_ALIASES: &[&str] = &[
    "email",
    "email_address",
    "institution_email",
    "work_email",
    "faculty_email",
];

const INSTITUTION_ID_ALIASES: &[&str] = &[
    "institution_user_id",
    "employee_id",
    "emplid",
    "person_id",
    "staff_id",
];

/// HR feed export.
pub static USERS: ColumnMap = ColumnMap {
    category: DataCategory::Users,
    rules: &[
        required(
            "first_name",
            &["first_name", "given_name", "fname", "legal_first_name"],
            Transform::Name,
        ),
        required(
            "last_name",
            &["last_name", "surname", "family_name", "lname", "legal_last_name"],
            Transform::Name,
        ),
        optional(
            "preferred_name",
            &["preferred_name", "preferred_first_name", "known_as"],
            Transform::Name,
        ),
        required("email", EMAIL_ALIASES, Transform::Email),
        optional("institution_user_id", INSTITUTION_ID_ALIASES, Transform::Text),
        optional(
            "role",
            &["role", "user_role", "employee_class"],
            Transform::Lookup(ROLE_NAMES),
        ),
        optional(
            "primary_department",
            &["primary_department", "department", "dept", "home_department"],
            Transform::Text,
        ),
        optional(
            "primary_faculty",
            &["primary_faculty", "faculty", "faculty_code"],
            Transform::Lookup(FACULTY_NAMES),
        ),
        optional("campus", &["campus", "location"], Transform::Text),
        optional(
            "rank",
            &["rank", "academic_rank", "rank_code"],
            Transform::Lookup(RANK_NAMES),
        ),
        optional(
            "job_title",
            &["job_title", "position_title", "title"],
            Transform::Text,
        ),
    ],
};

/// Academic affiliation system export: one line per appointment.
pub static AFFILIATIONS: ColumnMap = ColumnMap {
    category: DataCategory::Affiliations,
    rules: &[
        optional("email", EMAIL_ALIASES, Transform::Email),
        optional("institution_user_id", INSTITUTION_ID_ALIASES, Transform::Text),
        optional("first_name", &["first_name", "given_name"], Transform::Name),
        optional("last_name", &["last_name", "surname"], Transform::Name),
        required(
            "unit",
            &["unit", "unit_code", "org_unit", "position_unit"],
            Transform::Text,
        ),
        optional(
            "department",
            &["department", "department_name", "unit_name"],
            Transform::Text,
        ),
        optional(
            "faculty",
            &["faculty", "faculty_code"],
            Transform::Lookup(FACULTY_NAMES),
        ),
        required(
            "roster_percent",
            &[
                "roster_percent",
                "roster_percentage",
                "appointment_percent",
                "fte",
                "percent",
            ],
            Transform::Percent,
        ),
        optional(
            "appointment_type",
            &["appointment_type", "appt_type"],
            Transform::Lookup(APPOINTMENT_TYPES),
        ),
        optional(
            "home_department",
            &["home_department", "primary_department"],
            Transform::Text,
        ),
    ],
};

/// Annual merit/promotion declarations.
pub static DECLARATIONS: ColumnMap = ColumnMap {
    category: DataCategory::Declarations,
    rules: &[
        required("email", EMAIL_ALIASES, Transform::Email),
        required(
            "reporting_year",
            &["reporting_year", "year", "declaration_year"],
            Transform::Year,
        ),
        optional(
            "merit",
            &["merit", "merit_review", "coi_merit"],
            Transform::Flag,
        ),
        optional(
            "promotion",
            &["promotion", "promotion_review", "coi_promotion"],
            Transform::Flag,
        ),
        optional("honorific", &["honorific", "honorific_title"], Transform::Text),
    ],
};

/// Grant agency award exports.
pub static GRANTS: ColumnMap = ColumnMap {
    category: DataCategory::Grants,
    rules: &[
        optional(
            "holder_email",
            &["holder_email", "pi_email", "email"],
            Transform::Email,
        ),
        optional(
            "holder_name",
            &["holder_name", "holder", "principal_investigator", "pi_name"],
            Transform::Name,
        ),
        optional(
            "first_name",
            &["pi_first_name", "first_name"],
            Transform::Name,
        ),
        optional("last_name", &["pi_last_name", "last_name"], Transform::Name),
        required(
            "agency",
            &["agency", "funding_agency", "funder", "sponsor"],
            Transform::Lookup(AGENCY_NAMES),
        ),
        optional(
            "program",
            &["program", "program_name", "competition"],
            Transform::Text,
        ),
        required(
            "title",
            &["title", "project_title", "grant_title", "application_title"],
            Transform::Text,
        ),
        optional(
            "amount",
            &["amount", "award_amount", "amount_awarded", "total_amount"],
            Transform::Amount,
        ),
        optional(
            "year",
            &["year", "fiscal_year", "competition_year"],
            Transform::Year,
        ),
        optional(
            "start_date",
            &["start_date", "award_date"],
            Transform::Date,
        ),
        optional("department", &["department", "dept"], Transform::Text),
    ],
};

/// Technology-transfer patent exports.
pub static PATENTS: ColumnMap = ColumnMap {
    category: DataCategory::Patents,
    rules: &[
        optional(
            "inventor_email",
            &["inventor_email", "email"],
            Transform::Email,
        ),
        required(
            "inventor_names",
            &["inventor_names", "inventors", "inventor"],
            Transform::Text,
        ),
        required("title", &["title", "patent_title"], Transform::Text),
        required(
            "patent_number",
            &[
                "patent_number",
                "patent_no",
                "publication_number",
                "number",
            ],
            Transform::Text,
        ),
        optional(
            "country",
            &["country", "jurisdiction"],
            Transform::Lookup(COUNTRY_NAMES),
        ),
        optional(
            "issue_date",
            &["issue_date", "date_issued", "grant_date"],
            Transform::Date,
        ),
        optional(
            "status",
            &["status", "patent_status"],
            Transform::Lookup(PATENT_STATUSES),
        ),
    ],
};

/// Legacy CV database rows; unmapped columns become section attributes.
pub static CV_DATA: ColumnMap = ColumnMap {
    category: DataCategory::CvData,
    rules: &[
        required("email", EMAIL_ALIASES, Transform::Email),
        required(
            "section_title",
            &["section_title", "section", "data_section"],
            Transform::Text,
        ),
        optional("title", &["title", "name", "course_title"], Transform::Text),
        optional("start_date", &["start_date", "from", "start"], Transform::Date),
        optional("end_date", &["end_date", "to", "end"], Transform::Date),
    ],
};
