use cv_ingest_core::memory_sink::MemoryRecordSink;
use cv_ingest_core::model::{DataCategory, DataSection, UserRecord};
use cv_ingest_core::pipeline::ingest;
use cv_ingest_core::report::{IngestError, MAX_REPORTED_ERRORS};

fn user(email: &str, department: Option<&str>) -> UserRecord {
    UserRecord {
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        preferred_name: None,
        email: email.to_string(),
        institution_user_id: Some(format!("id-{email}")),
        role: "Faculty".to_string(),
        primary_department: department.map(str::to_string),
        primary_faculty: None,
        campus: None,
        rank: None,
        job_title: None,
    }
}

fn courses_section() -> DataSection {
    DataSection {
        data_section_id: "section-courses".to_string(),
        title: "Courses Taught".to_string(),
        data_type: "Teaching".to_string(),
        attributes: serde_json::json!({"title": "", "dates": ""}),
    }
}

#[test]
fn hr_feed_inserts_then_updates_users() {
    let sink = MemoryRecordSink::new();
    let csv = b"Employee ID,First Name,Last Name,Email,Faculty,Rank\n\
                1001,ADA,LOVELACE,Ada@Example.edu,SCI,PROF\n\
                1002,Grace,Hopper,grace@example.edu,APSC,ASSOC PROF\n";

    let first = ingest(DataCategory::Users, "user-data/hr.csv", csv, &sink).expect("ingest ok");
    let second = ingest(DataCategory::Users, "user-data/hr.csv", csv, &sink).expect("ingest ok");

    assert_eq!(first.inserted, 2);
    assert_eq!(second.updated, 2);
    let state = sink.snapshot();
    let ada = state.users.get("ada@example.edu").expect("ada stored");
    assert_eq!(ada.first_name, "Ada");
    assert_eq!(ada.rank.as_deref(), Some("Professor"));
    assert_eq!(ada.institution_user_id.as_deref(), Some("1001"));
}

#[test]
fn row_errors_are_collected_without_stopping_the_upload() {
    let sink = MemoryRecordSink::new();
    let csv = b"first_name,last_name,email\n\
                Ada,Lovelace,ada@example.edu\n\
                Grace,Hopper,not-an-email\n\
                Alan,Turing,\n";

    let report = ingest(DataCategory::Users, "user-data/hr.csv", csv, &sink).expect("ingest ok");

    assert_eq!(report.rows_read, 3);
    assert_eq!(report.inserted, 1);
    assert_eq!(report.failed, 2);
    assert!(report.errors[0].starts_with("row 3: invalid email"));
    assert_eq!(report.errors[1], "row 4: missing required column 'email'");
}

#[test]
fn error_messages_are_capped_but_failures_counted() {
    let sink = MemoryRecordSink::new();
    let mut csv = String::from("first_name,last_name,email\n");
    for index in 0..25 {
        csv.push_str(&format!("Name{index},Last,broken{index}\n"));
    }

    let report = ingest(DataCategory::Users, "user-data/bad.csv", csv.as_bytes(), &sink)
        .expect("ingest ok");

    assert_eq!(report.failed, 25);
    assert_eq!(report.errors.len(), MAX_REPORTED_ERRORS);
}

#[test]
fn missing_required_header_fails_the_upload() {
    let sink = MemoryRecordSink::new();
    let error = ingest(
        DataCategory::Grants,
        "grants/nserc.csv",
        b"holder,title\nAda,Engines\n",
        &sink,
    )
    .expect_err("agency column is required");

    assert_eq!(error, IngestError::MissingColumns(vec!["agency".to_string()]));
}

#[test]
fn existing_declaration_for_user_and_year_is_skipped() {
    let sink = MemoryRecordSink::new();
    sink.seed_user(user("ada@example.edu", None));
    let csv = b"email,year,merit,promotion\n\
                ada@example.edu,2025,Y,N\n\
                ada@example.edu,2025,N,N\n\
                ada@example.edu,2024,N,Y\n\
                unknown@example.edu,2025,Y,Y\n";

    let report =
        ingest(DataCategory::Declarations, "declarations/2025.csv", csv, &sink).expect("ingest ok");

    assert_eq!(report.inserted, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(
        report.errors,
        vec!["row 5: no user with email 'unknown@example.edu'".to_string()]
    );
}

#[test]
fn affiliations_resolve_one_primary_per_person() {
    let sink = MemoryRecordSink::new();
    sink.seed_user(user("ada@example.edu", Some("Computer Science")));
    sink.seed_user(user("grace@example.edu", None));
    let csv = b"email,unit,department,roster_percent,appointment_type\n\
                ada@example.edu,MATH,Mathematics,50,J\n\
                grace@example.edu,APSC,Engineering,1.00,P\n\
                ada@example.edu,CPSC,Department of Computer Science,50,J\n";

    let report =
        ingest(DataCategory::Affiliations, "affiliations/roster.csv", csv, &sink).expect("ok");

    assert_eq!(report.rows_read, 3);
    assert_eq!(report.inserted, 2);
    let state = sink.snapshot();
    let ada = state.affiliations.get("ada@example.edu").expect("ada resolved");
    assert_eq!(ada.primary_unit.unit, "CPSC");
    assert_eq!(ada.joint_units[0].unit, "MATH");
    assert_eq!(ada.joint_units[0].appointment_type.as_deref(), Some("Joint"));
    let grace = state.affiliations.get("grace@example.edu").expect("grace resolved");
    assert_eq!(grace.primary_unit.roster_percent, 100.0);
}

#[test]
fn affiliation_for_unknown_user_is_a_row_error() {
    let sink = MemoryRecordSink::new();
    let csv = b"email,unit,roster_percent\nghost@example.edu,MATH,100\n";

    let report =
        ingest(DataCategory::Affiliations, "affiliations/roster.csv", csv, &sink).expect("ok");

    assert_eq!(report.failed, 1);
    assert_eq!(
        report.errors,
        vec!["row 2: no user with email 'ghost@example.edu'".to_string()]
    );
}

#[test]
fn grants_and_patents_skip_existing_records() {
    let sink = MemoryRecordSink::new();
    let grants = b"pi_name,agency,title,amount,year\n\
                   Ada Lovelace,NSERC,Engines,\"$10,000\",2023\n\
                   ada lovelace,nserc,ENGINES,\"$10,000\",2023\n";
    let patents = b"inventors,title,patent_number\n\
                    Ada Lovelace,Engine,US 1234\n\
                    Ada Lovelace,Engine,us-1234\n";

    let grant_report = ingest(DataCategory::Grants, "grants/g.csv", grants, &sink).expect("ok");
    let patent_report =
        ingest(DataCategory::Patents, "patents/p.csv", patents, &sink).expect("ok");

    assert_eq!((grant_report.inserted, grant_report.skipped), (1, 1));
    assert_eq!((patent_report.inserted, patent_report.skipped), (1, 1));
    assert_eq!(sink.snapshot().grants[0].amount, Some(10_000));
}

#[test]
fn cv_data_requires_a_known_section() {
    let sink = MemoryRecordSink::with_sections(vec![courses_section()]);
    sink.seed_user(user("ada@example.edu", None));
    let csv = b"email,section,course_title,course_code,start_date\n\
                ada@example.edu,Courses Taught,Numerical Methods,MATH 307,2020-09-01\n\
                ada@example.edu,courses taught,Numerical Methods,MATH 307,2020-09-01\n\
                ada@example.edu,Hobbies,Chess,,\n";

    let report = ingest(DataCategory::CvData, "cv-data/legacy.csv", csv, &sink).expect("ok");

    assert_eq!(report.inserted, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(
        report.errors,
        vec!["row 4: unknown data section 'Hobbies'".to_string()]
    );
    let state = sink.snapshot();
    assert_eq!(state.cv_data[0].1, "section-courses");
    assert_eq!(
        state.cv_data[0].2.get("dates"),
        Some(&serde_json::Value::from("September, 2020 - Current"))
    );
}

#[test]
fn unavailable_store_before_any_write_aborts_with_empty_counts() {
    let sink = MemoryRecordSink::new();
    sink.fail_with("connection refused");

    let report = ingest(
        DataCategory::Users,
        "user-data/hr.csv",
        b"first_name,last_name,email\nAda,Lovelace,ada@example.edu\n",
        &sink,
    )
    .expect("report is kept");

    assert_eq!(report.aborted.as_deref(), Some("connection refused"));
    assert_eq!(report.written(), 0);
}

#[test]
fn outage_midway_keeps_counts_of_rows_already_written() {
    let sink = MemoryRecordSink::new();
    sink.fail_after(2, "connection reset");
    let csv = b"first_name,last_name,email\n\
                Ada,Lovelace,ada@example.edu\n\
                Grace,Hopper,grace@example.edu\n\
                Alan,Turing,alan@example.edu\n";

    let report = ingest(DataCategory::Users, "user-data/hr.csv", csv, &sink).expect("report");

    assert_eq!(report.rows_read, 3);
    assert_eq!(report.inserted, 2);
    assert_eq!(report.aborted.as_deref(), Some("connection reset"));
    assert_eq!(sink.snapshot().users.len(), 2);
}

#[test]
fn institution_id_roster_uses_stored_home_department() {
    let sink = MemoryRecordSink::new();
    let mut ada = user("ada@example.edu", Some("Computer Science"));
    ada.institution_user_id = Some("1001".to_string());
    sink.seed_user(ada);
    let csv = b"employee_id,unit,department,roster_percent\n\
                1001,MATH,Mathematics,50\n\
                1001,CPSC,Computer Science,50\n";

    let report =
        ingest(DataCategory::Affiliations, "affiliations/roster.csv", csv, &sink).expect("ok");

    assert_eq!(report.inserted, 1);
    let state = sink.snapshot();
    let stored = state.affiliations.get("ada@example.edu").expect("ada resolved");
    assert_eq!(stored.institution_user_id.as_deref(), Some("1001"));
    assert_eq!(stored.primary_unit.unit, "CPSC");
    assert_eq!(stored.joint_units[0].unit, "MATH");
}

#[test]
fn symbol_headers_match_percent_and_number_columns() {
    let sink = MemoryRecordSink::new();
    sink.seed_user(user("ada@example.edu", None));

    let roster = ingest(
        DataCategory::Affiliations,
        "affiliations/roster.csv",
        b"Email,Unit,Roster %\nada@example.edu,MATH,100\n",
        &sink,
    )
    .expect("roster headers recognized");
    let patents = ingest(
        DataCategory::Patents,
        "patents/p.csv",
        b"Inventors,Title,Patent #\nAda Lovelace,Engine,US 1234\n",
        &sink,
    )
    .expect("patent headers recognized");

    assert_eq!(roster.inserted, 1);
    assert_eq!(patents.inserted, 1);
}
