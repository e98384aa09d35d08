//! Static code tables used by `Transform::Lookup`.

pub static FACULTY_NAMES: &[(&str, &str)] = &[
    ("APSC", "Faculty of Applied Science"),
    ("ARTS", "Faculty of Arts"),
    ("COMM", "Sauder School of Business"),
    ("DENT", "Faculty of Dentistry"),
    ("EDUC", "Faculty of Education"),
    ("FRST", "Faculty of Forestry"),
    ("LAW", "Peter A. Allard School of Law"),
    ("LFS", "Faculty of Land and Food Systems"),
    ("MED", "Faculty of Medicine"),
    ("MEDI", "Faculty of Medicine"),
    ("PHAR", "Faculty of Pharmaceutical Sciences"),
    ("SCI", "Faculty of Science"),
];

pub static APPOINTMENT_TYPES: &[(&str, &str)] = &[
    ("P", "Primary"),
    ("PRI", "Primary"),
    ("J", "Joint"),
    ("JNT", "Joint"),
    ("A", "Associate"),
    ("ASSOC", "Associate"),
    ("ADJ", "Adjunct"),
    ("CL", "Clinical"),
    ("EM", "Emeritus"),
];

pub static ROLE_NAMES: &[(&str, &str)] = &[
    ("FAC", "Faculty"),
    ("FACULTY", "Faculty"),
    ("ADM", "Admin"),
    ("DEPT_ADMIN", "Department Admin"),
    ("FAC_ADMIN", "Faculty Admin"),
    ("ASST", "Assistant"),
];

pub static RANK_NAMES: &[(&str, &str)] = &[
    ("PROF", "Professor"),
    ("ASSOC PROF", "Associate Professor"),
    ("ASST PROF", "Assistant Professor"),
    ("INSTR", "Instructor"),
    ("SR INSTR", "Senior Instructor"),
    ("LECT", "Lecturer"),
    ("PROF EMER", "Professor Emeritus"),
];

pub static AGENCY_NAMES: &[(&str, &str)] = &[
    ("CFI", "Canada Foundation for Innovation"),
    ("CIHR", "Canadian Institutes of Health Research"),
    ("MSFHR", "Michael Smith Health Research BC"),
    ("NIH", "National Institutes of Health"),
    ("NSERC", "Natural Sciences and Engineering Research Council of Canada"),
    ("RI", "Rick Hansen Institute"),
    ("SSHRC", "Social Sciences and Humanities Research Council of Canada"),
];

pub static PATENT_STATUSES: &[(&str, &str)] = &[
    ("A", "Application Filed"),
    ("FILED", "Application Filed"),
    ("PEND", "Pending"),
    ("G", "Granted"),
    ("ISSUED", "Granted"),
    ("LAPSED", "Lapsed"),
    ("ABN", "Abandoned"),
];

pub static COUNTRY_NAMES: &[(&str, &str)] = &[
    ("CA", "Canada"),
    ("US", "United States"),
    ("USA", "United States"),
    ("EP", "European Patent Office"),
    ("WO", "World Intellectual Property Organization"),
    ("GB", "United Kingdom"),
    ("JP", "Japan"),
    ("CN", "China"),
];
