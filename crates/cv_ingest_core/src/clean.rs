//! Value cleaning shared by every column map.
//!
//! Source exports disagree on almost everything: spreadsheet tools leave
//! non-breaking spaces behind, HR feeds write `nan` for blanks, grant
//! agencies format money with currency suffixes. Each helper here is a pure
//! function from raw cell text to a normalized value.

use chrono::{Datelike, NaiveDate};

const NULL_TOKENS: [&str; 7] = ["nan", "none", "null", "n/a", "na", "-", "nat"];

const FULL_DATE_FORMATS: [&str; 6] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d-%b-%Y",
    "%B %d, %Y",
    "%B %d %Y",
];

pub fn clean_text(raw: &str) -> Option<String> {
    let replaced: String = raw
        .chars()
        .filter(|ch| !matches!(ch, '\u{200B}' | '\u{FEFF}'))
        .map(|ch| if ch == '\u{00A0}' { ' ' } else { ch })
        .collect();
    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.is_empty() {
        return None;
    }
    let lowered = collapsed.to_ascii_lowercase();
    if NULL_TOKENS.contains(&lowered.as_str()) {
        return None;
    }
    Some(collapsed)
}

pub fn clean_email(raw: &str) -> Result<Option<String>, String> {
    let Some(text) = clean_text(raw) else {
        return Ok(None);
    };
    let lowered = text.to_ascii_lowercase();
    let email = lowered.strip_prefix("mailto:").unwrap_or(&lowered).trim();

    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(format!("'{text}' is not a valid email address"));
    };
    if local.is_empty() || domain.is_empty() || email.contains(' ') {
        return Err(format!("'{text}' is not a valid email address"));
    }
    Ok(Some(email.to_string()))
}

/// Canonical header spelling: lowercase words joined by `_`. `%` and `#`
/// are spelled out as the words `percent` and `number`.
pub fn normalize_header(raw: &str) -> String {
    let mut normalized = String::with_capacity(raw.len());
    let mut pending_separator = false;
    for ch in raw.trim_start_matches('\u{FEFF}').trim().chars() {
        let symbol_word = match ch {
            '%' => Some("percent"),
            '#' => Some("number"),
            _ => None,
        };
        if symbol_word.is_none() && !ch.is_alphanumeric() {
            pending_separator = true;
            continue;
        }

        if (pending_separator || symbol_word.is_some()) && !normalized.is_empty() {
            normalized.push('_');
        }
        match symbol_word {
            Some(word) => {
                normalized.push_str(word);
                pending_separator = true;
            }
            None => {
                normalized.extend(ch.to_lowercase());
                pending_separator = false;
            }
        }
    }
    normalized
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    let Some(text) = clean_text(raw) else {
        return Err("date is empty".to_string());
    };

    // Spreadsheet exports append a midnight time component.
    let date_part = match text.get(..10) {
        Some(prefix)
            if text.len() > 10
                && matches!(text.as_bytes()[10], b' ' | b'T')
                && NaiveDate::parse_from_str(prefix, "%Y-%m-%d").is_ok() =>
        {
            prefix
        }
        _ => text.as_str(),
    };

    for format in FULL_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(date_part, format) {
            return Ok(date);
        }
    }

    let without_commas = date_part.replace(',', "");
    if let Ok(date) = NaiveDate::parse_from_str(&format!("1 {without_commas}"), "%d %B %Y") {
        return Ok(date);
    }

    if let Ok(date) = NaiveDate::parse_from_str(&format!("{date_part}-01"), "%Y-%m-%d") {
        return Ok(date);
    }

    if date_part.len() == 4 && date_part.chars().all(|ch| ch.is_ascii_digit()) {
        let year = parse_year(date_part)?;
        if let Some(date) = NaiveDate::from_ymd_opt(year, 1, 1) {
            return Ok(date);
        }
    }

    Err(format!("'{text}' is not a recognized date"))
}

pub fn format_month_year(date: NaiveDate) -> String {
    date.format("%B, %Y").to_string()
}

pub fn date_range(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Option<String> {
    let start = start?;
    let end = end
        .map(format_month_year)
        .unwrap_or_else(|| "Current".to_string());
    Some(format!("{} - {end}", format_month_year(start)))
}

/// Whole-dollar amount; `(1,200)` is negative.
pub fn parse_amount(raw: &str) -> Result<i64, String> {
    let Some(text) = clean_text(raw) else {
        return Err("amount is empty".to_string());
    };

    let mut body = text.trim().to_string();
    let mut negative = false;
    if body.starts_with('(') && body.ends_with(')') {
        negative = true;
        body = body[1..body.len() - 1].to_string();
    }

    let upper = body.to_ascii_uppercase();
    let stripped = upper
        .trim()
        .trim_start_matches("CAD")
        .trim_start_matches("USD")
        .trim_end_matches("CAD")
        .trim_end_matches("USD")
        .trim();
    let digits: String = stripped
        .chars()
        .filter(|ch| !matches!(ch, '$' | ',' | ' '))
        .collect();

    let value: f64 = digits
        .parse()
        .map_err(|_| format!("'{text}' is not a valid amount"))?;
    if !value.is_finite() {
        return Err(format!("'{text}' is not a valid amount"));
    }
    let rounded = value.round() as i64;
    Ok(if negative { -rounded } else { rounded })
}

/// Percentage in `[0, 100]`. A decimal fraction such as `0.5` or `1.00`
/// without a `%` sign is scaled up.
pub fn parse_percent(raw: &str) -> Result<f64, String> {
    let Some(text) = clean_text(raw) else {
        return Err("percentage is empty".to_string());
    };

    let has_percent_sign = text.ends_with('%');
    let number_text = text.trim_end_matches('%').trim();
    let mut value: f64 = number_text
        .parse()
        .map_err(|_| format!("'{text}' is not a valid percentage"))?;

    if !has_percent_sign && number_text.contains('.') && value > 0.0 && value <= 1.0 {
        value *= 100.0;
    }

    if !(0.0..=100.0).contains(&value) {
        return Err(format!("percentage {value} is outside 0-100"));
    }
    Ok(value)
}

pub fn parse_year(raw: &str) -> Result<i32, String> {
    let Some(text) = clean_text(raw) else {
        return Err("year is empty".to_string());
    };

    let year = if text.len() == 4 && text.chars().all(|ch| ch.is_ascii_digit()) {
        text.parse::<i32>()
            .map_err(|_| format!("'{text}' is not a valid year"))?
    } else if let Some(whole) = text.strip_suffix(".0") {
        // Numeric spreadsheet columns round-trip years as floats.
        return parse_year(whole);
    } else {
        parse_date(&text)?.year()
    };

    if !(1900..=2100).contains(&year) {
        return Err(format!("year {year} is outside 1900-2100"));
    }
    Ok(year)
}

pub fn parse_flag(raw: &str) -> Result<bool, String> {
    let Some(text) = clean_text(raw) else {
        return Err("flag is empty".to_string());
    };
    match text.to_ascii_lowercase().as_str() {
        "y" | "yes" | "true" | "1" | "x" => Ok(true),
        "n" | "no" | "false" | "0" => Ok(false),
        _ => Err(format!("'{text}' is not a yes/no value")),
    }
}

/// Title-cases all-upper or all-lower names; mixed case is trusted as typed.
pub fn title_case_name(raw: &str) -> Option<String> {
    let text = clean_text(raw)?;
    let has_upper = text.chars().any(char::is_uppercase);
    let has_lower = text.chars().any(char::is_lowercase);
    if has_upper && has_lower {
        return Some(text);
    }

    let mut titled = String::with_capacity(text.len());
    let mut capitalize_next = true;
    for ch in text.chars() {
        if capitalize_next {
            titled.extend(ch.to_uppercase());
        } else {
            titled.extend(ch.to_lowercase());
        }
        capitalize_next = matches!(ch, ' ' | '-' | '\'');
    }
    Some(titled)
}

pub fn lookup(table: &[(&str, &str)], raw: &str) -> Option<String> {
    let text = clean_text(raw)?;
    let found = table
        .iter()
        .find(|(code, _)| code.eq_ignore_ascii_case(&text))
        .map(|(_, label)| (*label).to_string());
    Some(found.unwrap_or(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[test]
    fn clean_text_collapses_whitespace_and_nbsp() {
        assert_eq!(
            clean_text("  Jane\u{00A0}\u{00A0} Doe \u{200B}"),
            Some("Jane Doe".to_string())
        );
    }

    #[test]
    fn clean_text_maps_null_tokens_to_none() {
        for token in ["", "   ", "NaN", "None", "null", "N/A", "-"] {
            assert_eq!(clean_text(token), None, "token {token:?}");
        }
    }

    #[test]
    fn email_is_lowercased_and_validated() {
        assert_eq!(
            clean_email(" mailto:Jane.Doe@Example.EDU "),
            Ok(Some("jane.doe@example.edu".to_string()))
        );
        assert_eq!(clean_email("nan"), Ok(None));
        assert!(clean_email("jane.doe").is_err());
        assert!(clean_email("a@b@c").is_err());
        assert!(clean_email("@example.edu").is_err());
    }

    #[test]
    fn headers_normalize_to_snake_case() {
        assert_eq!(normalize_header("\u{FEFF}First Name"), "first_name");
        assert_eq!(normalize_header(" Roster %  "), "roster_percent");
        assert_eq!(normalize_header("Start-Date/Term"), "start_date_term");
        assert_eq!(normalize_header("Patent #"), "patent_number");
        assert_eq!(normalize_header("%FTE"), "percent_fte");
        assert_eq!(normalize_header("Grant (CAD)"), "grant_cad");
    }

    #[test]
    fn parses_common_export_date_formats() {
        let expected = date(2021, 7, 1);
        for raw in [
            "2021-07-01",
            "2021/07/01",
            "07/01/2021",
            "01-Jul-2021",
            "July 1, 2021",
            "Jul 1, 2021",
            "2021-07-01 00:00:00",
            "2021-07-01T00:00:00",
            "July 2021",
            "Jul 2021",
            "July, 2021",
            "2021-07",
        ] {
            assert_eq!(parse_date(raw), Ok(expected), "input {raw:?}");
        }
        assert_eq!(parse_date("2021"), Ok(date(2021, 1, 1)));
        assert!(parse_date("sometime soon").is_err());
    }

    #[test]
    fn formats_date_ranges_for_cv_display() {
        assert_eq!(
            date_range(Some(date(2021, 7, 1)), None),
            Some("July, 2021 - Current".to_string())
        );
        assert_eq!(
            date_range(Some(date(2021, 7, 1)), Some(date(2023, 6, 30))),
            Some("July, 2021 - June, 2023".to_string())
        );
        assert_eq!(date_range(None, Some(date(2023, 6, 30))), None);
    }

    #[test]
    fn parses_agency_amount_formats() {
        assert_eq!(parse_amount("$12,500.00"), Ok(12_500));
        assert_eq!(parse_amount("12500.50 CAD"), Ok(12_501));
        assert_eq!(parse_amount("USD 900"), Ok(900));
        assert_eq!(parse_amount("(1,200)"), Ok(-1_200));
        assert!(parse_amount("a lot").is_err());
    }

    #[test]
    fn parses_roster_percentages() {
        assert_eq!(parse_percent("50"), Ok(50.0));
        assert_eq!(parse_percent("50%"), Ok(50.0));
        assert_eq!(parse_percent("0.5"), Ok(50.0));
        assert_eq!(parse_percent("1.00"), Ok(100.0));
        assert_eq!(parse_percent("1"), Ok(1.0));
        assert!(parse_percent("120").is_err());
        assert!(parse_percent("half").is_err());
    }

    #[test]
    fn parses_years_from_numbers_and_dates() {
        assert_eq!(parse_year("2024"), Ok(2024));
        assert_eq!(parse_year("2024.0"), Ok(2024));
        assert_eq!(parse_year("2019-09-01"), Ok(2019));
        assert!(parse_year("1492").is_err());
    }

    #[test]
    fn parses_flags() {
        assert_eq!(parse_flag("Yes"), Ok(true));
        assert_eq!(parse_flag("x"), Ok(true));
        assert_eq!(parse_flag("N"), Ok(false));
        assert!(parse_flag("maybe").is_err());
    }

    #[test]
    fn title_cases_shouted_names_only() {
        assert_eq!(title_case_name("O'BRIEN"), Some("O'Brien".to_string()));
        assert_eq!(title_case_name("mary-ann"), Some("Mary-Ann".to_string()));
        assert_eq!(title_case_name("McDonald"), Some("McDonald".to_string()));
    }

    #[test]
    fn lookup_substitutes_known_codes_case_insensitively() {
        let table = [("MED", "Faculty of Medicine"), ("SCI", "Faculty of Science")];
        assert_eq!(
            lookup(&table, " med "),
            Some("Faculty of Medicine".to_string())
        );
        assert_eq!(lookup(&table, "ARTS"), Some("ARTS".to_string()));
        assert_eq!(lookup(&table, "nan"), None);
    }
}
