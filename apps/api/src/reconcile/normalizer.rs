//! Record Normalizer — raw form/CSV rows into canonical `AttendeeRecord`s.
//!
//! Pure transform. Malformed cells degrade to `None`; nothing here returns an error.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::models::attendee::{AttendeeRecord, ExternalId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    SubmissionId,
    RespondentId,
    SubmittedAt,
    FirstName,
    LastName,
    DisplayName,
    Email,
    Phone,
    DateOfBirth,
    School,
    Grade,
    City,
    ParentName,
    ParentEmail,
    ParentPhone,
    ParticipatingSolo,
    LookingForTeammates,
    Teammates,
    IsVegetarian,
    Allergies,
}

impl Field {
    /// Persisted column name.
    pub fn column(&self) -> &'static str {
        match self {
            Field::SubmissionId => "submission_id",
            Field::RespondentId => "respondent_id",
            Field::SubmittedAt => "submitted_at",
            Field::FirstName => "first_name",
            Field::LastName => "last_name",
            Field::DisplayName => "display_name",
            Field::Email => "email_address",
            Field::Phone => "phone_number",
            Field::DateOfBirth => "date_of_birth",
            Field::School => "school",
            Field::Grade => "grade",
            Field::City => "city",
            Field::ParentName => "parent_name",
            Field::ParentEmail => "parent_email",
            Field::ParentPhone => "parent_phone",
            Field::ParticipatingSolo => "participating_solo",
            Field::LookingForTeammates => "looking_for_teammates",
            Field::Teammates => "teammates",
            Field::IsVegetarian => "is_vegetarian",
            Field::Allergies => "allergies",
        }
    }
}

pub type AliasTable = [(Field, &'static [&'static str])];

/// Header labels seen across registration form exports, in priority order.
/// The canonical column name is accepted for every field as well.
pub const FIELD_ALIASES: &AliasTable = &[
    (Field::SubmissionId, &["Submission ID", "Response ID", "Entry ID"]),
    (Field::RespondentId, &["Respondent ID", "Respondent"]),
    (
        Field::SubmittedAt,
        &["Submitted at", "Submitted", "Timestamp", "Submission Date", "Created At"],
    ),
    (Field::FirstName, &["First Name", "First", "Given Name"]),
    (Field::LastName, &["Last Name", "Last", "Surname", "Family Name"]),
    (Field::DisplayName, &["Full Name", "Name", "Preferred Name"]),
    (Field::Email, &["Email Address", "Email", "E-mail", "Your Email"]),
    (Field::Phone, &["Phone Number", "Phone", "Cell Phone", "Mobile Number"]),
    (Field::DateOfBirth, &["Date of Birth", "DOB", "Birthday", "Birth Date"]),
    (Field::School, &["School", "School Name", "What school do you attend?"]),
    (Field::Grade, &["Grade", "Grade Level", "What grade are you in?"]),
    (Field::City, &["City", "City of Residence", "Hometown"]),
    (
        Field::ParentName,
        &["Parent Name", "Parent/Guardian Name", "Guardian Name"],
    ),
    (
        Field::ParentEmail,
        &["Parent Email", "Parent/Guardian Email", "Guardian Email"],
    ),
    (
        Field::ParentPhone,
        &["Parent Phone", "Parent/Guardian Phone", "Guardian Phone", "Parent Phone Number"],
    ),
    (
        Field::ParticipatingSolo,
        &["Participating Solo", "Are you participating solo?", "Solo"],
    ),
    (
        Field::LookingForTeammates,
        &["Looking for Teammates", "Are you looking for teammates?", "Need a Team"],
    ),
    (
        Field::Teammates,
        &["Teammates", "Teammate Names", "Who are your teammates?", "Team Members"],
    ),
    (
        Field::IsVegetarian,
        &["Vegetarian", "Is Vegetarian", "Are you vegetarian?"],
    ),
    (
        Field::Allergies,
        &["Allergies", "Food Allergies", "Dietary Restrictions", "Any allergies?"],
    ),
];

/// Lower-cases, maps `_` to a space and collapses runs of whitespace.
pub fn normalize_header(label: &str) -> String {
    label
        .replace('_', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Header lookup for one row: normalized label → raw value.
/// When a label repeats, the first occurrence wins.
struct RowView<'a> {
    cells: HashMap<String, &'a str>,
}

impl<'a> RowView<'a> {
    fn new(row: &'a [(String, String)]) -> Self {
        let mut cells = HashMap::with_capacity(row.len());
        for (label, value) in row {
            cells
                .entry(normalize_header(label))
                .or_insert(value.as_str());
        }
        Self { cells }
    }

    /// First alias (then the canonical column) carrying a non-blank value.
    fn pick(&self, field: Field, aliases: &[&str]) -> Option<&'a str> {
        aliases
            .iter()
            .copied()
            .chain(std::iter::once(field.column()))
            .filter_map(|alias| self.cells.get(&normalize_header(alias)).copied())
            .find(|value| !value.trim().is_empty())
    }
}

/// Normalizes one row using the built-in alias table.
pub fn normalize_row(row: &[(String, String)]) -> AttendeeRecord {
    normalize_row_with(row, FIELD_ALIASES)
}

pub fn normalize_row_with(row: &[(String, String)], aliases: &AliasTable) -> AttendeeRecord {
    let view = RowView::new(row);
    let mut record = AttendeeRecord::default();

    for (field, labels) in aliases {
        let Some(raw) = view.pick(*field, labels) else {
            continue;
        };
        match field {
            Field::SubmissionId => record.submission_id = ExternalId::parse(raw),
            Field::RespondentId => record.respondent_id = ExternalId::parse(raw),
            Field::SubmittedAt => record.submitted_at = parse_timestamp(raw),
            Field::FirstName => record.first_name = clean_text(raw),
            Field::LastName => record.last_name = clean_text(raw),
            Field::DisplayName => record.display_name = clean_text(raw),
            Field::Email => record.email_address = clean_text(raw),
            Field::Phone => record.phone_number = clean_text(raw),
            Field::DateOfBirth => record.date_of_birth = parse_date(raw),
            Field::School => record.school = clean_text(raw),
            Field::Grade => record.grade = clean_text(raw),
            Field::City => record.city = clean_text(raw),
            Field::ParentName => record.parent_name = clean_text(raw),
            Field::ParentEmail => record.parent_email = clean_text(raw),
            Field::ParentPhone => record.parent_phone = clean_text(raw),
            Field::ParticipatingSolo => record.participating_solo = parse_yes_no(raw),
            Field::LookingForTeammates => record.looking_for_teammates = parse_yes_no(raw),
            Field::Teammates => record.teammates = clean_text(raw),
            Field::IsVegetarian => record.is_vegetarian = parse_yes_no(raw),
            Field::Allergies => record.allergies = clean_text(raw),
        }
    }

    record
}

/// Headers that no alias (or canonical column name) claims.
pub fn unmapped_headers(headers: &[String], aliases: &AliasTable) -> Vec<String> {
    let known: Vec<String> = aliases
        .iter()
        .flat_map(|(field, labels)| {
            labels
                .iter()
                .copied()
                .chain(std::iter::once(field.column()))
                .map(normalize_header)
        })
        .collect();
    headers
        .iter()
        .filter(|h| !known.contains(&normalize_header(h)))
        .cloned()
        .collect()
}

/// Trims; blank becomes `None`.
pub fn clean_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Tri-state yes/no parse. Unrecognized text is `None`.
pub fn parse_yes_no(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "yes" | "y" | "true" | "1" => Some(true),
        "no" | "n" | "false" | "0" => Some(false),
        _ => None,
    }
}

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%m/%d/%y",
];

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
];

fn plausible_year(date: NaiveDate) -> bool {
    use chrono::Datelike;
    (1900..=2100).contains(&date.year())
}

/// Day-precision date. Timestamps are truncated to their date.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .filter_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .find(|d| plausible_year(*d))
        .or_else(|| parse_naive_timestamp(trimmed).map(|ts| ts.date()))
        .filter(|d| plausible_year(*d))
}

/// Full timestamp. Offsets are honoured; naive values are taken as UTC;
/// a bare date becomes midnight UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(ts.with_timezone(&Utc));
    }
    parse_naive_timestamp(trimmed)
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .filter_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
                .find(|d| plausible_year(*d))
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .filter(|ts| plausible_year(ts.date()))
        .map(|ts| ts.and_utc())
}

fn parse_naive_timestamp(trimmed: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(cells: &[(&str, &str)]) -> Vec<(String, String)> {
        cells
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_email_aliases_land_in_same_field() {
        let a = normalize_row(&row(&[("Email", "x@y.org")]));
        let b = normalize_row(&row(&[("Email Address", "x@y.org")]));
        let c = normalize_row(&row(&[("  EMAIL   address ", "x@y.org")]));
        assert_eq!(a.email_address.as_deref(), Some("x@y.org"));
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn test_first_alias_wins() {
        let record = normalize_row(&row(&[
            ("Email", "second@y.org"),
            ("Email Address", "first@y.org"),
        ]));
        assert_eq!(record.email_address.as_deref(), Some("first@y.org"));
    }

    #[test]
    fn test_blank_alias_falls_through() {
        let record = normalize_row(&row(&[("Email Address", "  "), ("Email", "x@y.org")]));
        assert_eq!(record.email_address.as_deref(), Some("x@y.org"));
    }

    #[test]
    fn test_canonical_column_names_accepted() {
        let record = normalize_row(&row(&[("phone_number", "555-0100"), ("school", "Galena")]));
        assert_eq!(record.phone_number.as_deref(), Some("555-0100"));
        assert_eq!(record.school.as_deref(), Some("Galena"));
    }

    #[test]
    fn test_yes_no_tri_state() {
        assert_eq!(parse_yes_no("YES"), Some(true));
        assert_eq!(parse_yes_no(" y "), Some(true));
        assert_eq!(parse_yes_no("1"), Some(true));
        assert_eq!(parse_yes_no("False"), Some(false));
        assert_eq!(parse_yes_no("0"), Some(false));
        assert_eq!(parse_yes_no("maybe"), None);
        assert_eq!(parse_yes_no(""), None);
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2008, 3, 14);
        assert_eq!(parse_date("2008-03-14"), expected);
        assert_eq!(parse_date("3/14/2008"), expected);
        assert_eq!(parse_date("03/14/08"), expected);
        assert_eq!(parse_date("March 14, 2008"), expected);
        assert_eq!(parse_date("2008-03-14 09:30:00"), expected);
    }

    #[test]
    fn test_parse_date_garbage_is_none() {
        assert_eq!(parse_date("sometime in spring"), None);
        assert_eq!(parse_date("13/45/2008"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_parse_timestamp_forms() {
        let expected = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).single();
        assert_eq!(parse_timestamp("2025-01-01 10:00"), expected);
        assert_eq!(parse_timestamp("2025-01-01T10:00:00Z"), expected);
        assert_eq!(parse_timestamp("2025-01-01T02:00:00-08:00"), expected);
        assert_eq!(parse_timestamp("1/1/2025 10:00:00"), expected);
        assert_eq!(parse_timestamp("1/1/2025 10:00:00 AM"), expected);
        assert_eq!(
            parse_timestamp("2025-01-01"),
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).single()
        );
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_ids_coerced() {
        let record = normalize_row(&row(&[
            ("Submission ID", "  "),
            ("Respondent ID", "4412"),
        ]));
        assert_eq!(record.submission_id, None);
        assert_eq!(record.respondent_id, Some(ExternalId::Numeric(4412)));

        let record = normalize_row(&row(&[("Submission ID", "wLx9Ab")]));
        assert_eq!(
            record.submission_id,
            Some(ExternalId::Text("wLx9Ab".to_string()))
        );
    }

    #[test]
    fn test_full_registration_row() {
        let record = normalize_row(&row(&[
            ("Submitted at", "2025-01-01 10:00"),
            ("First Name", " Ada "),
            ("Last Name", "Lovelace"),
            ("Email Address", "ada@example.com"),
            ("Date of Birth", "12/10/2008"),
            ("Are you participating solo?", "No"),
            ("Looking for Teammates", "unsure"),
            ("Vegetarian", "yes"),
            ("Allergies", ""),
            ("Favourite Colour", "teal"),
        ]));
        assert_eq!(record.first_name.as_deref(), Some("Ada"));
        assert_eq!(record.participating_solo, Some(false));
        assert_eq!(record.looking_for_teammates, None);
        assert_eq!(record.is_vegetarian, Some(true));
        assert_eq!(record.allergies, None);
        assert_eq!(record.date_of_birth, NaiveDate::from_ymd_opt(2008, 12, 10));
    }

    #[test]
    fn test_unmapped_headers() {
        let headers = vec![
            "Email".to_string(),
            "Favourite Colour".to_string(),
            "first_name".to_string(),
        ];
        assert_eq!(
            unmapped_headers(&headers, FIELD_ALIASES),
            vec!["Favourite Colour".to_string()]
        );
    }
}
