//! Input checks shared by every service.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use tuin_common::PaginationParams;

use crate::errors::ServiceError;

// Markup and SQL fragments that never belong in garden data
static DANGEROUS_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)<script",
        r"(?i)javascript:",
        r"(?i)\bon\w+\s*=",
        r"(?i)<iframe",
        r"(?i)union\s+select",
        r"(?i)drop\s+table",
        r"(?i)delete\s+from",
        r"(?i)insert\s+into",
        r"(?i)update\s+\w*\s*set\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

/// Resolve page and page size, clamped to `1..=max_page_size`.
pub fn clamp_pagination(
    params: &PaginationParams,
    default_page_size: u32,
    max_page_size: u32,
) -> (u32, u32) {
    let page = params.page.unwrap_or(1).max(1);
    let page_size = params
        .page_size
        .unwrap_or(default_page_size as i64)
        .max(1)
        .min(max_page_size.max(1) as i64);
    (page.min(u32::MAX as i64) as u32, page_size as u32)
}

/// Reject over-long values and values carrying script or SQL fragments.
pub fn validate_input(value: &str, field: &str, max_len: usize) -> Result<(), ServiceError> {
    if value.chars().count() > max_len {
        return Err(ServiceError::validation(
            field,
            format!("{} exceeds maximum length of {} characters", field, max_len),
        ));
    }
    if DANGEROUS_PATTERNS.iter().any(|re| re.is_match(value)) {
        return Err(ServiceError::validation(
            field,
            format!("{} contains invalid characters", field),
        ));
    }
    Ok(())
}

/// Validate an optional field; `None` passes.
pub fn validate_optional(
    value: Option<&str>,
    field: &str,
    max_len: usize,
) -> Result<(), ServiceError> {
    match value {
        Some(v) => validate_input(v, field, max_len),
        None => Ok(()),
    }
}

pub fn validate_id(id: i64, field: &str) -> Result<(), ServiceError> {
    if id <= 0 {
        return Err(ServiceError::validation(
            field,
            format!("{} must be a positive integer", field),
        ));
    }
    Ok(())
}

pub fn validate_date(value: &str, field: &str) -> Result<NaiveDate, ServiceError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        ServiceError::validation(field, format!("{} must be an ISO date (YYYY-MM-DD)", field))
    })
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}

/// Trim and drop empty strings.
pub fn clean(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(page: Option<i64>, page_size: Option<i64>) -> PaginationParams {
        PaginationParams { page, page_size }
    }

    #[test]
    fn test_clamp_pagination_defaults() {
        assert_eq!(clamp_pagination(&params(None, None), 10, 100), (1, 10));
    }

    #[test]
    fn test_clamp_pagination_bounds() {
        assert_eq!(clamp_pagination(&params(Some(0), Some(0)), 10, 100), (1, 1));
        assert_eq!(clamp_pagination(&params(Some(-4), Some(500)), 10, 100), (1, 100));
        assert_eq!(clamp_pagination(&params(Some(3), Some(25)), 10, 100), (3, 25));
    }

    #[test]
    fn test_validate_input_rejects_long_values() {
        let long = "a".repeat(1001);
        let err = validate_input(&long, "name", 1000).unwrap_err();
        match err {
            ServiceError::Validation { field, .. } => assert_eq!(field, "name"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(validate_input(&"a".repeat(1000), "name", 1000).is_ok());
    }

    #[test]
    fn test_validate_input_rejects_dangerous_patterns() {
        for bad in [
            "<script>alert(1)</script>",
            "JavaScript:void(0)",
            "<img onerror=x>",
            "<IFRAME src=x>",
            "1 UNION SELECT *",
            "drop table gardens",
            "DELETE FROM users",
            "insert into x",
            "update gardens set name",
        ] {
            assert!(validate_input(bad, "notes", 1000).is_err(), "accepted {bad}");
        }
    }

    #[test]
    fn test_validate_input_accepts_garden_text() {
        for ok in [
            "Moestuin aan de Vecht",
            "Tomaten: ruim water geven, niet over het blad",
            "Selected update of bed A",
        ] {
            assert!(validate_input(ok, "notes", 1000).is_ok(), "rejected {ok}");
        }
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id(1, "id").is_ok());
        assert!(validate_id(0, "id").is_err());
        assert!(validate_id(-3, "id").is_err());
    }

    #[test]
    fn test_validate_date() {
        assert!(validate_date("2026-04-01", "entry_date").is_ok());
        assert!(validate_date("01-04-2026", "entry_date").is_err());
    }

    #[test]
    fn test_email_format() {
        assert!(is_valid_email("an@example.nl"));
        assert!(!is_valid_email("an@example"));
        assert!(!is_valid_email("an example@x.nl"));
    }

    #[test]
    fn test_clean_trims_and_drops_empty() {
        assert_eq!(clean(Some(&"  Hof ".to_string())), Some("Hof".to_string()));
        assert_eq!(clean(Some(&"   ".to_string())), None);
        assert_eq!(clean(None), None);
    }
}
