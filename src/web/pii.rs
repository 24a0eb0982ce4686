//! PII detection for incoming queries
//!
//! Detection and reporting only; query text is never altered.

use crate::query::PiiReport;
use once_cell::sync::Lazy;
use regex::Regex;

static PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("email", r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}"),
        ("ssn", r"\b\d{3}-\d{2}-\d{4}\b"),
        (
            "phone",
            r"(?:\+1[-.\s]?)?(?:\(\d{3}\)\s?|\b\d{3}[-.\s])\d{3}[-.\s]\d{4}\b",
        ),
        (
            "date_of_birth",
            concat!(
                r"(?i)\b(?:dob|d\.o\.b\.|date\s+of\s+birth|born(?:\s+on)?)",
                r"\s*[:\-]?\s*\d{1,2}[/.-]\d{1,2}[/.-]\d{2,4}\b",
            ),
        ),
        (
            "medical_record_number",
            r"(?i)\b(?:mrn|medical\s+record(?:\s+(?:number|no\.?))?)\s*[:#]?\s*[A-Z0-9]{5,}\b",
        ),
    ]
    .into_iter()
    .map(|(kind, pattern)| (kind, Regex::new(pattern).expect("valid PII pattern")))
    .collect()
});

/// Report every kind of PII found in the text
pub fn detect(text: &str) -> PiiReport {
    let mut report = PiiReport::default();

    for (kind, pattern) in PATTERNS.iter() {
        let count = pattern.find_iter(text).count();
        if count > 0 {
            report.types.push(kind.to_string());
            report.count += count;
        }
    }

    report.detected = report.count > 0;
    report
}

/// Combine the reports of several texts
pub fn merge(reports: &[PiiReport]) -> PiiReport {
    let mut merged = PiiReport::default();
    for report in reports {
        for kind in &report.types {
            if !merged.types.contains(kind) {
                merged.types.push(kind.clone());
            }
        }
        merged.count += report.count;
    }
    merged.detected = merged.count > 0;
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_query() {
        let report = detect("What are the side effects of ibuprofen?");
        assert!(!report.detected);
        assert_eq!(report.count, 0);
        assert!(report.types.is_empty());
    }

    #[test]
    fn test_identifiers_are_not_pii() {
        assert!(!detect("NCT01234567 status").detected);
        assert!(!detect("PMID: 12345678").detected);
        assert!(!detect("label for NDA020402").detected);
    }

    #[test]
    fn test_detects_each_kind() {
        assert_eq!(detect("mail jane.doe@example.com").types, vec!["email"]);
        assert_eq!(detect("ssn 123-45-6789 please").types, vec!["ssn"]);
        assert_eq!(detect("call (555) 123-4567").types, vec!["phone"]);
        assert_eq!(detect("call 555-123-4567").types, vec!["phone"]);
        assert_eq!(detect("DOB: 01/02/1980").types, vec!["date_of_birth"]);
        assert_eq!(detect("patient MRN# 00123456").types, vec!["medical_record_number"]);
    }

    #[test]
    fn test_counts_all_matches() {
        let report = detect("a@example.com and b@example.org, ssn 123-45-6789");
        assert!(report.detected);
        assert_eq!(report.count, 3);
        assert_eq!(report.types, vec!["email", "ssn"]);
    }

    #[test]
    fn test_merge() {
        let merged = merge(&[detect("a@example.com"), detect("clean"), detect("b@example.com")]);
        assert!(merged.detected);
        assert_eq!(merged.count, 2);
        assert_eq!(merged.types, vec!["email"]);
    }
}
