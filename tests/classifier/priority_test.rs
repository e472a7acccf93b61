//! Priority rules: keyword OR pattern, case-insensitive, no scoring.

use supportdesk::classifier::{classify_priority, is_support_email, Priority};

#[test]
fn urgency_keyword_in_subject_is_urgent() {
    assert_eq!(
        classify_priority("Urgent: Cannot access my account", "Hi team"),
        Priority::Urgent
    );
}

#[test]
fn urgency_keyword_in_body_is_urgent() {
    assert_eq!(
        classify_priority("Billing", "Our checkout page is broken for every customer."),
        Priority::Urgent
    );
}

#[test]
fn matching_is_case_insensitive() {
    assert_eq!(
        classify_priority("need this ASAP", "thanks"),
        Priority::Urgent
    );
    assert_eq!(
        classify_priority("Quick note", "EMERGENCY in the warehouse"),
        Priority::Urgent
    );
}

#[test]
fn time_sensitive_phrase_alone_is_urgent() {
    assert_eq!(
        classify_priority("Invoice copy", "Could you send it right away?"),
        Priority::Urgent
    );
    assert_eq!(
        classify_priority("Invoice copy", "Send it as soon as possible."),
        Priority::Urgent
    );
}

#[test]
fn pattern_spans_subject_and_body() {
    // "cannot" in the subject, "access" in the body, not adjacent.
    assert_eq!(
        classify_priority("Cannot log in", "or access the portal"),
        Priority::Urgent
    );
}

#[test]
fn keywords_match_as_substrings() {
    // "down" inside "download" still counts.
    assert_eq!(
        classify_priority("Reports", "Where can I download last month's report?"),
        Priority::Urgent
    );
}

#[test]
fn plain_question_is_normal() {
    assert_eq!(
        classify_priority("Question about invoices", "When is my next invoice due?"),
        Priority::Normal
    );
}

#[test]
fn empty_input_is_normal() {
    assert_eq!(classify_priority("", ""), Priority::Normal);
}

#[test]
fn support_mail_detection_uses_keywords() {
    assert!(is_support_email("Bug in CSV export", ""));
    assert!(is_support_email("Hello", "I need some assistance with my order"));
    assert!(!is_support_email("Lunch plans", "See you at noon."));
}
