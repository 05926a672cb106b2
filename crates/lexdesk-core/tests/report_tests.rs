use chrono::Utc;

use lexdesk_core::conflict::ConflictCheckRequest;
use lexdesk_core::report::{render_report, timeline};
use lexdesk_core::{
    AnalysisResult, Document, KeyDate, LexError, NewDocument, Risk, Severity,
    DOC_TYPE_CONTRACT_ANALYSIS,
};

// ── helpers ──────────────────────────────────────────────────────────────────

fn sample() -> AnalysisResult {
    AnalysisResult {
        summary: "Two-year commercial lease.".into(),
        risks: vec![
            Risk {
                clause: "Late fees".into(),
                severity: Severity::Low,
                description: "5% after ten days".into(),
            },
            Risk {
                clause: "Indemnity".into(),
                severity: Severity::Critical,
                description: "uncapped tenant indemnity".into(),
            },
            Risk {
                clause: "Renewal".into(),
                severity: Severity::Medium,
                description: "auto-renews silently".into(),
            },
        ],
        missing_clauses: vec!["Force majeure".into()],
        suggested_fixes: vec!["Cap indemnity at 12 months rent".into()],
        key_dates: vec![
            KeyDate {
                label: "Rent review".into(),
                date: "2026-07-01".into(),
            },
            KeyDate {
                label: "Commencement".into(),
                date: "2025-02-01".into(),
            },
            KeyDate {
                label: "Renewal notice".into(),
                date: "90 days before expiry".into(),
            },
        ],
    }
}

fn stored(doc_type: &str, content: &str) -> Document {
    Document {
        id: 7,
        name: "lease.pdf".into(),
        doc_type: doc_type.into(),
        jurisdiction: "Texas".into(),
        status: "analyzed".into(),
        content: content.into(),
        feedback_rating: None,
        feedback_comment: None,
        user_id: None,
        created_at: Utc::now(),
    }
}

// ── report ───────────────────────────────────────────────────────────────────

#[test]
fn risks_are_ordered_by_severity() {
    let md = render_report(&sample());
    let critical = md.find("[CRITICAL]").unwrap();
    let medium = md.find("[MEDIUM]").unwrap();
    let low = md.find("[LOW]").unwrap();
    assert!(critical < medium && medium < low);
    assert!(md.contains("## Missing clauses\n\n- Force majeure"));
    assert!(md.contains("## Suggested fixes"));
}

#[test]
fn timeline_is_chronological() {
    let rows = timeline(&sample().key_dates);
    let labels: Vec<_> = rows.iter().map(|r| r.label.as_str()).collect();
    assert_eq!(labels, vec!["Commencement", "Rent review", "Renewal notice"]);
    assert!(rows[2].date.is_none());
    assert_eq!(rows[2].raw_date, "90 days before expiry");
}

#[test]
fn report_lists_key_dates_in_timeline_order() {
    let md = render_report(&sample());
    let first = md.find("- 2025-02-01: Commencement").unwrap();
    let second = md.find("- 2026-07-01: Rent review").unwrap();
    let third = md.find("- 90 days before expiry: Renewal notice").unwrap();
    assert!(first < second && second < third);
}

#[test]
fn empty_result_still_renders_a_summary_heading() {
    let md = render_report(&AnalysisResult::default());
    assert!(md.starts_with("## Summary"));
    assert!(!md.contains("## Risks"));
}

// ── stored documents ─────────────────────────────────────────────────────────

#[test]
fn stored_analysis_round_trips() {
    let result = sample();
    let new_doc = NewDocument::contract_analysis("lease.pdf", "Texas", &result, None).unwrap();
    let doc = stored(&new_doc.doc_type, &new_doc.content);
    assert_eq!(doc.analysis(), Some(result));
}

#[test]
fn mismatched_or_malformed_content_fails_closed() {
    let content = serde_json::to_string(&sample()).unwrap();
    assert_eq!(stored("research_note", &content).analysis(), None);
    assert_eq!(stored(DOC_TYPE_CONTRACT_ANALYSIS, "{not json").analysis(), None);
}

#[test]
fn backend_json_with_camel_case_and_loose_severity_parses() {
    let parsed: AnalysisResult = serde_json::from_str(
        r#"{
            "summary": "ok",
            "risks": [{"clause": "Payment", "severity": "HIGH", "risk": "net-90 terms"},
                      {"clause": "Misc", "severity": null}],
            "missingClauses": ["Governing law"],
            "keyDates": [{"event": "Signing", "date": "2025-01-15"}]
        }"#,
    )
    .unwrap();
    assert_eq!(parsed.risks[0].severity, Severity::High);
    assert_eq!(parsed.risks[0].description, "net-90 terms");
    assert_eq!(parsed.risks[1].severity, Severity::Medium);
    assert_eq!(parsed.missing_clauses, vec!["Governing law"]);
    assert_eq!(parsed.key_dates[0].label, "Signing");
}

// ── conflict check ───────────────────────────────────────────────────────────

#[test]
fn conflict_request_validation() {
    let err = ConflictCheckRequest::new("Acme LLC", "hi", None).unwrap_err();
    assert!(matches!(err, LexError::Validation(_)));
    assert_eq!(err.alert().title, "Missing information");

    let err = ConflictCheckRequest::new("   ", "Lease dispute over deposit", None).unwrap_err();
    assert!(matches!(err, LexError::Validation(_)));
}

#[test]
fn conflict_request_body_keeps_empty_opposing_parties() {
    let req = ConflictCheckRequest::new(" Acme LLC ", "Lease dispute over deposit", None).unwrap();
    assert_eq!(
        serde_json::to_value(&req).unwrap(),
        serde_json::json!({
            "client_name": "Acme LLC",
            "matter_summary": "Lease dispute over deposit",
            "opposing_parties": ""
        })
    );
}
