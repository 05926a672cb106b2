use std::fmt::Write;

use chrono::NaiveDate;

use crate::types::{AnalysisResult, KeyDate};

/// One timeline row. `date` is `None` when the source string is not an ISO
/// calendar date.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TimelineEntry {
    pub label: String,
    pub date: Option<NaiveDate>,
    pub raw_date: String,
}

/// Dated entries in chronological order, then undated ones in input order.
pub fn timeline(dates: &[KeyDate]) -> Vec<TimelineEntry> {
    let mut entries: Vec<TimelineEntry> = dates
        .iter()
        .map(|d| TimelineEntry {
            label: d.label.clone(),
            date: parse_date(&d.date),
            raw_date: d.date.clone(),
        })
        .collect();
    // sort_by_key is stable, so undated entries keep their relative order.
    entries.sort_by_key(|e| (e.date.is_none(), e.date));
    entries
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    // Accept a full timestamp by looking only at its date part.
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Markdown rendering of a contract review.
pub fn render_report(result: &AnalysisResult) -> String {
    let mut out = String::new();

    out.push_str("## Summary\n\n");
    if result.summary.trim().is_empty() {
        out.push_str("_No summary provided._\n");
    } else {
        let _ = writeln!(out, "{}", result.summary.trim());
    }

    let mut risks: Vec<_> = result.risks.iter().collect();
    risks.sort_by(|a, b| b.severity.cmp(&a.severity));
    if !risks.is_empty() {
        out.push_str("\n## Risks\n\n");
        for risk in risks {
            let clause = if risk.clause.is_empty() {
                "General"
            } else {
                risk.clause.as_str()
            };
            let _ = writeln!(
                out,
                "- **[{}]** {}: {}",
                risk.severity.as_str().to_uppercase(),
                clause,
                risk.description
            );
        }
    }

    section(&mut out, "Missing clauses", &result.missing_clauses);
    section(&mut out, "Suggested fixes", &result.suggested_fixes);

    let rows = timeline(&result.key_dates);
    if !rows.is_empty() {
        out.push_str("\n## Key dates\n\n");
        for row in rows {
            let when = match row.date {
                Some(d) => d.format("%Y-%m-%d").to_string(),
                None if row.raw_date.is_empty() => "undated".to_string(),
                None => row.raw_date,
            };
            let _ = writeln!(out, "- {when}: {}", row.label);
        }
    }

    out
}

fn section(out: &mut String, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = write!(out, "\n## {title}\n\n");
    for item in items {
        let _ = writeln!(out, "- {item}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kd(label: &str, date: &str) -> KeyDate {
        KeyDate {
            label: label.into(),
            date: date.into(),
        }
    }

    #[test]
    fn timestamps_use_their_date_part() {
        assert_eq!(
            parse_date("2025-03-01T10:00:00Z"),
            NaiveDate::from_ymd_opt(2025, 3, 1)
        );
        assert_eq!(parse_date("next spring"), None);
    }

    #[test]
    fn undated_entries_trail_in_input_order() {
        let rows = timeline(&[
            kd("b", "upon signing"),
            kd("late", "2026-01-01"),
            kd("a", "TBD"),
            kd("early", "2024-06-30"),
        ]);
        let labels: Vec<_> = rows.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["early", "late", "b", "a"]);
    }
}
