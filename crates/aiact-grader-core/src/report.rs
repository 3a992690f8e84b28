use std::fmt::Write;

use crate::catalogue;
use crate::grading::{GradeReport, Status};

/// Format styles supported by the report renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Produce a report string from a `GradeReport` using the desired format.
pub fn render_report(report: &GradeReport, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Human => render_human(report),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
    }
}

fn render_human(report: &GradeReport) -> anyhow::Result<String> {
    let breakdown = &report.breakdown;
    let mut out = String::new();
    if let Some(id) = &report.diagnostic_id {
        writeln!(out, "Diagnostic: {id}")?;
    }
    writeln!(
        out,
        "Grade: {} ({:.1}% • {}/{} points)",
        report.grade,
        report.percentage * 100.0,
        breakdown.points,
        breakdown.max_points
    )?;
    writeln!(out, "Percentage grade: {}", breakdown.percentage_grade)?;
    writeln!(out)?;

    writeln!(out, "Status counts:")?;
    for status in Status::all() {
        writeln!(
            out,
            "  - {status:>14}: {}",
            breakdown.counts.count(*status)
        )?;
    }

    writeln!(out)?;
    if breakdown.overrides.is_empty() {
        writeln!(out, "No overrides triggered.")?;
    } else {
        writeln!(out, "Overrides:")?;
        for applied in &breakdown.overrides {
            let effect = if applied.lowered { "applied" } else { "no effect" };
            writeln!(out, "  - {} [{effect}]", applied.rule)?;
        }
    }

    let open: Vec<_> = report
        .findings
        .iter()
        .filter(|finding| {
            !matches!(finding.status, Status::Compliant | Status::NotApplicable)
        })
        .collect();
    if !open.is_empty() {
        writeln!(out, "\nRemediation:")?;
        for finding in open {
            let name = catalogue::obligation(&finding.obligation_id)
                .map_or(finding.obligation_id.as_str(), |obligation| obligation.name);
            writeln!(out, "  - {name} [{}]", finding.status)?;
            let details = &finding.details;
            if let Some(text) = details.recommendation.as_deref().or(details.finding.as_deref()) {
                writeln!(out, "    {}", single_line(text))?;
            }
            if let Some(deadline) = &details.deadline {
                writeln!(out, "    deadline: {deadline}")?;
            }
        }
    }

    if let Some(claim) = &report.claim {
        let verdict = if claim.matches { "matches" } else { "DRIFT" };
        writeln!(
            out,
            "\nDrafted grade: {} ({verdict}; canonical {})",
            claim.claimed, report.grade
        )?;
    }

    Ok(out)
}

fn single_line(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '\n' | '\r' => ' ',
            _ => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::DraftDiagnostic;
    use crate::grading::{engine::GradingEngine, FindingRecord, Grade};

    fn sample_report() -> GradeReport {
        let mut gap = FindingRecord::new("human_oversight", "critical_gap");
        gap.details.recommendation = Some("Assign an oversight owner\nwith stop authority.".into());
        gap.details.deadline = Some("2026-08-02".into());
        let draft = DraftDiagnostic {
            diagnostic_id: Some("acme-hiring".into()),
            findings: vec![
                FindingRecord::new("risk_management", "compliant"),
                gap,
                FindingRecord::new("record_keeping", "not_applicable"),
            ],
            claimed_grade: Some(Grade::B),
        };
        GradingEngine::new().reconcile(&draft).unwrap()
    }

    #[test]
    fn human_report_contains_grade_and_remediation() {
        let report = sample_report();
        let output = render_report(&report, OutputFormat::Human).unwrap();
        assert!(output.contains("Diagnostic: acme-hiring"));
        assert!(output.contains(&format!("Grade: {}", report.grade)));
        assert!(output.contains("Overrides:"));
        assert!(output.contains("Human Oversight [critical_gap]"));
        assert!(output.contains("Assign an oversight owner with stop authority."));
        assert!(output.contains("deadline: 2026-08-02"));
        assert!(!output.contains("Record-Keeping ["));
        assert!(output.contains("DRIFT"));
    }

    #[test]
    fn json_report_serializes() {
        let report = sample_report();
        let output = render_report(&report, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["grade"], serde_json::json!(report.grade.as_str()));
        assert_eq!(value["claim"]["matches"], serde_json::json!(false));
        assert!(value["findings"].is_array());
        assert!(value["breakdown"]["overrides"].is_array());
    }

    #[test]
    fn only_the_binding_ceiling_is_marked_applied() {
        let records: Vec<_> = catalogue::obligations()
            .iter()
            .enumerate()
            .map(|(idx, obligation)| {
                let status = if idx < 3 { "critical_gap" } else { "compliant" };
                FindingRecord::new(obligation.id, status)
            })
            .collect();
        let report = GradingEngine::new().grade(&records).unwrap();
        let output = render_report(&report, OutputFormat::Human).unwrap();
        assert_eq!(output.matches("[applied]").count(), 1);
        assert!(output.contains("3+ critical_gap findings cap grade at D [applied]"));
        assert!(output.contains("2+ critical_gap findings cap grade at C+ [no effect]"));
    }

    #[test]
    fn clean_report_mentions_no_overrides() {
        let records: Vec<_> = catalogue::obligations()
            .iter()
            .map(|obligation| FindingRecord::new(obligation.id, "compliant"))
            .collect();
        let report = GradingEngine::new().grade(&records).unwrap();
        let output = render_report(&report, OutputFormat::Human).unwrap();
        assert!(output.contains("Grade: A+ (100.0%"));
        assert!(output.contains("No overrides triggered."));
        assert!(!output.contains("Remediation"));
    }
}
