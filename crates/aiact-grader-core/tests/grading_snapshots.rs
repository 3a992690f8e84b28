use aiact_grader_core::{obligations, FindingRecord, GradingEngine, HUMAN_OVERSIGHT_ID};
use insta::assert_json_snapshot;
use serde_json::json;

fn grade_scenario(name: &str, status_for: impl Fn(usize, &str) -> &'static str) -> serde_json::Value {
    let records: Vec<_> = obligations()
        .iter()
        .enumerate()
        .map(|(idx, obligation)| FindingRecord::new(obligation.id, status_for(idx, obligation.id)))
        .collect();
    let report = GradingEngine::new()
        .grade(&records)
        .unwrap_or_else(|err| panic!("scenario {name} failed to grade: {err}"));

    json!({
        "scenario": name,
        "grade": report.grade,
        "percentage_grade": report.breakdown.percentage_grade,
        "percentage": format!("{:.3}", report.percentage),
        "points": report.breakdown.points,
        "max_points": report.breakdown.max_points,
        "overrides": report.breakdown.overrides,
    })
}

#[test]
fn two_critical_gaps_one_partial_snapshot() {
    let snapshot = grade_scenario("two_critical_gaps_one_partial", |idx, _| match idx {
        0 | 1 => "critical_gap",
        2 => "partial",
        _ => "compliant",
    });
    assert_json_snapshot!("two_critical_gaps_one_partial", snapshot);
}

#[test]
fn human_oversight_gap_snapshot() {
    let snapshot = grade_scenario("human_oversight_gap", |_, id| {
        if id == HUMAN_OVERSIGHT_ID {
            "critical_gap"
        } else {
            "compliant"
        }
    });
    assert_json_snapshot!("human_oversight_gap", snapshot);
}
