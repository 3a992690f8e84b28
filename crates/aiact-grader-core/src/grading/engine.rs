use std::collections::HashSet;

use tracing::{debug, instrument, trace, warn};

use super::{
    AppliedOverride, Finding, FindingRecord, Grade, GradeClaim, GradeReport, GradingConfig,
    GradingError, ScoreBreakdown, Status, StatusCounts,
};
use crate::catalogue;
use crate::draft::DraftDiagnostic;

/// Pure grading engine: findings in, letter grade out. Holds only immutable config.
#[derive(Debug, Clone, Default)]
pub struct GradingEngine {
    config: GradingConfig,
}

impl GradingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an engine from custom thresholds and overrides, rejecting invalid config.
    pub fn with_config(config: GradingConfig) -> Result<Self, GradingError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &GradingConfig {
        &self.config
    }

    /// Grade exactly the findings given. An empty or all-`not_applicable` set grades `F`.
    #[instrument(name = "grade_findings", skip(self, records), fields(findings = records.len()))]
    pub fn grade(&self, records: &[FindingRecord]) -> Result<GradeReport, GradingError> {
        let findings = validate_records(records)?;
        Ok(self.grade_validated(findings))
    }

    /// Grade against the obligation catalogue: obligations without a finding
    /// count as `not_started`, ids outside the catalogue are rejected.
    #[instrument(name = "grade_diagnostic", skip(self, records), fields(findings = records.len()))]
    pub fn grade_diagnostic(&self, records: &[FindingRecord]) -> Result<GradeReport, GradingError> {
        let mut findings = validate_records(records)?;
        if let Some(unknown) = findings
            .iter()
            .find(|finding| catalogue::obligation(&finding.obligation_id).is_none())
        {
            return Err(GradingError::UnknownObligation {
                obligation_id: unknown.obligation_id.clone(),
            });
        }

        for obligation in catalogue::obligations() {
            if !findings.iter().any(|finding| finding.obligation_id == obligation.id) {
                trace!(obligation_id = obligation.id, "no finding recorded; treating as not started");
                findings.push(Finding::not_started(obligation.id));
            }
        }
        Ok(self.grade_validated(findings))
    }

    /// Grade a draft in catalogue mode and compare with the grade it claims.
    /// The canonical grade always wins; disagreement is reported, not resolved.
    pub fn reconcile(&self, draft: &DraftDiagnostic) -> Result<GradeReport, GradingError> {
        let mut report = self.grade_diagnostic(&draft.findings)?;
        report.diagnostic_id = draft.diagnostic_id.clone();
        if let Some(claimed) = draft.claimed_grade {
            let matches = claimed == report.grade;
            if !matches {
                warn!(
                    diagnostic_id = draft.diagnostic_id.as_deref().unwrap_or("-"),
                    %claimed,
                    canonical = %report.grade,
                    "drafted grade disagrees with canonical grade"
                );
            }
            report.claim = Some(GradeClaim { claimed, matches });
        }
        Ok(report)
    }

    fn grade_validated(&self, findings: Vec<Finding>) -> GradeReport {
        let breakdown = self.score_findings(&findings);
        let report = GradeReport::from_breakdown(findings, breakdown);
        debug!(
            grade = %report.grade,
            percentage = report.percentage,
            overrides = report.breakdown.overrides.len(),
            "grading completed"
        );
        report
    }

    fn score_findings(&self, findings: &[Finding]) -> ScoreBreakdown {
        let mut counts = StatusCounts::default();
        let mut points = 0;
        for finding in findings {
            counts.record(finding.status);
            points += finding.status.points().unwrap_or(0);
        }

        let max_points = counts.applicable() as u32 * Status::MAX_POINTS;
        let percentage_grade = if max_points == 0 {
            Grade::F
        } else {
            let percentage = f64::from(points) / f64::from(max_points);
            Grade::from_percentage_with_thresholds(percentage, &self.config.thresholds)
        };

        let triggered: Vec<_> = self
            .config
            .overrides
            .iter()
            .filter(|rule| rule.is_triggered(findings, &counts))
            .collect();
        let capped = triggered
            .iter()
            .map(|rule| rule.ceiling())
            .fold(percentage_grade, Grade::min);

        let overrides = triggered
            .into_iter()
            .map(|rule| {
                let ceiling = rule.ceiling();
                trace!(rule = %rule.describe(), "override triggered");
                AppliedOverride {
                    rule: rule.describe(),
                    ceiling,
                    lowered: ceiling < percentage_grade && ceiling == capped,
                }
            })
            .collect();

        ScoreBreakdown {
            points,
            max_points,
            counts,
            percentage_grade,
            overrides,
        }
    }
}

fn validate_records(records: &[FindingRecord]) -> Result<Vec<Finding>, GradingError> {
    let mut seen = HashSet::new();
    let mut findings = Vec::with_capacity(records.len());
    for record in records {
        let finding = record.validate()?;
        if !seen.insert(finding.obligation_id.clone()) {
            return Err(GradingError::DuplicateObligation {
                obligation_id: finding.obligation_id,
            });
        }
        findings.push(finding);
    }
    Ok(findings)
}
