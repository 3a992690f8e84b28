use std::{fmt, str::FromStr};

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalogue::{self, HUMAN_OVERSIGHT_ID};
use crate::draft::DraftDiagnostic;

pub mod engine;
pub mod file_repository;

/// Assessed compliance state of one obligation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Compliant,
    Partial,
    #[serde(alias = "critical")]
    CriticalGap,
    NotStarted,
    NotApplicable,
}

impl Status {
    /// Points awarded to a fully compliant obligation.
    pub const MAX_POINTS: u32 = 3;

    /// Point value, or `None` when the finding is excluded from scoring.
    pub fn points(self) -> Option<u32> {
        match self {
            Self::Compliant => Some(Self::MAX_POINTS),
            Self::Partial => Some(1),
            Self::CriticalGap | Self::NotStarted => Some(0),
            Self::NotApplicable => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compliant => "compliant",
            Self::Partial => "partial",
            Self::CriticalGap => "critical_gap",
            Self::NotStarted => "not_started",
            Self::NotApplicable => "not_applicable",
        }
    }

    pub fn all() -> &'static [Status] {
        &[
            Self::Compliant,
            Self::Partial,
            Self::CriticalGap,
            Self::NotStarted,
            Self::NotApplicable,
        ]
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Raised when a status string falls outside the closed vocabulary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unrecognised status `{0}`")]
pub struct UnknownStatus(pub String);

impl FromStr for Status {
    type Err = UnknownStatus;

    /// Strict parse. `critical` is the legacy spelling of `critical_gap` still
    /// emitted by older dashboard rows.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "compliant" => Ok(Self::Compliant),
            "partial" => Ok(Self::Partial),
            "critical_gap" | "critical" => Ok(Self::CriticalGap),
            "not_started" => Ok(Self::NotStarted),
            "not_applicable" => Ok(Self::NotApplicable),
            _ => Err(UnknownStatus(raw.to_string())),
        }
    }
}

/// Overall letter grade. Variant order is the grade order, worst first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "F")]
    F,
    #[serde(rename = "D")]
    D,
    #[serde(rename = "C")]
    C,
    #[serde(rename = "C+")]
    CPlus,
    #[serde(rename = "B")]
    B,
    #[serde(rename = "B+")]
    BPlus,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "A+")]
    APlus,
}

impl Grade {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::APlus => "A+",
            Self::A => "A",
            Self::BPlus => "B+",
            Self::B => "B",
            Self::CPlus => "C+",
            Self::C => "C",
            Self::D => "D",
            Self::F => "F",
        }
    }

    /// Map a score fraction (0.0–1.0) onto the default grade table.
    pub fn from_percentage(percentage: f64) -> Self {
        Self::from_percentage_with_thresholds(percentage, &GradeThresholds::default())
    }

    /// Map a score fraction using caller-provided thresholds; first band from the top wins.
    pub fn from_percentage_with_thresholds(percentage: f64, thresholds: &GradeThresholds) -> Self {
        thresholds
            .bands()
            .into_iter()
            .find(|(_, floor)| percentage >= *floor)
            .map(|(grade, _)| grade)
            .unwrap_or(Self::F)
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unrecognised grade `{0}`")]
pub struct UnknownGrade(pub String);

impl FromStr for Grade {
    type Err = UnknownGrade;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "A+" => Ok(Self::APlus),
            "A" => Ok(Self::A),
            "B+" => Ok(Self::BPlus),
            "B" => Ok(Self::B),
            "C+" => Ok(Self::CPlus),
            "C" => Ok(Self::C),
            "D" => Ok(Self::D),
            "F" => Ok(Self::F),
            _ => Err(UnknownGrade(raw.to_string())),
        }
    }
}

/// Lower bounds (inclusive) of each grade band as a fraction of the maximum score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradeThresholds {
    pub a_plus: f64,
    pub a: f64,
    pub b_plus: f64,
    pub b: f64,
    pub c_plus: f64,
    pub c: f64,
    pub d: f64,
}

impl Default for GradeThresholds {
    fn default() -> Self {
        Self {
            a_plus: 0.95,
            a: 0.85,
            b_plus: 0.70,
            b: 0.55,
            c_plus: 0.40,
            c: 0.25,
            d: 0.10,
        }
    }
}

impl GradeThresholds {
    /// Bands from best to worst. Anything below `d` is an `F`.
    pub fn bands(&self) -> [(Grade, f64); 7] {
        [
            (Grade::APlus, self.a_plus),
            (Grade::A, self.a),
            (Grade::BPlus, self.b_plus),
            (Grade::B, self.b),
            (Grade::CPlus, self.c_plus),
            (Grade::C, self.c),
            (Grade::D, self.d),
        ]
    }

    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let bands = self.bands();
        for (grade, floor) in bands {
            if !(0.0..=1.0).contains(&floor) {
                return Err(ConfigValidationError::ThresholdOutOfRange {
                    grade,
                    value: floor,
                });
            }
        }
        for pair in bands.windows(2) {
            let ((higher, higher_floor), (lower, lower_floor)) = (pair[0], pair[1]);
            if higher_floor <= lower_floor {
                return Err(ConfigValidationError::ThresholdsNotDescending { higher, lower });
            }
        }
        Ok(())
    }
}

/// Hard ceiling applied after the percentage grade is computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OverrideRule {
    /// Triggers once at least `at_least` findings carry `status`.
    StatusCount {
        status: Status,
        at_least: usize,
        ceiling: Grade,
    },
    /// Triggers when the finding for `obligation_id` carries `status`.
    ObligationStatus {
        obligation_id: String,
        status: Status,
        ceiling: Grade,
    },
}

impl OverrideRule {
    pub fn ceiling(&self) -> Grade {
        match self {
            Self::StatusCount { ceiling, .. } | Self::ObligationStatus { ceiling, .. } => *ceiling,
        }
    }

    /// Short human-readable label used in reports and logs.
    pub fn describe(&self) -> String {
        match self {
            Self::StatusCount {
                status,
                at_least,
                ceiling,
            } => format!("{at_least}+ {status} findings cap grade at {ceiling}"),
            Self::ObligationStatus {
                obligation_id,
                status,
                ceiling,
            } => format!("{obligation_id} marked {status} caps grade at {ceiling}"),
        }
    }

    pub fn is_triggered(&self, findings: &[Finding], counts: &StatusCounts) -> bool {
        match self {
            Self::StatusCount {
                status, at_least, ..
            } => counts.count(*status) >= *at_least,
            Self::ObligationStatus {
                obligation_id,
                status,
                ..
            } => findings
                .iter()
                .any(|finding| &finding.obligation_id == obligation_id && finding.status == *status),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        match self {
            Self::StatusCount { at_least: 0, .. } => Err(ConfigValidationError::ZeroCountRule {
                rule: self.describe(),
            }),
            Self::ObligationStatus { obligation_id, .. }
                if catalogue::obligation(obligation_id).is_none() =>
            {
                Err(ConfigValidationError::UnknownRuleObligation {
                    obligation_id: obligation_id.clone(),
                })
            }
            _ => Ok(()),
        }
    }
}

/// The canonical override set.
pub fn default_overrides() -> Vec<OverrideRule> {
    vec![
        OverrideRule::StatusCount {
            status: Status::CriticalGap,
            at_least: 2,
            ceiling: Grade::CPlus,
        },
        OverrideRule::StatusCount {
            status: Status::CriticalGap,
            at_least: 3,
            ceiling: Grade::D,
        },
        OverrideRule::ObligationStatus {
            obligation_id: HUMAN_OVERSIGHT_ID.to_string(),
            status: Status::CriticalGap,
            ceiling: Grade::CPlus,
        },
        OverrideRule::StatusCount {
            status: Status::NotStarted,
            at_least: 3,
            ceiling: Grade::D,
        },
    ]
}

/// Tunable inputs of the grading engine. Defaults are the canonical grade table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradingConfig {
    pub thresholds: GradeThresholds,
    pub overrides: Vec<OverrideRule>,
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            thresholds: GradeThresholds::default(),
            overrides: default_overrides(),
        }
    }
}

impl GradingConfig {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        self.thresholds.validate()?;
        for rule in &self.overrides {
            rule.validate()?;
        }
        Ok(())
    }
}

/// Errors emitted while validating grading configuration.
#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConfigValidationError {
    #[error("threshold for {grade} must be within 0.0..=1.0 (got {value})")]
    ThresholdOutOfRange { grade: Grade, value: f64 },
    #[error("threshold for {higher} must be strictly above threshold for {lower}")]
    ThresholdsNotDescending { higher: Grade, lower: Grade },
    #[error("override `{rule}` must require at least one finding")]
    ZeroCountRule { rule: String },
    #[error("override references obligation `{obligation_id}` which is not in the catalogue")]
    UnknownRuleObligation { obligation_id: String },
}

/// Narrative fields a reviewer attaches to a finding. Not used for scoring.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effort: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
}

/// Finding as received from a store row or an LLM draft, status still unparsed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingRecord {
    pub obligation_id: String,
    pub status: String,
    #[serde(flatten)]
    pub details: FindingDetails,
}

impl FindingRecord {
    pub fn new(obligation_id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            obligation_id: obligation_id.into(),
            status: status.into(),
            details: FindingDetails::default(),
        }
    }

    /// Validate the record into a typed finding. Unknown statuses are never coerced.
    pub fn validate(&self) -> Result<Finding, GradingError> {
        if self.obligation_id.trim().is_empty() {
            return Err(GradingError::InvalidObligationId {
                obligation_id: self.obligation_id.clone(),
            });
        }
        let status = self
            .status
            .parse::<Status>()
            .map_err(|UnknownStatus(status)| GradingError::UnknownStatus {
                obligation_id: self.obligation_id.clone(),
                status,
            })?;
        Ok(Finding {
            obligation_id: self.obligation_id.clone(),
            status,
            details: self.details.clone(),
        })
    }
}

/// Validated finding for one obligation within a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub obligation_id: String,
    pub status: Status,
    #[serde(flatten)]
    pub details: FindingDetails,
}

impl Finding {
    /// Placeholder for a catalogue obligation that has no recorded finding yet.
    pub fn not_started(obligation_id: impl Into<String>) -> Self {
        Self {
            obligation_id: obligation_id.into(),
            status: Status::NotStarted,
            details: FindingDetails::default(),
        }
    }
}

/// Errors emitted while grading a set of findings.
#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GradingError {
    #[error("finding for obligation `{obligation_id}` has unrecognised status `{status}`")]
    UnknownStatus {
        obligation_id: String,
        status: String,
    },
    #[error("obligation id must not be blank (got `{obligation_id}`)")]
    InvalidObligationId { obligation_id: String },
    #[error("obligation `{obligation_id}` has more than one finding")]
    DuplicateObligation { obligation_id: String },
    #[error("obligation `{obligation_id}` is not part of the catalogue")]
    UnknownObligation { obligation_id: String },
    #[error("invalid grading configuration: {reason}")]
    InvalidConfig { reason: ConfigValidationError },
}

impl From<ConfigValidationError> for GradingError {
    fn from(reason: ConfigValidationError) -> Self {
        Self::InvalidConfig { reason }
    }
}

/// Number of findings per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub compliant: usize,
    pub partial: usize,
    pub critical_gap: usize,
    pub not_started: usize,
    pub not_applicable: usize,
}

impl StatusCounts {
    pub fn record(&mut self, status: Status) {
        *self.slot(status) += 1;
    }

    pub fn count(&self, status: Status) -> usize {
        match status {
            Status::Compliant => self.compliant,
            Status::Partial => self.partial,
            Status::CriticalGap => self.critical_gap,
            Status::NotStarted => self.not_started,
            Status::NotApplicable => self.not_applicable,
        }
    }

    /// Findings that take part in scoring.
    pub fn applicable(&self) -> usize {
        self.compliant + self.partial + self.critical_gap + self.not_started
    }

    fn slot(&mut self, status: Status) -> &mut usize {
        match status {
            Status::Compliant => &mut self.compliant,
            Status::Partial => &mut self.partial,
            Status::CriticalGap => &mut self.critical_gap,
            Status::NotStarted => &mut self.not_started,
            Status::NotApplicable => &mut self.not_applicable,
        }
    }
}

/// An override rule that fired for this diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedOverride {
    pub rule: String,
    pub ceiling: Grade,
    /// Whether this ceiling set the final grade below the percentage grade.
    pub lowered: bool,
}

/// Scoring metadata behind a grade, kept for explainability in reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub points: u32,
    pub max_points: u32,
    pub counts: StatusCounts,
    pub percentage_grade: Grade,
    pub overrides: Vec<AppliedOverride>,
}

impl ScoreBreakdown {
    /// Score fraction in 0.0..=1.0; zero when nothing is applicable.
    pub fn percentage(&self) -> f64 {
        if self.max_points == 0 {
            return 0.0;
        }
        f64::from(self.points) / f64::from(self.max_points)
    }

    /// Percentage grade clamped by every triggered ceiling.
    pub fn final_grade(&self) -> Grade {
        self.overrides
            .iter()
            .map(|applied| applied.ceiling)
            .fold(self.percentage_grade, Grade::min)
    }
}

/// Grade asserted by an upstream drafter, compared against the canonical one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeClaim {
    pub claimed: Grade,
    pub matches: bool,
}

/// Result of grading one diagnostic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic_id: Option<String>,
    pub grade: Grade,
    pub percentage: f64,
    pub findings: Vec<Finding>,
    pub breakdown: ScoreBreakdown,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim: Option<GradeClaim>,
}

impl GradeReport {
    pub fn from_breakdown(findings: Vec<Finding>, breakdown: ScoreBreakdown) -> Self {
        Self {
            diagnostic_id: None,
            grade: breakdown.final_grade(),
            percentage: breakdown.percentage(),
            findings,
            breakdown,
            claim: None,
        }
    }
}

/// Abstraction over where diagnostics come from, so every call site grades through one engine.
#[async_trait]
pub trait FindingRepository: Send + Sync {
    /// Identifiers of every diagnostic available from this source.
    async fn list_diagnostics(&self) -> AnyResult<Vec<String>>;

    /// Fetch a single diagnostic by identifier if it exists.
    async fn load_diagnostic(&self, diagnostic_id: &str) -> AnyResult<Option<DraftDiagnostic>>;
}
