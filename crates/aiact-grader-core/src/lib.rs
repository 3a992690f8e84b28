pub mod catalogue;
pub mod draft;
pub mod grading;
pub mod report;

pub use catalogue::{obligation, obligations, Obligation, HUMAN_OVERSIGHT_ID};
pub use draft::{parse_draft, DraftDiagnostic};
pub use grading::{
    engine::GradingEngine,
    file_repository::{load_document, FileFindingRepository},
    AppliedOverride, ConfigValidationError, Finding, FindingDetails, FindingRecord,
    FindingRepository, Grade, GradeClaim, GradeReport, GradeThresholds, GradingConfig,
    GradingError, OverrideRule, ScoreBreakdown, Status, StatusCounts,
};
pub use report::{render_report, OutputFormat};
