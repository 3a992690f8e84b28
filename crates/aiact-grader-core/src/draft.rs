use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::grading::{FindingRecord, Grade};

/// Findings for one diagnostic, optionally carrying a self-assessed grade.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DraftDiagnostic {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic_id: Option<String>,
    pub findings: Vec<FindingRecord>,
    #[serde(
        default,
        alias = "grade",
        alias = "overall_grade",
        skip_serializing_if = "Option::is_none"
    )]
    pub claimed_grade: Option<Grade>,
}

impl DraftDiagnostic {
    pub fn from_findings(findings: Vec<FindingRecord>) -> Self {
        Self {
            findings,
            ..Self::default()
        }
    }
}

/// Accepted document shapes: a bare findings array or a full draft object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum DiagnosticDocument {
    Findings(Vec<FindingRecord>),
    Draft(DraftDiagnostic),
}

impl From<DiagnosticDocument> for DraftDiagnostic {
    fn from(document: DiagnosticDocument) -> Self {
        match document {
            DiagnosticDocument::Findings(findings) => Self::from_findings(findings),
            DiagnosticDocument::Draft(draft) => draft,
        }
    }
}

/// Parse a diagnostic payload, escalating from strict JSON to a newline-escaped
/// retry to JSON5. Payloads outside the schema are errors, never empty diagnostics.
pub fn parse_draft(payload: &str) -> Result<DraftDiagnostic> {
    let body = strip_code_fence(payload);
    if let Ok(document) = serde_json::from_str::<DiagnosticDocument>(body) {
        return Ok(document.into());
    }

    let sanitized = sanitize_json_strings(body);
    if sanitized != body {
        if let Ok(document) = serde_json::from_str::<DiagnosticDocument>(&sanitized) {
            debug!("draft parsed after escaping raw newlines");
            return Ok(document.into());
        }
    }

    let value: serde_json::Value =
        json5::from_str(&sanitized).context("diagnostic payload is not valid JSON or JSON5")?;
    let document: DiagnosticDocument = serde_json::from_value(value)
        .context("diagnostic payload does not match the findings schema")?;
    debug!("draft parsed with relaxed JSON5 syntax");
    Ok(document.into())
}

fn strip_code_fence(payload: &str) -> &str {
    let trimmed = payload.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`, `json5`, ...) on the opening fence line.
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Escape raw line breaks that appear inside string literals.
fn sanitize_json_strings(payload: &str) -> String {
    let mut result = String::with_capacity(payload.len());
    let mut in_string = false;
    let mut escape = false;

    for ch in payload.chars() {
        if !in_string {
            if ch == '"' {
                in_string = true;
            }
            result.push(ch);
            continue;
        }
        if escape {
            result.push(ch);
            escape = false;
            continue;
        }
        match ch {
            '\\' => {
                result.push(ch);
                escape = true;
            }
            '"' => {
                result.push(ch);
                in_string = false;
            }
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            _ => result.push(ch),
        }
    }
    result
}
