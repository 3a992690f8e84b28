use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use tracing::trace;

use super::FindingRepository;
use crate::draft::{parse_draft, DiagnosticDocument, DraftDiagnostic};

const EXTENSIONS: [&str; 4] = ["json", "json5", "yaml", "yml"];

/// Loads diagnostics from `<base>/<diagnostic_id>.{json,json5,yaml,yml}` documents.
pub struct FileFindingRepository {
    base_path: PathBuf,
    index: OnceCell<BTreeMap<String, PathBuf>>,
}

impl FileFindingRepository {
    /// Create a repository rooted at the given directory.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            index: OnceCell::new(),
        }
    }

    fn index(&self) -> Result<&BTreeMap<String, PathBuf>> {
        self.index.get_or_try_init(|| {
            let mut index = BTreeMap::new();
            if !self.base_path.exists() {
                return Ok(index);
            }
            let entries = fs::read_dir(&self.base_path).with_context(|| {
                format!(
                    "failed to read diagnostics directory {}",
                    self.base_path.display()
                )
            })?;
            for entry in entries {
                let path = entry?.path();
                let supported = path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| EXTENSIONS.contains(&ext));
                let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                    continue;
                };
                if !supported || !path.is_file() {
                    continue;
                }
                if let Some(previous) = index.insert(stem.to_string(), path.clone()) {
                    return Err(anyhow::anyhow!(
                        "duplicate diagnostic id `{stem}` ({} and {})",
                        previous.display(),
                        path.display()
                    ));
                }
            }
            trace!(count = index.len(), "indexed diagnostics");
            Ok::<_, anyhow::Error>(index)
        })
    }
}

/// Read a single diagnostic document, choosing the parser by file extension.
pub fn load_document(path: &Path) -> Result<DraftDiagnostic> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read diagnostic file at {}", path.display()))?;
    let is_yaml = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml" | "yml")
    );
    if is_yaml {
        let document: DiagnosticDocument = serde_yaml::from_str(&raw)
            .with_context(|| format!("invalid YAML diagnostic at {}", path.display()))?;
        return Ok(document.into());
    }
    parse_draft(&raw).with_context(|| format!("invalid diagnostic at {}", path.display()))
}

#[async_trait::async_trait]
impl FindingRepository for FileFindingRepository {
    async fn list_diagnostics(&self) -> Result<Vec<String>> {
        Ok(self.index()?.keys().cloned().collect())
    }

    async fn load_diagnostic(&self, diagnostic_id: &str) -> Result<Option<DraftDiagnostic>> {
        let Some(path) = self.index()?.get(diagnostic_id) else {
            return Ok(None);
        };
        let mut draft = load_document(path)?;
        draft
            .diagnostic_id
            .get_or_insert_with(|| diagnostic_id.to_string());
        Ok(Some(draft))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::{engine::GradingEngine, Grade, Status};
    use proptest::prelude::*;

    fn write(path: &Path, contents: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn loads_json_and_yaml_diagnostics() {
        let temp = tempfile::tempdir().unwrap();
        write(
            &temp.path().join("acme-hiring.json"),
            r#"[
                {"obligation_id": "risk_management", "status": "compliant"},
                {"obligation_id": "human_oversight", "status": "critical"}
            ]"#,
        );
        write(
            &temp.path().join("globex-credit.yaml"),
            r#"
diagnostic_id: globex-credit-2026
claimed_grade: "B"
findings:
  - obligation_id: data_governance
    status: partial
    recommendation: Document bias examination of training data.
"#,
        );
        write(&temp.path().join("notes.txt"), "ignored");

        let repo = FileFindingRepository::new(temp.path());
        let ids = futures::executor::block_on(repo.list_diagnostics()).unwrap();
        assert_eq!(ids, vec!["acme-hiring", "globex-credit"]);

        let acme = futures::executor::block_on(repo.load_diagnostic("acme-hiring"))
            .unwrap()
            .expect("acme should exist");
        assert_eq!(acme.diagnostic_id.as_deref(), Some("acme-hiring"));
        assert_eq!(acme.findings.len(), 2);

        let globex = futures::executor::block_on(repo.load_diagnostic("globex-credit"))
            .unwrap()
            .expect("globex should exist");
        assert_eq!(globex.diagnostic_id.as_deref(), Some("globex-credit-2026"));
        assert_eq!(globex.claimed_grade, Some(Grade::B));
        assert_eq!(
            globex.findings[0].validate().unwrap().status,
            Status::Partial
        );
    }

    #[test]
    fn missing_diagnostic_is_none() {
        let temp = tempfile::tempdir().unwrap();
        let repo = FileFindingRepository::new(temp.path());
        let loaded = futures::executor::block_on(repo.load_diagnostic("absent")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn missing_directory_lists_nothing() {
        let repo = FileFindingRepository::new("/nonexistent/diagnostics");
        let ids = futures::executor::block_on(repo.list_diagnostics()).unwrap();
        assert!(ids.is_empty());
    }

    #[test]
    fn duplicate_ids_across_extensions_error() {
        let temp = tempfile::tempdir().unwrap();
        write(&temp.path().join("dup.json"), "[]");
        write(&temp.path().join("dup.yaml"), "[]");
        let repo = FileFindingRepository::new(temp.path());
        let err = futures::executor::block_on(repo.list_diagnostics()).unwrap_err();
        assert!(err.to_string().contains("duplicate diagnostic id `dup`"));
    }

    #[test]
    fn malformed_document_reports_path() {
        let temp = tempfile::tempdir().unwrap();
        write(&temp.path().join("broken.json"), "{not json at all");
        let repo = FileFindingRepository::new(temp.path());
        let err = futures::executor::block_on(repo.load_diagnostic("broken")).unwrap_err();
        assert!(format!("{err:#}").contains("broken.json"));
    }

    #[tokio::test]
    async fn sample_diagnostics_grade_cleanly() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../diagnostics");
        let repo = FileFindingRepository::new(dir);
        let engine = GradingEngine::new();
        let ids = repo.list_diagnostics().await.unwrap();
        assert!(!ids.is_empty(), "sample diagnostics should ship with the workspace");
        for id in ids {
            let draft = repo.load_diagnostic(&id).await.unwrap().unwrap();
            engine
                .reconcile(&draft)
                .unwrap_or_else(|err| panic!("sample `{id}` failed to grade: {err}"));
        }
    }

    fn status_name() -> impl Strategy<Value = &'static str> {
        proptest::sample::select(
            Status::all()
                .iter()
                .map(|status| status.as_str())
                .collect::<Vec<_>>(),
        )
    }

    proptest! {
        #[test]
        fn yaml_documents_load_every_finding(
            statuses in proptest::collection::vec(status_name(), 0..=8)
        ) {
            let temp = tempfile::tempdir().unwrap();
            let mut buffer = String::from("findings:\n");
            if statuses.is_empty() {
                buffer = String::from("findings: []\n");
            }
            for (idx, status) in statuses.iter().enumerate() {
                buffer.push_str(&format!(
                    "  - obligation_id: obligation_{idx}\n    status: {status}\n"
                ));
            }
            write(&temp.path().join("generated.yaml"), &buffer);

            let repo = FileFindingRepository::new(temp.path());
            let draft = futures::executor::block_on(repo.load_diagnostic("generated"))
                .unwrap()
                .expect("generated diagnostic should load");

            prop_assert_eq!(draft.findings.len(), statuses.len());
            let report = GradingEngine::new().grade(&draft.findings).unwrap();
            prop_assert_eq!(report.findings.len(), statuses.len());
        }
    }
}
