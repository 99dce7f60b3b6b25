//! Stepwise schema migration of raw record documents.
//!
//! Each step is a pure function from a version-`n` document to a
//! version-`n + 1` document. [`migrate`] chains the steps a document
//! needs and reports every `(from, to)` pair it applied, so the store can
//! emit one event per step.
//!
//! | version | adds |
//! |---|---|
//! | 1 | `job_id`, `status`, `created_at`, `requirement` |
//! | 2 | `version` |
//! | 3 | `runs`, `artifacts_index` |

use serde_json::{Map, Value, json};

use statjob_core::error::AppError;
use statjob_core::result::AppResult;
use statjob_entity::job::CURRENT_SCHEMA_VERSION;

/// Version assumed for documents that carry no `schema_version` at all.
pub const LEGACY_SCHEMA_VERSION: u32 = 1;

/// One version transition.
#[derive(Debug, Clone, Copy)]
pub struct MigrationStep {
    /// Version the step reads.
    pub from: u32,
    /// Version the step writes.
    pub to: u32,
    apply: fn(&mut Map<String, Value>),
}

impl MigrationStep {
    /// Apply the step and stamp the target version.
    pub fn apply(&self, doc: &mut Map<String, Value>) {
        (self.apply)(doc);
        doc.insert("schema_version".to_string(), json!(self.to));
    }
}

/// All steps, in ascending order. The last `to` equals the current version.
pub const STEPS: &[MigrationStep] = &[
    MigrationStep {
        from: 1,
        to: 2,
        apply: introduce_version,
    },
    MigrationStep {
        from: 2,
        to: 3,
        apply: introduce_runs_and_artifacts,
    },
];

fn introduce_version(doc: &mut Map<String, Value>) {
    // Preserve a value that is already present; otherwise this is the
    // first touch of a legacy document.
    doc.entry("version").or_insert_with(|| json!(1));
}

fn introduce_runs_and_artifacts(doc: &mut Map<String, Value>) {
    doc.entry("runs").or_insert_with(|| json!([]));
    doc.entry("artifacts_index").or_insert_with(|| json!([]));
}

/// Result of running a document through the migration chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Migrated {
    /// The document at the current schema version.
    pub document: Value,
    /// `(from, to)` for each step applied, ascending. Empty when the
    /// document was already current.
    pub applied: Vec<(u32, u32)>,
}

impl Migrated {
    /// Whether any step ran.
    pub fn changed(&self) -> bool {
        !self.applied.is_empty()
    }
}

/// Read the schema version of a raw document.
pub fn schema_version_of(doc: &Value) -> AppResult<u32> {
    let object = doc
        .as_object()
        .ok_or_else(|| AppError::corrupt_record("record document is not a JSON object"))?;

    let version = match object.get("schema_version") {
        None | Some(Value::Null) => LEGACY_SCHEMA_VERSION,
        Some(value) => value
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| {
                AppError::corrupt_record(format!("schema_version is not a valid integer: {value}"))
            })?,
    };

    if version == 0 {
        return Err(AppError::corrupt_record("schema_version must be at least 1"));
    }
    if version > CURRENT_SCHEMA_VERSION {
        return Err(AppError::corrupt_record(format!(
            "schema_version {version} is newer than supported version {CURRENT_SCHEMA_VERSION}"
        )));
    }
    Ok(version)
}

/// Whether `doc` needs at least one migration step.
pub fn needs_migration(doc: &Value) -> AppResult<bool> {
    Ok(schema_version_of(doc)? < CURRENT_SCHEMA_VERSION)
}

/// Bring `doc` up to [`CURRENT_SCHEMA_VERSION`].
pub fn migrate(mut doc: Value) -> AppResult<Migrated> {
    let mut version = schema_version_of(&doc)?;
    let mut applied = Vec::new();

    let object = doc
        .as_object_mut()
        .ok_or_else(|| AppError::corrupt_record("record document is not a JSON object"))?;

    while version < CURRENT_SCHEMA_VERSION {
        let step = STEPS.iter().find(|s| s.from == version).ok_or_else(|| {
            AppError::corrupt_record(format!("no migration step from schema_version {version}"))
        })?;
        step.apply(object);
        applied.push((step.from, step.to));
        version = step.to;
    }

    Ok(Migrated {
        document: doc,
        applied,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v1_doc() -> Value {
        json!({
            "schema_version": 1,
            "job_id": "legacy-1",
            "status": "created",
            "created_at": "2023-05-01T12:00:00Z",
            "requirement": "t-test on weight by group"
        })
    }

    #[test]
    fn test_steps_cover_every_version() {
        let mut expected_from = LEGACY_SCHEMA_VERSION;
        for step in STEPS {
            assert_eq!(step.from, expected_from);
            assert_eq!(step.to, step.from + 1);
            expected_from = step.to;
        }
        assert_eq!(expected_from, CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn test_v1_migrates_through_every_step() {
        let migrated = migrate(v1_doc()).unwrap();
        assert_eq!(migrated.applied, vec![(1, 2), (2, 3)]);

        let doc = migrated.document;
        assert_eq!(doc["schema_version"], json!(3));
        assert_eq!(doc["version"], json!(1));
        assert_eq!(doc["runs"], json!([]));
        assert_eq!(doc["artifacts_index"], json!([]));
        assert_eq!(doc["requirement"], json!("t-test on weight by group"));
    }

    #[test]
    fn test_v2_runs_only_last_step_and_keeps_version() {
        let mut doc = v1_doc();
        doc["schema_version"] = json!(2);
        doc["version"] = json!(7);

        let migrated = migrate(doc).unwrap();
        assert_eq!(migrated.applied, vec![(2, 3)]);
        assert_eq!(migrated.document["version"], json!(7));
    }

    #[test]
    fn test_existing_runs_are_kept() {
        let mut doc = v1_doc();
        doc["schema_version"] = json!(2);
        doc["version"] = json!(1);
        doc["runs"] = json!([{"note": "kept"}]);

        let migrated = migrate(doc).unwrap();
        assert_eq!(migrated.document["runs"], json!([{"note": "kept"}]));
    }

    #[test]
    fn test_current_document_is_untouched() {
        let first = migrate(v1_doc()).unwrap();
        let second = migrate(first.document.clone()).unwrap();
        assert!(!second.changed());
        assert_eq!(second.document, first.document);
    }

    #[test]
    fn test_missing_schema_version_is_legacy() {
        let mut doc = v1_doc();
        doc.as_object_mut().unwrap().remove("schema_version");
        assert_eq!(schema_version_of(&doc).unwrap(), 1);
        assert_eq!(migrate(doc).unwrap().applied.len(), 2);
    }

    #[test]
    fn test_rejects_invalid_versions() {
        for bad in [json!(0), json!(99), json!("three"), json!(-1)] {
            let mut doc = v1_doc();
            doc["schema_version"] = bad;
            assert!(migrate(doc).is_err());
        }
        assert!(migrate(json!(["not", "an", "object"])).is_err());
    }
}
