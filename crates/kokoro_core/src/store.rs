//! Versioned document persistence with atomic replace.
//!
//! The persona's durable state lives in three JSON documents (desires,
//! memories, persona), each tagged with a schema version. Writes always go
//! write-new-then-rename so a crash mid-write can never corrupt a document.
//! A failed write is retried once, then surfaced — never leaving a partial
//! file behind.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CoreError;

/// A persisted top-level document.
pub trait Document: Serialize + DeserializeOwned {
    /// Short name used in logs and error messages.
    const KIND: &'static str;
    /// Highest schema version this build understands.
    const SCHEMA_VERSION: u32;

    fn schema_version(&self) -> u32;
}

/// Load a document, returning `Ok(None)` when the file does not exist.
///
/// A file that exists but cannot be parsed, or that carries a schema version
/// newer than this build, is a fatal configuration error.
pub fn load_document<T: Document>(path: &Path) -> Result<Option<T>, CoreError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(CoreError::Persistence {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
        }
    };

    let doc: T = serde_json::from_str(&raw).map_err(|e| {
        CoreError::Config(format!(
            "malformed {} document at {}: {}",
            T::KIND,
            path.display(),
            e
        ))
    })?;

    if doc.schema_version() > T::SCHEMA_VERSION {
        return Err(CoreError::Config(format!(
            "{} document at {} has schema version {} but this build supports up to {}",
            T::KIND,
            path.display(),
            doc.schema_version(),
            T::SCHEMA_VERSION
        )));
    }

    Ok(Some(doc))
}

/// Load a document, seeding (and persisting) a default when none exists.
pub fn load_or_seed<T, F>(path: &Path, seed: F) -> Result<T, CoreError>
where
    T: Document,
    F: FnOnce() -> T,
{
    if let Some(doc) = load_document::<T>(path)? {
        return Ok(doc);
    }
    tracing::info!(kind = T::KIND, path = %path.display(), "seeding default document");
    let doc = seed();
    save_document(path, &doc)?;
    Ok(doc)
}

/// Persist a document atomically: serialize, write a sibling temp file,
/// rename into place. The write is retried once before the error surfaces.
pub fn save_document<T: Document>(path: &Path, doc: &T) -> Result<(), CoreError> {
    let json = serde_json::to_string_pretty(doc).map_err(|e| CoreError::Persistence {
        path: path.to_path_buf(),
        message: format!("serialization failed: {}", e),
    })?;

    match write_replace(path, &json) {
        Ok(()) => Ok(()),
        Err(first) => {
            tracing::warn!(
                kind = T::KIND,
                path = %path.display(),
                error = %first,
                "document write failed, retrying once"
            );
            write_replace(path, &json).map_err(|e| CoreError::Persistence {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
        }
    }
}

fn write_replace(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = tmp_path(path);
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize)]
    struct TestDoc {
        schema_version: u32,
        payload: String,
    }

    impl Document for TestDoc {
        const KIND: &'static str = "test";
        const SCHEMA_VERSION: u32 = 2;

        fn schema_version(&self) -> u32 {
            self.schema_version
        }
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("doc.json");

        let doc = TestDoc {
            schema_version: 2,
            payload: "hello".into(),
        };
        save_document(&path, &doc).unwrap();

        let loaded: TestDoc = load_document(&path).unwrap().unwrap();
        assert_eq!(loaded.payload, "hello");
        // No temp file left behind.
        assert!(!tmp_path(&path).exists());
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::TempDir::new().unwrap();
        let loaded: Option<TestDoc> = load_document(&dir.path().join("nope.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_malformed_document_is_config_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("doc.json");
        fs::write(&path, "{ not json").unwrap();

        let err = load_document::<TestDoc>(&path).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn test_future_schema_version_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("doc.json");
        fs::write(&path, r#"{"schema_version": 99, "payload": "x"}"#).unwrap();

        let err = load_document::<TestDoc>(&path).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn test_older_schema_version_accepted() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("doc.json");
        fs::write(&path, r#"{"schema_version": 1, "payload": "old"}"#).unwrap();

        let loaded: TestDoc = load_document(&path).unwrap().unwrap();
        assert_eq!(loaded.schema_version, 1);
    }

    #[test]
    fn test_load_or_seed_creates_default() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("seeded.json");

        let doc: TestDoc = load_or_seed(&path, || TestDoc {
            schema_version: 2,
            payload: "seed".into(),
        })
        .unwrap();
        assert_eq!(doc.payload, "seed");
        assert!(path.exists());
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested/deep/doc.json");
        let doc = TestDoc {
            schema_version: 2,
            payload: "x".into(),
        };
        save_document(&path, &doc).unwrap();
        assert!(path.exists());
    }
}
