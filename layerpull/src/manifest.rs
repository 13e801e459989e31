//! Image manifest parsing: ordered layer digests.

use crate::error::{ImportError, ImportResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Manifest file written by the fetch tool into its `dir:` layout.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Ordered layer list. Order is composition order and is never changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub layers: Vec<LayerRef>,
}

/// One layer, identified by its content digest (`<algorithm>:<hex>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerRef {
    pub digest: String,
}

impl LayerRef {
    pub fn new(digest: impl Into<String>) -> Self {
        Self {
            digest: digest.into(),
        }
    }

    /// Blob file name: the digest with its algorithm prefix stripped.
    ///
    /// A digest without a `:` is used as-is.
    pub fn blob_name(&self) -> &str {
        match self.digest.split_once(':') {
            Some((_, encoded)) => encoded,
            None => &self.digest,
        }
    }

    /// Reject blob names that would resolve outside the fetch directory.
    fn validate(&self) -> Result<(), String> {
        let name = self.blob_name();
        if name.is_empty() || name == "." || name == ".." || name.contains('/') {
            return Err(format!("invalid layer digest {:?}", self.digest));
        }
        Ok(())
    }
}

impl Manifest {
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Decode manifest JSON. `path` is only used for error context.
    pub fn from_slice(bytes: &[u8], path: &Path) -> ImportResult<Self> {
        let manifest: Manifest = serde_json::from_slice(bytes)
            .map_err(|e| ImportError::manifest_malformed(path, e))?;

        for layer in &manifest.layers {
            layer
                .validate()
                .map_err(|reason| ImportError::manifest_malformed(path, reason))?;
        }
        Ok(manifest)
    }
}

/// Read and decode `<temp_dir>/manifest.json`.
///
/// Blob existence is not checked here; a missing blob fails its layer's extraction.
pub fn parse_manifest(temp_dir: &Path) -> ImportResult<Manifest> {
    let path = temp_dir.join(MANIFEST_FILE);
    let bytes = std::fs::read(&path).map_err(|source| ImportError::ManifestUnreadable {
        path: path.clone(),
        source,
    })?;

    let manifest = Manifest::from_slice(&bytes, &path)?;
    tracing::debug!(
        path = %path.display(),
        layers = manifest.len(),
        "Parsed image manifest"
    );
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_manifest(dir: &Path, content: &str) {
        std::fs::write(dir.join(MANIFEST_FILE), content).unwrap();
    }

    #[test]
    fn test_parse_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(
            dir.path(),
            r#"{
                "schemaVersion": 2,
                "config": {"digest": "sha256:cfg"},
                "layers": [
                    {"digest": "sha256:ccc", "size": 10},
                    {"digest": "sha256:aaa"},
                    {"digest": "sha256:bbb"}
                ]
            }"#,
        );

        let manifest = parse_manifest(dir.path()).unwrap();
        let names: Vec<&str> = manifest.layers.iter().map(|l| l.blob_name()).collect();
        assert_eq!(names, vec!["ccc", "aaa", "bbb"]);
    }

    #[test]
    fn test_missing_manifest_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let err = parse_manifest(dir.path()).unwrap_err();
        match err {
            ImportError::ManifestUnreadable { path, .. } => {
                assert_eq!(path, dir.path().join(MANIFEST_FILE));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_malformed_manifests() {
        let cases = [
            "not json",
            r#"{"schemaVersion": 2}"#,
            r#"{"layers": [{"size": 3}]}"#,
            r#"{"layers": "sha256:aaa"}"#,
            r#"{"layers": [{"digest": "sha256:../../etc"}]}"#,
            r#"{"layers": [{"digest": "sha256:"}]}"#,
        ];

        for content in cases {
            let dir = tempfile::tempdir().unwrap();
            write_manifest(dir.path(), content);
            let err = parse_manifest(dir.path()).unwrap_err();
            assert!(
                matches!(err, ImportError::ManifestMalformed { .. }),
                "{content}: {err:?}"
            );
        }
    }

    #[test]
    fn test_empty_layer_list() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), r#"{"layers": []}"#);
        assert!(parse_manifest(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_blob_name() {
        assert_eq!(LayerRef::new("sha256:abc123").blob_name(), "abc123");
        assert_eq!(LayerRef::new("sha512:def").blob_name(), "def");
        assert_eq!(LayerRef::new("abc123").blob_name(), "abc123");
    }
}
