//! Caller-supplied description of one import.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Source image and destination tree for one import.
///
/// Credentials are all-or-nothing: [`ImageReference::credentials`] only
/// yields a pair when both keys are present and non-empty.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReference {
    /// Registry URL understood by the fetch tool, e.g. `docker://quay.io/kubevirt/fedora:31`.
    pub source_url: String,

    /// Directory the composed root filesystem is written into.
    pub destination: PathBuf,

    #[serde(default)]
    pub access_key: Option<String>,

    #[serde(default)]
    pub secret_key: Option<String>,
}

/// A complete credential pair.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Credentials<'a> {
    pub access_key: &'a str,
    pub secret_key: &'a str,
}

impl ImageReference {
    pub fn new(source_url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source_url: source_url.into(),
            destination: destination.into(),
            access_key: None,
            secret_key: None,
        }
    }

    pub fn with_credentials(
        mut self,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.access_key = Some(access_key.into());
        self.secret_key = Some(secret_key.into());
        self
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// The credential pair, or `None` if either side is missing or empty.
    pub fn credentials(&self) -> Option<Credentials<'_>> {
        match (self.access_key.as_deref(), self.secret_key.as_deref()) {
            (Some(access_key), Some(secret_key))
                if !access_key.is_empty() && !secret_key.is_empty() =>
            {
                Some(Credentials {
                    access_key,
                    secret_key,
                })
            }
            _ => None,
        }
    }
}

impl fmt::Debug for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageReference")
            .field("source_url", &self.source_url)
            .field("destination", &self.destination)
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "***"))
            .finish()
    }
}

impl fmt::Debug for Credentials<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"***")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> ImageReference {
        ImageReference::new("docker://registry.local/img", "/dest")
    }

    #[test]
    fn test_credentials_require_both_sides() {
        assert!(reference().credentials().is_none());
        assert!(reference().with_credentials("", "secret").credentials().is_none());
        assert!(reference().with_credentials("user", "").credentials().is_none());

        let mut one_sided = reference();
        one_sided.access_key = Some("user".into());
        assert!(one_sided.credentials().is_none());

        let creds = reference().with_credentials("user", "secret");
        let pair = creds.credentials().expect("both sides present");
        assert_eq!(pair.access_key, "user");
        assert_eq!(pair.secret_key, "secret");
    }

    #[test]
    fn test_debug_hides_secret() {
        let debug = format!("{:?}", reference().with_credentials("user", "hunter2"));
        assert!(debug.contains("user"));
        assert!(!debug.contains("hunter2"));

        let r = reference().with_credentials("user", "hunter2");
        let debug = format!("{:?}", r.credentials().unwrap());
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_deserialize_without_credentials() {
        let json = r#"{"source_url": "docker://a/b", "destination": "/data"}"#;
        let r: ImageReference = serde_json::from_str(json).unwrap();
        assert_eq!(r.destination(), Path::new("/data"));
        assert!(r.credentials().is_none());
    }
}
