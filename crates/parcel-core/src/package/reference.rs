use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ErrorCode, ToolError};

/// Schemes that resolve to a fetchable location.
const LOCATABLE_SCHEMES: [&str; 5] = ["file", "http", "https", "ftp", "jar"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReferenceError {
    #[error("artifact reference is empty")]
    Empty,

    #[error("artifact reference '{reference}' contains an illegal character at byte {position}")]
    IllegalCharacter { reference: String, position: usize },

    #[error("artifact reference '{reference}' is not an absolute URI: {reason}")]
    Malformed { reference: String, reason: String },

    #[error("artifact reference '{reference}' uses scheme '{scheme}', which has no locator")]
    UnsupportedScheme { reference: String, scheme: String },

    #[error("path '{0}' cannot be expressed as a file URI")]
    NotAbsolutePath(PathBuf),
}

impl ReferenceError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::InvalidReference
    }
}

impl From<ReferenceError> for ToolError {
    fn from(err: ReferenceError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

/// A validated pointer from an artifact to its file or directory.
///
/// The string, URI, and URL views are checked together at construction:
/// the string must parse as an absolute URI and the URI must use a
/// locatable scheme. A reference that exists is always usable as all three.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtifactReference {
    raw: String,
    uri: Url,
}

impl ArtifactReference {
    /// # Errors
    ///
    /// Returns a [`ReferenceError`] if `reference` is empty, contains
    /// whitespace or control characters, is not an absolute URI, or uses a
    /// scheme without a locator.
    pub fn parse(reference: impl Into<String>) -> Result<Self, ReferenceError> {
        let raw = reference.into();
        if raw.is_empty() {
            return Err(ReferenceError::Empty);
        }
        if let Some(position) = raw.find(|c: char| c.is_whitespace() || c.is_control()) {
            return Err(ReferenceError::IllegalCharacter {
                reference: raw,
                position,
            });
        }

        let uri = match Url::parse(&raw) {
            Ok(uri) => uri,
            Err(err) => {
                return Err(ReferenceError::Malformed {
                    reference: raw,
                    reason: err.to_string(),
                });
            }
        };

        if !LOCATABLE_SCHEMES.contains(&uri.scheme()) {
            let scheme = uri.scheme().to_string();
            return Err(ReferenceError::UnsupportedScheme {
                reference: raw,
                scheme,
            });
        }

        Ok(Self { raw, uri })
    }

    /// Reference to a local file or directory.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::NotAbsolutePath`] for relative paths.
    pub fn from_path(path: &Path) -> Result<Self, ReferenceError> {
        let uri = Url::from_file_path(path)
            .map_err(|()| ReferenceError::NotAbsolutePath(path.to_path_buf()))?;
        Ok(Self {
            raw: uri.to_string(),
            uri,
        })
    }

    /// The reference exactly as supplied.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The parsed URI; also usable as a locator.
    #[must_use]
    pub const fn uri(&self) -> &Url {
        &self.uri
    }

    #[must_use]
    pub fn scheme(&self) -> &str {
        self.uri.scheme()
    }

    /// Local path for `file:` references.
    #[must_use]
    pub fn file_path(&self) -> Option<PathBuf> {
        if self.uri.scheme() != "file" {
            return None;
        }
        self.uri.to_file_path().ok()
    }
}

impl fmt::Display for ArtifactReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<String> for ArtifactReference {
    type Error = ReferenceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl TryFrom<&str> for ArtifactReference {
    type Error = ReferenceError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ArtifactReference> for String {
    fn from(reference: ArtifactReference) -> Self {
        reference.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_reference_views_agree() {
        let reference = ArtifactReference::parse("file:///tmp/x").expect("valid reference");
        assert_eq!(reference.as_str(), "file:///tmp/x");
        assert_eq!(reference.uri().as_str(), reference.as_str());
        assert_eq!(reference.file_path(), Some(PathBuf::from("/tmp/x")));
        assert_eq!(
            Url::parse(reference.as_str()).expect("reparse"),
            *reference.uri()
        );
    }

    #[test]
    fn spaces_without_scheme_are_rejected() {
        let err = ArtifactReference::parse("not a uri").unwrap_err();
        assert!(matches!(err, ReferenceError::IllegalCharacter { position: 3, .. }));
        assert_eq!(err.code(), ErrorCode::InvalidReference);
    }

    #[test]
    fn relative_and_unlocatable_references_are_rejected() {
        assert!(matches!(
            ArtifactReference::parse("data/file.csv"),
            Err(ReferenceError::Malformed { .. })
        ));
        assert!(matches!(
            ArtifactReference::parse("urn:isbn:0451450523"),
            Err(ReferenceError::UnsupportedScheme { .. })
        ));
        assert_eq!(ArtifactReference::parse(""), Err(ReferenceError::Empty));
    }

    #[test]
    fn http_reference_has_no_file_path() {
        let reference = ArtifactReference::parse("https://example.org/a").expect("valid");
        assert_eq!(reference.scheme(), "https");
        assert_eq!(reference.file_path(), None);
    }

    #[test]
    fn from_path_requires_absolute_path() {
        assert!(ArtifactReference::from_path(Path::new("relative/file")).is_err());
        let reference = ArtifactReference::from_path(Path::new("/srv/data")).expect("abs path");
        assert_eq!(reference.as_str(), "file:///srv/data");
    }

    #[test]
    fn serde_rejects_invalid_reference() {
        let ok: ArtifactReference =
            serde_json::from_str("\"file:///tmp/x\"").expect("valid reference");
        assert_eq!(ok.as_str(), "file:///tmp/x");
        assert!(serde_json::from_str::<ArtifactReference>("\"no scheme\"").is_err());
    }
}
