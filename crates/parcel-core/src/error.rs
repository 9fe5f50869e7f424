use std::fmt;

/// Machine-readable error codes shared by every engine error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    ProfileLoadFailed,
    ProfileInvalid,
    InvalidReference,
    DuplicateArtifactId,
    ArtifactNotFound,
    PropertyKindMismatch,
    RootReferenceMismatch,
    TreeStructureInvalid,
    NodeNotFound,
    TransformNotApplicable,
    MissingGrandparent,
    MissingResultParentType,
    TypeAssignmentFailed,
    UnknownNodeType,
    UnknownTransform,
    InvalidNavigation,
    StaleRebuild,
    SerializationFailed,
    IoFailed,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::ProfileLoadFailed => "E1002",
            Self::ProfileInvalid => "E1003",
            Self::InvalidReference => "E2001",
            Self::DuplicateArtifactId => "E2002",
            Self::ArtifactNotFound => "E2003",
            Self::PropertyKindMismatch => "E2004",
            Self::RootReferenceMismatch => "E2005",
            Self::TreeStructureInvalid => "E3001",
            Self::NodeNotFound => "E3002",
            Self::TransformNotApplicable => "E3003",
            Self::MissingGrandparent => "E3004",
            Self::MissingResultParentType => "E3005",
            Self::TypeAssignmentFailed => "E3006",
            Self::UnknownNodeType => "E3007",
            Self::UnknownTransform => "E3008",
            Self::InvalidNavigation => "E4001",
            Self::StaleRebuild => "E4002",
            Self::SerializationFailed => "E5001",
            Self::IoFailed => "E5002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Numeric form of [`ErrorCode::code`], for callers that key on integers.
    #[must_use]
    pub const fn number(self) -> u16 {
        match self {
            Self::ConfigParseError => 1001,
            Self::ProfileLoadFailed => 1002,
            Self::ProfileInvalid => 1003,
            Self::InvalidReference => 2001,
            Self::DuplicateArtifactId => 2002,
            Self::ArtifactNotFound => 2003,
            Self::PropertyKindMismatch => 2004,
            Self::RootReferenceMismatch => 2005,
            Self::TreeStructureInvalid => 3001,
            Self::NodeNotFound => 3002,
            Self::TransformNotApplicable => 3003,
            Self::MissingGrandparent => 3004,
            Self::MissingResultParentType => 3005,
            Self::TypeAssignmentFailed => 3006,
            Self::UnknownNodeType => 3007,
            Self::UnknownTransform => 3008,
            Self::InvalidNavigation => 4001,
            Self::StaleRebuild => 4002,
            Self::SerializationFailed => 5001,
            Self::IoFailed => 5002,
            Self::InternalUnexpected => 9001,
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::ProfileLoadFailed => "Domain profile could not be loaded",
            Self::ProfileInvalid => "Domain profile is inconsistent",
            Self::InvalidReference => "Invalid artifact reference",
            Self::DuplicateArtifactId => "Duplicate artifact id",
            Self::ArtifactNotFound => "Artifact not found",
            Self::PropertyKindMismatch => "Property value of the wrong kind",
            Self::RootReferenceMismatch => "Root artifact reference does not match",
            Self::TreeStructureInvalid => "Content tree structure is invalid",
            Self::NodeNotFound => "Node not found",
            Self::TransformNotApplicable => "Transform not applicable",
            Self::MissingGrandparent => "Node has no grandparent",
            Self::MissingResultParentType => "Transform names no parent type to insert",
            Self::TypeAssignmentFailed => "No legal node type assignment",
            Self::UnknownNodeType => "Node type not defined by the profile",
            Self::UnknownTransform => "Transform not defined by the profile",
            Self::InvalidNavigation => "Wizard navigation out of range",
            Self::StaleRebuild => "Rebuilt tree is out of date",
            Self::SerializationFailed => "Serialization failed",
            Self::IoFailed => "I/O failure",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to the presentation layer.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in .parcel/config.toml and retry."),
            Self::ProfileLoadFailed => Some("Check the profile path and file format (JSON or YAML)."),
            Self::ProfileInvalid => {
                Some("Every referenced node type and property type must be declared.")
            }
            Self::InvalidReference => Some("Use an absolute URI such as file:///path/to/item."),
            Self::DuplicateArtifactId => Some("Assign a unique id to every artifact."),
            Self::ArtifactNotFound | Self::NodeNotFound => None,
            Self::PropertyKindMismatch => {
                Some("A property is either simple or grouped; do not mix value kinds.")
            }
            Self::RootReferenceMismatch => {
                Some("Point the root reference at exactly one artifact.")
            }
            Self::TreeStructureInvalid => {
                Some("Every artifact must reach the root through hierarchical relationships.")
            }
            Self::TransformNotApplicable => Some("Choose one of the transforms offered for the node."),
            Self::MissingGrandparent => Some("The node must sit at least two levels below the root."),
            Self::MissingResultParentType => {
                Some("Declare a node type in the transform's result parent constraint.")
            }
            Self::TypeAssignmentFailed => {
                Some("Restructure the content or pick a profile that admits this shape.")
            }
            Self::UnknownNodeType => Some("Pick one of the node types offered for the node."),
            Self::UnknownTransform => Some("Refresh the offered transforms and pick again."),
            Self::InvalidNavigation => Some("Only move between pages the current flow offers."),
            Self::StaleRebuild => Some("Request a new rebuild of the current package."),
            Self::SerializationFailed | Self::IoFailed => {
                Some("Check the file location and permissions, then retry.")
            }
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Tool-level failure surfaced to the presentation layer.
///
/// Every module error converts into this type, keeping its stable code and
/// rendering its own detail as the message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ToolError {
    pub code: ErrorCode,
    pub message: String,
}

impl ToolError {
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Remediation hint for this error's code.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code.hint()
    }
}

impl From<std::io::Error> for ToolError {
    fn from(err: std::io::Error) -> Self {
        Self::new(ErrorCode::IoFailed, err.to_string())
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(ErrorCode::SerializationFailed, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorCode, ToolError};
    use std::collections::HashSet;

    const ALL: [ErrorCode; 21] = [
        ErrorCode::ConfigParseError,
        ErrorCode::ProfileLoadFailed,
        ErrorCode::ProfileInvalid,
        ErrorCode::InvalidReference,
        ErrorCode::DuplicateArtifactId,
        ErrorCode::ArtifactNotFound,
        ErrorCode::PropertyKindMismatch,
        ErrorCode::RootReferenceMismatch,
        ErrorCode::TreeStructureInvalid,
        ErrorCode::NodeNotFound,
        ErrorCode::TransformNotApplicable,
        ErrorCode::MissingGrandparent,
        ErrorCode::MissingResultParentType,
        ErrorCode::TypeAssignmentFailed,
        ErrorCode::UnknownNodeType,
        ErrorCode::UnknownTransform,
        ErrorCode::InvalidNavigation,
        ErrorCode::StaleRebuild,
        ErrorCode::SerializationFailed,
        ErrorCode::IoFailed,
        ErrorCode::InternalUnexpected,
    ];

    #[test]
    fn all_codes_are_unique() {
        let mut seen = HashSet::new();
        for code in ALL {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::TransformNotApplicable.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn numeric_code_matches_string_code() {
        for code in ALL {
            assert_eq!(format!("E{}", code.number()), code.code());
        }
    }

    #[test]
    fn tool_error_renders_code_and_message() {
        let err = ToolError::new(ErrorCode::MissingGrandparent, "node 'a' is a root");
        assert_eq!(err.to_string(), "E3004: node 'a' is a root");
        assert!(err.hint().is_some());
    }
}
