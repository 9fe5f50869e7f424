//! The built-in business-object profile.
//!
//! ```text
//! Project
//!   ├── Collection ─┬── Collection ...
//!   │               ├── DataItem ─┬── DataFile
//!   │               │             └── Metadata
//!   │               └── Metadata
//!   └── DataItem / Metadata
//! ```

use anyhow::{Context, Result};

use super::DomainProfile;

pub const BUSINESS_OBJECT_PROFILE_ID: &str = "urn:parcel:profile:business-object";

const BUSINESS_OBJECT_JSON: &str = include_str!("../../profiles/business-object.json");

pub mod node_types {
    pub const PROJECT: &str = "Project";
    pub const COLLECTION: &str = "Collection";
    pub const DATA_ITEM: &str = "DataItem";
    pub const DATA_FILE: &str = "DataFile";
    pub const METADATA: &str = "Metadata";
}

pub mod properties {
    pub const TITLE: &str = "title";
    pub const DESCRIPTION: &str = "description";
    pub const PUBLISHER: &str = "publisher";
    pub const CREATOR: &str = "creator";
    pub const CREATOR_NAME: &str = "creatorName";
    pub const CREATOR_EMAIL: &str = "creatorEmail";
    pub const CREATOR_PHONE: &str = "creatorPhone";
    pub const CREATOR_PAGE: &str = "creatorPage";
    pub const CREATED: &str = "created";
    pub const SIZE: &str = "size";
    pub const HOMEPAGE: &str = "homepage";
}

/// Parse the embedded business-object profile.
///
/// # Errors
///
/// Returns an error if the embedded definition fails validation, which
/// indicates a packaging defect rather than a user error.
pub fn business_object_profile() -> Result<DomainProfile> {
    serde_json::from_str(BUSINESS_OBJECT_JSON).context("parse built-in business-object profile")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::FileRequirement;

    #[test]
    fn builtin_profile_loads() {
        let profile = business_object_profile().expect("built-in profile");
        assert_eq!(profile.id().as_str(), BUSINESS_OBJECT_PROFILE_ID);
        assert_eq!(profile.node_types().len(), 5);
        assert_eq!(profile.node_transforms().len(), 6);

        let project = profile.node_type(node_types::PROJECT).expect("project");
        assert!(project.can_be_root());
        assert_eq!(project.profile().as_str(), BUSINESS_OBJECT_PROFILE_ID);

        let file = profile.node_type(node_types::DATA_FILE).expect("data file");
        assert_eq!(file.file_requirement, FileRequirement::Required);
        assert!(file.is_inheritable(properties::DESCRIPTION));

        let item = profile.node_type(node_types::DATA_ITEM).expect("data item");
        assert!(!item.is_inheritable(properties::DESCRIPTION));
        assert!(item.is_inheritable(properties::PUBLISHER));
    }

    #[test]
    fn creator_is_a_complex_property() {
        let profile = business_object_profile().expect("built-in profile");
        let creator = profile
            .property_type(properties::CREATOR)
            .expect("creator");
        assert!(creator.is_complex());
        assert_eq!(creator.sub_types.len(), 4);
    }
}
