use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use super::{ProfileError, PropertyTypeId};

/// The kind of value a property type holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyValueType {
    String,
    Long,
    DateTime,
    Complex,
    Uri,
}

/// Presentation hint refining a value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyValueHint {
    Email,
    Phone,
    Url,
    FileSize,
    DateTime,
    Text,
}

/// Minimum and optional maximum occurrence count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cardinality {
    #[serde(default)]
    pub min: u32,
    #[serde(default)]
    pub max: Option<u32>,
}

impl Cardinality {
    #[must_use]
    pub const fn exactly(count: u32) -> Self {
        Self {
            min: count,
            max: Some(count),
        }
    }

    #[must_use]
    pub const fn at_least(min: u32) -> Self {
        Self { min, max: None }
    }

    #[must_use]
    pub const fn optional() -> Self {
        Self {
            min: 0,
            max: Some(1),
        }
    }

    #[must_use]
    pub const fn unbounded() -> Self {
        Self { min: 0, max: None }
    }

    /// Whether `count` occurrences fall within the bounds.
    #[must_use]
    pub fn admits(&self, count: usize) -> bool {
        let count = u64::try_from(count).unwrap_or(u64::MAX);
        count >= u64::from(self.min) && self.max.is_none_or(|max| count <= u64::from(max))
    }
}

/// Occurrence bounds for one property type on a node type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyConstraint {
    pub property_type: PropertyTypeId,
    pub cardinality: Cardinality,
}

impl PropertyConstraint {
    #[must_use]
    pub fn new(property_type: impl Into<PropertyTypeId>, cardinality: Cardinality) -> Self {
        Self {
            property_type: property_type.into(),
            cardinality,
        }
    }
}

/// Declaration of a property: value kind, hint, and sub-properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyType {
    pub id: PropertyTypeId,
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
    pub value_type: PropertyValueType,
    #[serde(default)]
    pub value_hint: Option<PropertyValueHint>,
    #[serde(default)]
    pub read_only: bool,
    /// Sub-properties of a complex (grouped) property.
    #[serde(default)]
    pub sub_types: Vec<PropertyConstraint>,
    /// Closed vocabulary; empty means any value of the declared kind.
    #[serde(default)]
    pub allowed_values: Vec<String>,
}

impl PropertyType {
    #[must_use]
    pub fn new(
        id: impl Into<PropertyTypeId>,
        label: impl Into<String>,
        value_type: PropertyValueType,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: None,
            value_type,
            value_hint: None,
            read_only: false,
            sub_types: Vec::new(),
            allowed_values: Vec::new(),
        }
    }

    #[must_use]
    pub const fn with_hint(mut self, hint: PropertyValueHint) -> Self {
        self.value_hint = Some(hint);
        self
    }

    #[must_use]
    pub const fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    #[must_use]
    pub fn with_sub_type(mut self, constraint: PropertyConstraint) -> Self {
        self.sub_types.push(constraint);
        self
    }

    #[must_use]
    pub fn has_sub_types(&self) -> bool {
        !self.sub_types.is_empty()
    }

    /// Complex properties are stored on artifacts as value groups.
    #[must_use]
    pub fn is_complex(&self) -> bool {
        self.value_type == PropertyValueType::Complex
    }
}

/// Display grouping of property types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyCategory {
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub property_types: Vec<PropertyTypeId>,
}

/// A single typed value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    String(String),
    Long(i64),
    DateTime(DateTime<Utc>),
    Uri(Url),
    Complex(Vec<Property>),
}

impl PropertyValue {
    #[must_use]
    pub const fn value_type(&self) -> PropertyValueType {
        match self {
            Self::String(_) => PropertyValueType::String,
            Self::Long(_) => PropertyValueType::Long,
            Self::DateTime(_) => PropertyValueType::DateTime,
            Self::Uri(_) => PropertyValueType::Uri,
            Self::Complex(_) => PropertyValueType::Complex,
        }
    }

    /// Text form stored on package artifacts. Complex values have none.
    #[must_use]
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::String(s) => Some(s.clone()),
            Self::Long(n) => Some(n.to_string()),
            Self::DateTime(ts) => Some(ts.to_rfc3339()),
            Self::Uri(u) => Some(u.to_string()),
            Self::Complex(_) => None,
        }
    }
}

/// A property instance: exactly one value consistent with its type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub property_type: PropertyTypeId,
    pub value: PropertyValue,
}

impl Property {
    /// Build a property, failing if `value` is not of the declared kind.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::ValueKind`] on a kind mismatch.
    pub fn new(property_type: &PropertyType, value: PropertyValue) -> Result<Self, ProfileError> {
        let actual = value.value_type();
        if actual != property_type.value_type {
            return Err(ProfileError::ValueKind {
                property: property_type.id.clone(),
                expected: property_type.value_type,
                actual,
            });
        }
        Ok(Self {
            property_type: property_type.id.clone(),
            value,
        })
    }

    /// Build a property without a declaration at hand. Kinds are checked
    /// later, when the owning profile document is validated.
    #[must_use]
    pub fn unchecked(property_type: impl Into<PropertyTypeId>, value: PropertyValue) -> Self {
        Self {
            property_type: property_type.into(),
            value,
        }
    }

    fn mismatch(&self, expected: PropertyValueType) -> ProfileError {
        ProfileError::ValueKind {
            property: self.property_type.clone(),
            expected,
            actual: self.value.value_type(),
        }
    }

    /// # Errors
    ///
    /// Returns [`ProfileError::ValueKind`] unless the value is a string.
    pub fn as_str(&self) -> Result<&str, ProfileError> {
        match &self.value {
            PropertyValue::String(s) => Ok(s),
            _ => Err(self.mismatch(PropertyValueType::String)),
        }
    }

    /// # Errors
    ///
    /// Returns [`ProfileError::ValueKind`] unless the value is a long.
    pub fn as_long(&self) -> Result<i64, ProfileError> {
        match &self.value {
            PropertyValue::Long(n) => Ok(*n),
            _ => Err(self.mismatch(PropertyValueType::Long)),
        }
    }

    /// # Errors
    ///
    /// Returns [`ProfileError::ValueKind`] unless the value is a timestamp.
    pub fn as_date_time(&self) -> Result<DateTime<Utc>, ProfileError> {
        match &self.value {
            PropertyValue::DateTime(ts) => Ok(*ts),
            _ => Err(self.mismatch(PropertyValueType::DateTime)),
        }
    }

    /// # Errors
    ///
    /// Returns [`ProfileError::ValueKind`] unless the value is a URI.
    pub fn as_uri(&self) -> Result<&Url, ProfileError> {
        match &self.value {
            PropertyValue::Uri(u) => Ok(u),
            _ => Err(self.mismatch(PropertyValueType::Uri)),
        }
    }

    /// # Errors
    ///
    /// Returns [`ProfileError::ValueKind`] unless the value is complex.
    pub fn sub_properties(&self) -> Result<&[Property], ProfileError> {
        match &self.value {
            PropertyValue::Complex(subs) => Ok(subs),
            _ => Err(self.mismatch(PropertyValueType::Complex)),
        }
    }
}
