//! Custom attribute annotations on reconstructed entities.
//!
//! Reconstruction does not decode attribute constructor blobs. Attributes are
//! carried in a simplified named-field form, which is also the form the
//! injected provenance attributes use: every argument is a named field with a
//! pre-rendered string value.

use std::sync::Arc;

use crate::metadata::typesystem::ManagedTypeRef;

/// A vector that holds a list of `CustomAttribute`
pub type CustomAttributeList = Arc<boxcar::Vec<CustomAttribute>>;

/// A single named argument of a custom attribute.
#[derive(Debug, Clone)]
pub struct CustomAttributeArgument {
    /// Name of the attribute field being assigned
    pub name: String,
    /// Rendered value, e.g. `0x1234` for provenance addresses
    pub value: String,
}

/// A custom attribute instance attached to a type, field, method, property or event.
pub struct CustomAttribute {
    /// The attribute type
    pub attribute_type: ManagedTypeRef,
    /// Named field assignments
    pub fields: Vec<CustomAttributeArgument>,
}

impl CustomAttribute {
    /// Create a new attribute instance with no arguments
    #[must_use]
    pub fn new(attribute_type: ManagedTypeRef) -> Self {
        Self {
            attribute_type,
            fields: Vec::new(),
        }
    }

    /// Adds a named field assignment
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(CustomAttributeArgument {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Looks up the value of a named field
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }
}
