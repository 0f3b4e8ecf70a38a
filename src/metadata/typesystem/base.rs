use std::{sync::Arc, sync::Weak};

use crate::metadata::{
    token::Token,
    typesystem::{ManagedType, ManagedTypeRc, PrimitiveKind},
};

/// A vector that holds `ManagedTypeRef` instances (weak references)
pub type ManagedTypeRefList = Arc<boxcar::Vec<ManagedTypeRef>>;

/// A smart reference to a `ManagedType` that automatically handles weak references
/// to prevent circular reference memory leaks while providing a clean API.
///
/// The reconstructed type graph is intentionally cyclic (base types, interfaces,
/// field and parameter types, overrides all cross-reference each other), so every
/// cross-type link is a `ManagedTypeRef` while the [`crate::metadata::typesystem::TypeRegistry`]
/// holds the only strong references.
#[derive(Clone, Debug)]
pub struct ManagedTypeRef {
    weak_ref: Weak<ManagedType>,
}

impl ManagedTypeRef {
    /// Create a new `ManagedTypeRef` from a strong reference
    pub fn new(strong_ref: &ManagedTypeRc) -> Self {
        Self {
            weak_ref: Arc::downgrade(strong_ref),
        }
    }

    /// Get a strong reference to the type, returning None if the type has been dropped
    #[must_use]
    pub fn upgrade(&self) -> Option<ManagedTypeRc> {
        self.weak_ref.upgrade()
    }

    /// Check if the referenced type is still alive
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.weak_ref.strong_count() > 0
    }

    /// Get the token of the referenced type (if still alive)
    #[must_use]
    pub fn token(&self) -> Option<Token> {
        self.upgrade().map(|t| t.token)
    }

    /// Get the name of the referenced type (if still alive)
    #[must_use]
    pub fn name(&self) -> Option<String> {
        self.upgrade().map(|t| t.name.clone())
    }

    /// Get the full name of the referenced type (if still alive)
    #[must_use]
    pub fn fullname(&self) -> Option<String> {
        self.upgrade().map(|t| t.fullname())
    }
}

impl From<ManagedTypeRc> for ManagedTypeRef {
    fn from(strong_ref: ManagedTypeRc) -> Self {
        Self::new(&strong_ref)
    }
}

impl From<&ManagedTypeRc> for ManagedTypeRef {
    fn from(strong_ref: &ManagedTypeRc) -> Self {
        Self::new(strong_ref)
    }
}

/// Represents the shape of a reconstructed type in the type system.
///
/// Primitive flavors correspond one-to-one with [`PrimitiveKind`]; the
/// remaining flavors describe definitions (`Class`, `ValueType`, `Interface`)
/// and synthetic compositions built during reconstruction (`Array`, `ByRef`,
/// `GenericInstance`, `GenericParameter`).
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq)]
pub enum TypeFlavor {
    // Base primitive types
    Void,
    Boolean,
    Char,
    I1,
    U1,
    I2,
    U2,
    I4,
    U4,
    I8,
    U8,
    R4,
    R8,
    I,
    U,
    Object,
    String,

    // Complex types
    Array,
    ByRef,
    GenericInstance,
    GenericParameter {
        /// The binary-wide native generic parameter index
        index: u32,
    },

    // Type categories
    Class,
    ValueType,
    Interface,

    // Fallback
    Unknown,
}

impl TypeFlavor {
    /// Check if this is a primitive type
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            TypeFlavor::Void
                | TypeFlavor::Boolean
                | TypeFlavor::Char
                | TypeFlavor::I1
                | TypeFlavor::U1
                | TypeFlavor::I2
                | TypeFlavor::U2
                | TypeFlavor::I4
                | TypeFlavor::U4
                | TypeFlavor::I8
                | TypeFlavor::U8
                | TypeFlavor::R4
                | TypeFlavor::R8
                | TypeFlavor::I
                | TypeFlavor::U
                | TypeFlavor::Object
                | TypeFlavor::String
        )
    }

    /// Check if this is a value type
    #[must_use]
    pub fn is_value_type(&self) -> bool {
        matches!(
            self,
            TypeFlavor::Boolean
                | TypeFlavor::Char
                | TypeFlavor::I1
                | TypeFlavor::U1
                | TypeFlavor::I2
                | TypeFlavor::U2
                | TypeFlavor::I4
                | TypeFlavor::U4
                | TypeFlavor::I8
                | TypeFlavor::U8
                | TypeFlavor::R4
                | TypeFlavor::R8
                | TypeFlavor::I
                | TypeFlavor::U
                | TypeFlavor::ValueType
        )
    }

    /// Check if this is a reference type
    #[must_use]
    pub fn is_reference_type(&self) -> bool {
        matches!(
            self,
            TypeFlavor::Object | TypeFlavor::String | TypeFlavor::Class | TypeFlavor::Array
        )
    }

    /// Try to convert to a [`PrimitiveKind`] if this is a primitive type
    #[must_use]
    pub fn to_primitive_kind(&self) -> Option<PrimitiveKind> {
        match self {
            TypeFlavor::Void => Some(PrimitiveKind::Void),
            TypeFlavor::Boolean => Some(PrimitiveKind::Boolean),
            TypeFlavor::Char => Some(PrimitiveKind::Char),
            TypeFlavor::I1 => Some(PrimitiveKind::I1),
            TypeFlavor::U1 => Some(PrimitiveKind::U1),
            TypeFlavor::I2 => Some(PrimitiveKind::I2),
            TypeFlavor::U2 => Some(PrimitiveKind::U2),
            TypeFlavor::I4 => Some(PrimitiveKind::I4),
            TypeFlavor::U4 => Some(PrimitiveKind::U4),
            TypeFlavor::I8 => Some(PrimitiveKind::I8),
            TypeFlavor::U8 => Some(PrimitiveKind::U8),
            TypeFlavor::R4 => Some(PrimitiveKind::R4),
            TypeFlavor::R8 => Some(PrimitiveKind::R8),
            TypeFlavor::I => Some(PrimitiveKind::I),
            TypeFlavor::U => Some(PrimitiveKind::U),
            TypeFlavor::Object => Some(PrimitiveKind::Object),
            TypeFlavor::String => Some(PrimitiveKind::String),
            _ => None,
        }
    }
}

impl From<PrimitiveKind> for TypeFlavor {
    fn from(kind: PrimitiveKind) -> Self {
        kind.to_flavor()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flavor_is_primitive() {
        assert!(TypeFlavor::Void.is_primitive());
        assert!(TypeFlavor::Boolean.is_primitive());
        assert!(TypeFlavor::I4.is_primitive());
        assert!(TypeFlavor::Object.is_primitive());
        assert!(TypeFlavor::String.is_primitive());

        assert!(!TypeFlavor::Array.is_primitive());
        assert!(!TypeFlavor::ByRef.is_primitive());
        assert!(!TypeFlavor::GenericInstance.is_primitive());
        assert!(!TypeFlavor::Class.is_primitive());
        assert!(!TypeFlavor::ValueType.is_primitive());
        assert!(!TypeFlavor::Interface.is_primitive());
        assert!(!TypeFlavor::GenericParameter { index: 0 }.is_primitive());
        assert!(!TypeFlavor::Unknown.is_primitive());
    }

    #[test]
    fn test_flavor_is_value_type() {
        assert!(TypeFlavor::Boolean.is_value_type());
        assert!(TypeFlavor::I4.is_value_type());
        assert!(TypeFlavor::R8.is_value_type());
        assert!(TypeFlavor::ValueType.is_value_type());

        assert!(!TypeFlavor::Void.is_value_type());
        assert!(!TypeFlavor::Object.is_value_type());
        assert!(!TypeFlavor::String.is_value_type());
        assert!(!TypeFlavor::Array.is_value_type());
        assert!(!TypeFlavor::Class.is_value_type());
    }

    #[test]
    fn test_flavor_is_reference_type() {
        assert!(TypeFlavor::Object.is_reference_type());
        assert!(TypeFlavor::String.is_reference_type());
        assert!(TypeFlavor::Class.is_reference_type());
        assert!(TypeFlavor::Array.is_reference_type());

        assert!(!TypeFlavor::Boolean.is_reference_type());
        assert!(!TypeFlavor::ValueType.is_reference_type());
        assert!(!TypeFlavor::ByRef.is_reference_type());
    }

    #[test]
    fn test_flavor_primitive_roundtrip() {
        assert_eq!(
            TypeFlavor::Boolean.to_primitive_kind(),
            Some(PrimitiveKind::Boolean)
        );
        assert_eq!(TypeFlavor::I4.to_primitive_kind(), Some(PrimitiveKind::I4));
        assert_eq!(TypeFlavor::Class.to_primitive_kind(), None);
        assert!(matches!(
            TypeFlavor::from(PrimitiveKind::U8),
            TypeFlavor::U8
        ));
    }
}
