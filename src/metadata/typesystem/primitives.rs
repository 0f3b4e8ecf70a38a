//! Primitive kinds and constant values for the reconstructed type system.
//!
//! Native descriptors reference the runtime's built-in types by element kind
//! rather than by descriptor index; [`PrimitiveKind`] enumerates those kinds and
//! carries their well-known `System.*` identities. [`ConstantValue`] is the owned
//! representation of a default-value constant as it appears on fields, parameters,
//! and analysed call-site operands.

use std::fmt;

use crate::metadata::typesystem::TypeFlavor;

/// The built-in primitive types of the managed runtime.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
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
}

impl PrimitiveKind {
    /// The namespace every primitive lives in.
    pub const NAMESPACE: &'static str = "System";

    /// The well-known type name of this primitive (without namespace).
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            PrimitiveKind::Void => "Void",
            PrimitiveKind::Boolean => "Boolean",
            PrimitiveKind::Char => "Char",
            PrimitiveKind::I1 => "SByte",
            PrimitiveKind::U1 => "Byte",
            PrimitiveKind::I2 => "Int16",
            PrimitiveKind::U2 => "UInt16",
            PrimitiveKind::I4 => "Int32",
            PrimitiveKind::U4 => "UInt32",
            PrimitiveKind::I8 => "Int64",
            PrimitiveKind::U8 => "UInt64",
            PrimitiveKind::R4 => "Single",
            PrimitiveKind::R8 => "Double",
            PrimitiveKind::I => "IntPtr",
            PrimitiveKind::U => "UIntPtr",
            PrimitiveKind::Object => "Object",
            PrimitiveKind::String => "String",
        }
    }

    /// The full `System.*` name of this primitive.
    #[must_use]
    pub fn fullname(&self) -> String {
        format!("{}.{}", Self::NAMESPACE, self.name())
    }

    /// The [`TypeFlavor`] corresponding to this primitive.
    #[must_use]
    pub fn to_flavor(&self) -> TypeFlavor {
        match self {
            PrimitiveKind::Void => TypeFlavor::Void,
            PrimitiveKind::Boolean => TypeFlavor::Boolean,
            PrimitiveKind::Char => TypeFlavor::Char,
            PrimitiveKind::I1 => TypeFlavor::I1,
            PrimitiveKind::U1 => TypeFlavor::U1,
            PrimitiveKind::I2 => TypeFlavor::I2,
            PrimitiveKind::U2 => TypeFlavor::U2,
            PrimitiveKind::I4 => TypeFlavor::I4,
            PrimitiveKind::U4 => TypeFlavor::U4,
            PrimitiveKind::I8 => TypeFlavor::I8,
            PrimitiveKind::U8 => TypeFlavor::U8,
            PrimitiveKind::R4 => TypeFlavor::R4,
            PrimitiveKind::R8 => TypeFlavor::R8,
            PrimitiveKind::I => TypeFlavor::I,
            PrimitiveKind::U => TypeFlavor::U,
            PrimitiveKind::Object => TypeFlavor::Object,
            PrimitiveKind::String => TypeFlavor::String,
        }
    }

    /// All primitive kinds, in element-kind order.
    #[must_use]
    pub fn all() -> &'static [PrimitiveKind] {
        &[
            PrimitiveKind::Void,
            PrimitiveKind::Boolean,
            PrimitiveKind::Char,
            PrimitiveKind::I1,
            PrimitiveKind::U1,
            PrimitiveKind::I2,
            PrimitiveKind::U2,
            PrimitiveKind::I4,
            PrimitiveKind::U4,
            PrimitiveKind::I8,
            PrimitiveKind::U8,
            PrimitiveKind::R4,
            PrimitiveKind::R8,
            PrimitiveKind::I,
            PrimitiveKind::U,
            PrimitiveKind::Object,
            PrimitiveKind::String,
        ]
    }
}

/// An owned constant value from native metadata.
///
/// Carried by field and parameter descriptors as default values, and by
/// [`crate::analysis::AnalysedOperand::Constant`] operands during call-site
/// argument recovery.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
    Boolean(bool),
    Char(u16),
    I1(i8),
    U1(u8),
    I2(i16),
    U2(u16),
    I4(i32),
    U4(u32),
    I8(i64),
    U8(u64),
    R4(f32),
    R8(f64),
    String(String),
    Null,
}

impl ConstantValue {
    /// The [`PrimitiveKind`] that describes this value's concrete type.
    ///
    /// `Null` maps to `Object` - it is the null-equivalent of any reference type.
    #[must_use]
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            ConstantValue::Boolean(_) => PrimitiveKind::Boolean,
            ConstantValue::Char(_) => PrimitiveKind::Char,
            ConstantValue::I1(_) => PrimitiveKind::I1,
            ConstantValue::U1(_) => PrimitiveKind::U1,
            ConstantValue::I2(_) => PrimitiveKind::I2,
            ConstantValue::U2(_) => PrimitiveKind::U2,
            ConstantValue::I4(_) => PrimitiveKind::I4,
            ConstantValue::U4(_) => PrimitiveKind::U4,
            ConstantValue::I8(_) => PrimitiveKind::I8,
            ConstantValue::U8(_) => PrimitiveKind::U8,
            ConstantValue::R4(_) => PrimitiveKind::R4,
            ConstantValue::R8(_) => PrimitiveKind::R8,
            ConstantValue::String(_) => PrimitiveKind::String,
            ConstantValue::Null => PrimitiveKind::Object,
        }
    }

    /// Returns the raw value if this constant is a widened integer as produced
    /// by the native ABI when a boolean is passed in a full machine word.
    ///
    /// Only unsigned machine-word encodings qualify (`U4` on 32-bit targets,
    /// `U8` on 64-bit targets).
    #[must_use]
    pub fn as_widened_integer(&self) -> Option<u64> {
        match self {
            ConstantValue::U4(v) => Some(u64::from(*v)),
            ConstantValue::U8(v) => Some(*v),
            _ => None,
        }
    }

    /// True if this constant is a UTF-16 surrogate character.
    ///
    /// Surrogate defaults are omitted from the textual metadata dump because
    /// they cannot be rendered in isolation.
    #[must_use]
    pub fn is_surrogate_char(&self) -> bool {
        matches!(self, ConstantValue::Char(c) if (0xD800..=0xDFFF).contains(c))
    }
}

impl fmt::Display for ConstantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstantValue::Boolean(v) => write!(f, "{}", v),
            ConstantValue::Char(v) => match char::from_u32(u32::from(*v)) {
                Some(c) => write!(f, "{}", c),
                None => write!(f, "\\u{:04x}", v),
            },
            ConstantValue::I1(v) => write!(f, "{}", v),
            ConstantValue::U1(v) => write!(f, "{}", v),
            ConstantValue::I2(v) => write!(f, "{}", v),
            ConstantValue::U2(v) => write!(f, "{}", v),
            ConstantValue::I4(v) => write!(f, "{}", v),
            ConstantValue::U4(v) => write!(f, "{}", v),
            ConstantValue::I8(v) => write!(f, "{}", v),
            ConstantValue::U8(v) => write!(f, "{}", v),
            ConstantValue::R4(v) => write!(f, "{}", v),
            ConstantValue::R8(v) => write!(f, "{}", v),
            ConstantValue::String(v) => write!(f, "{}", v),
            ConstantValue::Null => write!(f, "null"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_names() {
        assert_eq!(PrimitiveKind::I4.fullname(), "System.Int32");
        assert_eq!(PrimitiveKind::Boolean.fullname(), "System.Boolean");
        assert_eq!(PrimitiveKind::Char.fullname(), "System.Char");
        assert_eq!(PrimitiveKind::U8.fullname(), "System.UInt64");
        assert_eq!(PrimitiveKind::String.fullname(), "System.String");
    }

    #[test]
    fn test_constant_kind() {
        assert_eq!(ConstantValue::I4(5).kind(), PrimitiveKind::I4);
        assert_eq!(ConstantValue::Null.kind(), PrimitiveKind::Object);
        assert_eq!(
            ConstantValue::String("x".into()).kind(),
            PrimitiveKind::String
        );
    }

    #[test]
    fn test_widened_integer() {
        assert_eq!(ConstantValue::U8(1).as_widened_integer(), Some(1));
        assert_eq!(ConstantValue::U4(0).as_widened_integer(), Some(0));
        assert_eq!(ConstantValue::I4(1).as_widened_integer(), None);
        assert_eq!(ConstantValue::Boolean(true).as_widened_integer(), None);
    }

    #[test]
    fn test_surrogate_char() {
        assert!(ConstantValue::Char(0xD800).is_surrogate_char());
        assert!(ConstantValue::Char(0xDFFF).is_surrogate_char());
        assert!(!ConstantValue::Char(b'a' as u16).is_surrogate_char());
        assert!(!ConstantValue::I4(0xD800).is_surrogate_char());
    }
}
