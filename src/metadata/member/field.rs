use std::sync::{Arc, OnceLock};

use bitflags::bitflags;

use crate::metadata::{
    attributes::CustomAttributeList,
    token::Token,
    typesystem::{ConstantValue, ManagedTypeRef},
};

/// Reference to a `ManagedField`
pub type ManagedFieldRc = Arc<ManagedField>;
/// A vector that holds a list of `ManagedField`
pub type FieldList = Arc<boxcar::Vec<ManagedFieldRc>>;

bitflags! {
    /// Field attribute flags as carried by native field descriptors.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FieldModifiers: u32 {
        /// Member access mask
        const FIELD_ACCESS_MASK = 0x0007;
        /// Defined on type, else per instance
        const STATIC = 0x0010;
        /// Field can only be initialized, not written to after init
        const INIT_ONLY = 0x0020;
        /// Value is a compile time constant
        const LITERAL = 0x0040;
        /// Reserved (to indicate this field should not be serialized when type is remoted)
        const NOT_SERIALIZED = 0x0080;
        /// Field has RVA-mapped initial data
        const HAS_FIELD_RVA = 0x0100;
        /// Field is special
        const SPECIAL_NAME = 0x0200;
        /// Runtime (metadata internal APIs) should check name encoding
        const RT_SPECIAL_NAME = 0x0400;
        /// Field has marshalling information
        const HAS_FIELD_MARSHAL = 0x1000;
        /// Implementation is forwarded through PInvoke
        const PINVOKE_IMPL = 0x2000;
        /// Field has a default value
        const HAS_DEFAULT = 0x8000;
    }
}

/// A field reconstructed from a native field descriptor.
///
/// The field type is fixed at creation; the default constant and RVA-mapped
/// initial data are set once during population when the descriptor carries them.
pub struct ManagedField {
    /// The native metadata token
    pub token: Token,
    /// Name of the field
    pub name: String,
    /// Raw field attribute flags
    pub flags: u32,
    /// The type of this field
    pub field_type: ManagedTypeRef,
    /// Default constant value, for literal fields and fields with defaults
    constant: OnceLock<ConstantValue>,
    /// RVA-mapped initial data bytes
    initial_value: OnceLock<Vec<u8>>,
    /// All custom attributes attached to this field
    pub custom_attributes: CustomAttributeList,
}

impl ManagedField {
    /// Create a new `ManagedField`
    #[must_use]
    pub fn new(token: Token, name: String, flags: u32, field_type: ManagedTypeRef) -> Self {
        Self {
            token,
            name,
            flags,
            field_type,
            constant: OnceLock::new(),
            initial_value: OnceLock::new(),
            custom_attributes: Arc::new(boxcar::Vec::new()),
        }
    }

    /// Typed view of the raw flags
    #[must_use]
    pub fn modifiers(&self) -> FieldModifiers {
        FieldModifiers::from_bits_truncate(self.flags)
    }

    /// True if this field is static
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.modifiers().contains(FieldModifiers::STATIC)
    }

    /// True if this field is a compile time constant
    #[must_use]
    pub fn is_literal(&self) -> bool {
        self.modifiers().contains(FieldModifiers::LITERAL)
    }

    /// The default constant value, if one was set
    #[must_use]
    pub fn constant(&self) -> Option<&ConstantValue> {
        self.constant.get()
    }

    /// Set the default constant value (can only be set once)
    pub fn set_constant(&self, value: ConstantValue) -> Result<(), ConstantValue> {
        self.constant.set(value)
    }

    /// The RVA-mapped initial data bytes, if present
    #[must_use]
    pub fn initial_value(&self) -> Option<&[u8]> {
        self.initial_value.get().map(Vec::as_slice)
    }

    /// Set the RVA-mapped initial data (can only be set once)
    pub fn set_initial_value(&self, data: Vec<u8>) -> Result<(), Vec<u8>> {
        self.initial_value.set(data)
    }
}

/// One entry of a type's resolved field layout.
///
/// Layout entries pair each field with the offset the AOT compiler assigned
/// to it. The per-type list is kept sorted by offset, and instance and static
/// fields carry offsets in separate address spaces (instance offsets are
/// object-relative, static offsets are relative to the type's static storage).
#[derive(Clone)]
pub struct FieldLayoutEntry {
    /// Name of the field
    pub name: String,
    /// The type of the field
    pub field_type: ManagedTypeRef,
    /// Offset assigned by the AOT compiler
    pub offset: u64,
    /// True if this entry describes a static field
    pub is_static: bool,
    /// Default constant, if the field has one
    pub constant: Option<ConstantValue>,
    /// The reconstructed field definition
    pub definition: ManagedFieldRc,
}
