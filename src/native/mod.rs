//! Input data model: native metadata descriptors and the binary access trait.
//!
//! Reconstruction consumes two read-only collaborators. The first is a
//! [`NativeImage`], the decoded descriptor tables of one AOT-compiled binary:
//! every type, field, method, property and event the compiler emitted, with
//! the original metadata tokens preserved. The second is the [`AotBinary`]
//! trait, the minimal surface of the binary reader itself: pointer width,
//! compiler-assigned field offsets, and address mapping.
//!
//! Parsing the binary into these descriptors is out of scope here; tests and
//! callers provide their own [`AotBinary`] implementation.

use crate::metadata::typesystem::{ConstantValue, PrimitiveKind};

/// Pointer width of the reconstructed binary's target architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerWidth {
    /// 32-bit target, stack-based calling convention
    X86,
    /// 64-bit target, register-based calling convention
    X64,
}

impl PointerWidth {
    /// Size of a pointer in bytes
    #[must_use]
    pub fn bytes(&self) -> u64 {
        match self {
            PointerWidth::X86 => 4,
            PointerWidth::X64 => 8,
        }
    }
}

/// A raw type reference as native descriptors encode it.
///
/// References never name types directly; they either select a runtime
/// primitive, point at another descriptor by linear type index, compose an
/// element reference, or select a generic parameter by binary-wide index.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeTypeRef {
    /// A runtime built-in
    Primitive(PrimitiveKind),
    /// A descriptor in the same image, by linear type index
    TypeIndex(u32),
    /// Single-dimensional array of the element reference
    Array(Box<NativeTypeRef>),
    /// By-reference wrapper around the element reference
    ByRef(Box<NativeTypeRef>),
    /// A generic parameter, by binary-wide generic parameter index
    GenericParam(u32),
    /// An instantiation of a generic definition
    GenericInstance {
        /// Linear type index of the open definition
        definition: u32,
        /// Instantiation arguments, in declaration order
        args: Vec<NativeTypeRef>,
    },
}

/// One generic parameter declared by a type or method descriptor.
#[derive(Debug, Clone)]
pub struct NativeGenericParam {
    /// Binary-wide generic parameter index
    pub index: u32,
    /// Name of the parameter
    pub name: String,
    /// Raw attribute flags
    pub flags: u32,
    /// Constraint type references
    pub constraints: Vec<NativeTypeRef>,
}

/// The generic container of a generic type or method descriptor.
#[derive(Debug, Clone, Default)]
pub struct NativeGenericContainer {
    /// Declared parameters, in declaration order
    pub params: Vec<NativeGenericParam>,
}

/// A field descriptor.
#[derive(Debug, Clone)]
pub struct NativeFieldDescriptor {
    /// Name of the field
    pub name: String,
    /// The native metadata token
    pub token: u32,
    /// Binary-wide linear field index
    pub field_index: u32,
    /// Raw type reference
    pub field_type: NativeTypeRef,
    /// Raw field attribute flags
    pub flags: u32,
    /// Default constant, when the descriptor carries one
    pub default_value: Option<ConstantValue>,
    /// RVA-mapped initial data, when the descriptor carries it
    pub initial_value: Option<Vec<u8>>,
}

/// One parameter of a method descriptor.
#[derive(Debug, Clone)]
pub struct NativeParamDescriptor {
    /// Name of the parameter
    pub name: String,
    /// Raw type reference
    pub param_type: NativeTypeRef,
    /// True if the parameter is passed by reference
    pub is_byref: bool,
    /// Raw parameter attribute flags
    pub flags: u32,
    /// Default value, when the descriptor carries one
    pub default_value: Option<ConstantValue>,
}

/// A method descriptor.
#[derive(Debug, Clone)]
pub struct NativeMethodDescriptor {
    /// Name of the method
    pub name: String,
    /// The native metadata token
    pub token: u32,
    /// Binary-wide linear method index
    pub method_index: u32,
    /// Raw method attribute flags
    pub flags: u32,
    /// Raw return type reference
    pub return_type: NativeTypeRef,
    /// Parameters, in declaration order (without the implicit `this`)
    pub params: Vec<NativeParamDescriptor>,
    /// Generic container, for generic methods
    pub generic_container: Option<NativeGenericContainer>,
    /// Virtual dispatch slot, `u16::MAX` when none is assigned
    pub slot: u16,
    /// Virtual address of the compiled body, 0 when absent
    pub address: u64,
}

/// A property descriptor. Accessors cross-reference methods of the same
/// type by binary-wide method index.
#[derive(Debug, Clone)]
pub struct NativePropertyDescriptor {
    /// Name of the property
    pub name: String,
    /// The native metadata token
    pub token: u32,
    /// Raw property attribute flags
    pub flags: u32,
    /// Method index of the getter, if any
    pub getter: Option<u32>,
    /// Method index of the setter, if any
    pub setter: Option<u32>,
}

/// An event descriptor. Accessors cross-reference methods of the same
/// type by binary-wide method index.
#[derive(Debug, Clone)]
pub struct NativeEventDescriptor {
    /// Name of the event
    pub name: String,
    /// The native metadata token
    pub token: u32,
    /// Raw event attribute flags
    pub flags: u32,
    /// Raw type reference of the event's delegate type
    pub event_type: NativeTypeRef,
    /// Method index of the add accessor, if any
    pub add: Option<u32>,
    /// Method index of the remove accessor, if any
    pub remove: Option<u32>,
    /// Method index of the raise accessor, if any
    pub raise: Option<u32>,
}

/// A type descriptor.
#[derive(Debug, Clone)]
pub struct NativeTypeDescriptor {
    /// The native metadata token
    pub token: u32,
    /// Binary-wide linear type index
    pub type_index: u32,
    /// `TypeNamespace` (empty for nested types)
    pub namespace: String,
    /// `TypeName`
    pub name: String,
    /// Raw type attribute flags
    pub flags: u32,
    /// True if the compiler classified this descriptor as a value type
    pub is_value_type: bool,
    /// True if this descriptor is an interface
    pub is_interface: bool,
    /// Linear type index of the declaring type, for nested types
    pub declaring_type: Option<u32>,
    /// Raw base type reference, absent for interfaces and `System.Object`
    pub base: Option<NativeTypeRef>,
    /// Raw interface references
    pub interfaces: Vec<NativeTypeRef>,
    /// Generic container, for generic types
    pub generic_container: Option<NativeGenericContainer>,
    /// Field descriptors, in declaration order
    pub fields: Vec<NativeFieldDescriptor>,
    /// Method descriptors, in declaration order
    pub methods: Vec<NativeMethodDescriptor>,
    /// Property descriptors, in declaration order
    pub properties: Vec<NativePropertyDescriptor>,
    /// Event descriptors, in declaration order
    pub events: Vec<NativeEventDescriptor>,
}

/// The decoded descriptor tables of one AOT-compiled binary image.
#[derive(Debug, Clone, Default)]
pub struct NativeImage {
    /// Name of the image, e.g. `Assembly-CSharp.dll`
    pub name: String,
    /// All type descriptors, ordered by linear type index
    pub types: Vec<NativeTypeDescriptor>,
}

/// Access to the AOT-compiled binary itself.
///
/// The compiler bakes field layout and code addresses into the binary rather
/// than into the descriptor tables, so reconstruction queries them here.
pub trait AotBinary: Send + Sync {
    /// Pointer width of the target architecture
    fn pointer_width(&self) -> PointerWidth;

    /// The byte offset the compiler assigned to a field.
    ///
    /// Instance offsets are object-relative, static offsets are relative to
    /// the type's static storage; the two address spaces are independent.
    ///
    /// # Arguments
    /// * `type_index`     - Linear index of the declaring type descriptor
    /// * `field_position` - Position of the field within the declaring type
    /// * `field_index`    - Binary-wide linear field index
    /// * `is_value_type`  - Value-type flag of the declaring type
    /// * `is_static`      - Static flag of the field
    fn field_offset(
        &self,
        type_index: u32,
        field_position: usize,
        field_index: u32,
        is_value_type: bool,
        is_static: bool,
    ) -> u64;

    /// Converts a virtual address to a relative virtual address.
    fn rva_of(&self, va: u64) -> u64;

    /// Maps a virtual address to its file offset, `None` when the address
    /// falls outside every mapped section.
    fn try_map_virtual_address(&self, va: u64) -> Option<u64>;
}
