//! Managed type system reconstructed from native AOT metadata.
//!
//! This module provides the representation of the managed type graph that
//! reconstruction rebuilds from an AOT-compiled binary: type definitions,
//! primitives, synthetic compositions (arrays, by-reference types, generic
//! instances) and generic parameters.
//!
//! # Key Components
//!
//! - [`ManagedType`]: Core type representation for definitions and synthetics
//! - [`TypeRegistry`]: Central registry owning all types of a binary
//! - [`ManagedTypeRef`]: Weak cross-reference used for all graph edges
//! - [`PrimitiveKind`] / [`ConstantValue`]: Built-in runtime primitives
//! - [`GenericParamSlot`]: Interned generic parameter declarations
//!
//! # Graph Shape
//!
//! The graph is cyclic by nature (a type's methods reference parameter types
//! which reference back), so ownership is strictly one-way: the registry holds
//! the only strong `Arc<ManagedType>` references, and every edge between types
//! is a weak [`ManagedTypeRef`]. Member lists (fields, methods, properties,
//! events) are strong since members are owned by their declaring type.
//!
//! # Examples
//!
//! ```rust,no_run
//! use aotscope::metadata::typesystem::{TypeRegistry, PrimitiveKind};
//!
//! let registry = TypeRegistry::new();
//! let int32 = registry.get_primitive(PrimitiveKind::I4);
//! assert_eq!(int32.fullname(), "System.Int32");
//!
//! let array = registry.array_of(&int32);
//! assert_eq!(array.fullname(), "System.Int32[]");
//! ```

mod base;
mod generics;
mod primitives;
mod registry;

use std::sync::{Arc, OnceLock};

pub use base::{ManagedTypeRef, ManagedTypeRefList, TypeFlavor};
pub use generics::{GenericParamList, GenericParamSlot, GenericParamSlotRc};
pub use primitives::{ConstantValue, PrimitiveKind};
pub use registry::TypeRegistry;

use crate::metadata::{
    attributes::CustomAttributeList,
    member::{EventList, FieldList, MethodList, PropertyList},
    token::Token,
};

/// A vector that holds a list of `ManagedType`
pub type ManagedTypeList = Arc<boxcar::Vec<ManagedTypeRc>>;
/// Reference to a `ManagedType`
pub type ManagedTypeRc = Arc<ManagedType>;

/// Fullname of the root of the reference type hierarchy
pub const SYSTEM_OBJECT: &str = "System.Object";
/// Fullname of the base of all value types
pub const SYSTEM_VALUE_TYPE: &str = "System.ValueType";
/// Fullname of the base of all enum types
pub const SYSTEM_ENUM: &str = "System.Enum";
/// Fullname of the base of all delegate types
pub const SYSTEM_MULTICAST_DELEGATE: &str = "System.MulticastDelegate";

/// Represents a managed type reconstructed from a native type descriptor, or
/// synthesized during reconstruction (primitives, arrays, by-reference types,
/// generic instances and generic parameter placeholders).
///
/// Most fields are populated in phases: creation produces an empty shell with
/// identity only, hierarchy configuration sets `base`, `interfaces` and
/// `generic_params`, and population fills the member lists. Set-once fields
/// use [`OnceLock`] so later phases cannot silently overwrite earlier ones.
pub struct ManagedType {
    /// The native metadata token, carried over unchanged
    pub token: Token,
    /// The shape of this type, fixed at creation
    pub flavor: TypeFlavor,
    /// `TypeNamespace` (empty for nested types and synthetics)
    pub namespace: String,
    /// `TypeName`
    pub name: String,
    /// Raw type attribute flags from the native descriptor
    pub flags: u32,
    /// This type's base aka 'extends'
    base: OnceLock<ManagedTypeRef>,
    /// The declaring type, for nested types
    declaring: OnceLock<ManagedTypeRef>,
    /// The element type of an array, by-ref type, or the definition of a generic instance
    element: OnceLock<ManagedTypeRef>,
    /// All fields this type has
    pub fields: FieldList,
    /// All methods this type has
    pub methods: MethodList,
    /// All properties this type has
    pub properties: PropertyList,
    /// All events this type has
    pub events: EventList,
    /// All interfaces this type implements
    pub interfaces: ManagedTypeRefList,
    /// All types that are nested in this type
    pub nested_types: ManagedTypeRefList,
    /// All generic parameters this type declares (the definition, not an instantiation)
    pub generic_params: GenericParamList,
    /// All generic arguments of a generic instance
    pub generic_args: ManagedTypeRefList,
    /// All custom attributes attached to this type
    pub custom_attributes: CustomAttributeList,
}

impl ManagedType {
    /// Create a new empty `ManagedType` shell
    ///
    /// # Arguments
    /// * `token`     - The native metadata token
    /// * `flavor`    - The shape of the type
    /// * `namespace` - `TypeNamespace`
    /// * `name`      - `TypeName`
    /// * `flags`     - Raw type attribute flags
    #[must_use]
    pub fn new(token: Token, flavor: TypeFlavor, namespace: String, name: String, flags: u32) -> Self {
        ManagedType {
            token,
            flavor,
            namespace,
            name,
            flags,
            base: OnceLock::new(),
            declaring: OnceLock::new(),
            element: OnceLock::new(),
            fields: Arc::new(boxcar::Vec::new()),
            methods: Arc::new(boxcar::Vec::new()),
            properties: Arc::new(boxcar::Vec::new()),
            events: Arc::new(boxcar::Vec::new()),
            interfaces: Arc::new(boxcar::Vec::new()),
            nested_types: Arc::new(boxcar::Vec::new()),
            generic_params: Arc::new(boxcar::Vec::new()),
            generic_args: Arc::new(boxcar::Vec::new()),
            custom_attributes: Arc::new(boxcar::Vec::new()),
        }
    }

    /// The base type this type extends, if set
    #[must_use]
    pub fn base(&self) -> Option<&ManagedTypeRef> {
        self.base.get()
    }

    /// Set the base type (can only be set once)
    pub fn set_base(&self, base: ManagedTypeRef) -> Result<(), ManagedTypeRef> {
        self.base.set(base)
    }

    /// The declaring type, for nested types
    #[must_use]
    pub fn declaring(&self) -> Option<&ManagedTypeRef> {
        self.declaring.get()
    }

    /// Set the declaring type (can only be set once)
    pub fn set_declaring(&self, declaring: ManagedTypeRef) -> Result<(), ManagedTypeRef> {
        self.declaring.set(declaring)
    }

    /// The element type of an array or by-ref type, or the open definition
    /// of a generic instance
    #[must_use]
    pub fn element(&self) -> Option<&ManagedTypeRef> {
        self.element.get()
    }

    /// Set the element type (can only be set once)
    pub fn set_element(&self, element: ManagedTypeRef) -> Result<(), ManagedTypeRef> {
        self.element.set(element)
    }

    /// Builds the full name of this type.
    ///
    /// Synthetic compositions render from their element: `System.Int32[]`,
    /// `System.Int32&`, `System.Collections.Generic.List<System.String>`.
    /// Nested types render as `Declaring/Name`, generic parameters as their
    /// bare name.
    #[must_use]
    pub fn fullname(&self) -> String {
        match &self.flavor {
            TypeFlavor::Array => {
                if let Some(element) = self.element().and_then(ManagedTypeRef::upgrade) {
                    return format!("{}[]", element.fullname());
                }
            }
            TypeFlavor::ByRef => {
                if let Some(element) = self.element().and_then(ManagedTypeRef::upgrade) {
                    return format!("{}&", element.fullname());
                }
            }
            TypeFlavor::GenericInstance => {
                if let Some(element) = self.element().and_then(ManagedTypeRef::upgrade) {
                    let args = self
                        .generic_args
                        .iter()
                        .map(|(_, arg)| {
                            arg.upgrade()
                                .map_or_else(|| "?".to_string(), |t| t.fullname())
                        })
                        .collect::<Vec<_>>()
                        .join(", ");
                    return format!("{}<{}>", element.fullname(), args);
                }
            }
            TypeFlavor::GenericParameter { .. } => return self.name.clone(),
            _ => {}
        }

        if let Some(declaring) = self.declaring().and_then(ManagedTypeRef::upgrade) {
            return format!("{}/{}", declaring.fullname(), self.name);
        }

        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    /// True if this type is a value type.
    ///
    /// Covers primitive value types, `ValueType`-flavored definitions, and
    /// definitions whose base is `System.ValueType` or `System.Enum`.
    #[must_use]
    pub fn is_value_type(&self) -> bool {
        if self.flavor.is_value_type() {
            return true;
        }

        if let Some(base_name) = self.base().and_then(ManagedTypeRef::fullname) {
            return base_name == SYSTEM_VALUE_TYPE || base_name == SYSTEM_ENUM;
        }

        false
    }

    /// True if this type is a runtime primitive in the strict sense, which
    /// excludes `System.Void`, `System.Object` and `System.String`.
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        matches!(
            self.flavor.to_primitive_kind(),
            Some(kind)
                if !matches!(
                    kind,
                    PrimitiveKind::Void | PrimitiveKind::Object | PrimitiveKind::String
                )
        )
    }

    /// True if this type is an interface
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.flavor == TypeFlavor::Interface
    }

    /// Checks whether a value of type `other` can be assigned to a location
    /// of this type.
    ///
    /// Identity is token equality. `System.Object` accepts everything. For
    /// everything else the base chain and implemented interfaces of `other`
    /// are walked transitively.
    #[must_use]
    pub fn is_assignable_from(&self, other: &ManagedTypeRc) -> bool {
        if self.token == other.token {
            return true;
        }

        if self.fullname() == SYSTEM_OBJECT {
            return true;
        }

        let mut current = other.base().and_then(ManagedTypeRef::upgrade);
        while let Some(base) = current {
            if base.token == self.token {
                return true;
            }
            current = base.base().and_then(ManagedTypeRef::upgrade);
        }

        for (_, interface) in other.interfaces.iter() {
            if let Some(interface) = interface.upgrade() {
                if interface.token == self.token || self.is_assignable_from(&interface) {
                    return true;
                }
            }
        }

        false
    }
}

/// A reconstructed module, grouping the types of one binary image.
pub struct ManagedModule {
    /// Name of the module, derived from the binary image name
    pub name: String,
    /// All top-level and nested types of this module
    pub types: ManagedTypeList,
    /// The injected provenance shapes, set once when population begins
    injected: OnceLock<Arc<crate::metadata::reconstruct::InjectedShapes>>,
}

impl ManagedModule {
    /// Create a new empty `ManagedModule`
    #[must_use]
    pub fn new(name: String) -> Self {
        ManagedModule {
            name,
            types: Arc::new(boxcar::Vec::new()),
            injected: OnceLock::new(),
        }
    }

    /// The injected provenance shapes, if population has begun
    #[must_use]
    pub fn injected(&self) -> Option<&Arc<crate::metadata::reconstruct::InjectedShapes>> {
        self.injected.get()
    }

    /// Set the injected provenance shapes (can only be set once)
    pub fn set_injected(
        &self,
        shapes: Arc<crate::metadata::reconstruct::InjectedShapes>,
    ) -> Result<(), Arc<crate::metadata::reconstruct::InjectedShapes>> {
        self.injected.set(shapes)
    }
}
