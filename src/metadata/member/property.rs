use std::sync::{Arc, OnceLock};

use crate::metadata::{
    attributes::CustomAttributeList,
    member::MethodRc,
    token::Token,
    typesystem::ManagedTypeRef,
};

/// Reference to a `ManagedProperty`
pub type ManagedPropertyRc = Arc<ManagedProperty>;
/// A vector that holds a list of `ManagedProperty`
pub type PropertyList = Arc<boxcar::Vec<ManagedPropertyRc>>;

/// A property reconstructed from a native property descriptor.
///
/// Accessors are bound by native method index and may legitimately be absent;
/// a property descriptor can reference a getter, a setter, both, or neither.
pub struct ManagedProperty {
    /// The native metadata token
    pub token: Token,
    /// Name of the property
    pub name: String,
    /// Raw property attribute flags
    pub flags: u32,
    /// The type of the property, taken from the getter return or setter parameter
    pub property_type: ManagedTypeRef,
    /// The bound getter
    getter: OnceLock<MethodRc>,
    /// The bound setter
    setter: OnceLock<MethodRc>,
    /// All custom attributes attached to this property
    pub custom_attributes: CustomAttributeList,
}

impl ManagedProperty {
    /// Create a new `ManagedProperty`
    #[must_use]
    pub fn new(token: Token, name: String, flags: u32, property_type: ManagedTypeRef) -> Self {
        Self {
            token,
            name,
            flags,
            property_type,
            getter: OnceLock::new(),
            setter: OnceLock::new(),
            custom_attributes: Arc::new(boxcar::Vec::new()),
        }
    }

    /// The bound getter, if the descriptor referenced one
    #[must_use]
    pub fn getter(&self) -> Option<&MethodRc> {
        self.getter.get()
    }

    /// Bind the getter (can only be set once)
    pub fn set_getter(&self, getter: MethodRc) -> Result<(), MethodRc> {
        self.getter.set(getter)
    }

    /// The bound setter, if the descriptor referenced one
    #[must_use]
    pub fn setter(&self) -> Option<&MethodRc> {
        self.setter.get()
    }

    /// Bind the setter (can only be set once)
    pub fn set_setter(&self, setter: MethodRc) -> Result<(), MethodRc> {
        self.setter.set(setter)
    }
}
