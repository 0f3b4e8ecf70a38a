use std::sync::{Arc, OnceLock};

use crate::metadata::{
    attributes::CustomAttributeList,
    member::MethodRc,
    token::Token,
    typesystem::ManagedTypeRef,
};

/// Reference to a `ManagedEvent`
pub type ManagedEventRc = Arc<ManagedEvent>;
/// A vector that holds a list of `ManagedEvent`
pub type EventList = Arc<boxcar::Vec<ManagedEventRc>>;

/// An event reconstructed from a native event descriptor.
///
/// Like property accessors, the add, remove and raise methods are bound by
/// native method index and any of them may be absent.
pub struct ManagedEvent {
    /// The native metadata token
    pub token: Token,
    /// Name of the event
    pub name: String,
    /// Raw event attribute flags
    pub flags: u32,
    /// The delegate type of the event
    pub event_type: ManagedTypeRef,
    /// The bound add accessor
    add_method: OnceLock<MethodRc>,
    /// The bound remove accessor
    remove_method: OnceLock<MethodRc>,
    /// The bound raise accessor
    raise_method: OnceLock<MethodRc>,
    /// All custom attributes attached to this event
    pub custom_attributes: CustomAttributeList,
}

impl ManagedEvent {
    /// Create a new `ManagedEvent`
    #[must_use]
    pub fn new(token: Token, name: String, flags: u32, event_type: ManagedTypeRef) -> Self {
        Self {
            token,
            name,
            flags,
            event_type,
            add_method: OnceLock::new(),
            remove_method: OnceLock::new(),
            raise_method: OnceLock::new(),
            custom_attributes: Arc::new(boxcar::Vec::new()),
        }
    }

    /// The bound add accessor, if the descriptor referenced one
    #[must_use]
    pub fn add_method(&self) -> Option<&MethodRc> {
        self.add_method.get()
    }

    /// Bind the add accessor (can only be set once)
    pub fn set_add_method(&self, method: MethodRc) -> Result<(), MethodRc> {
        self.add_method.set(method)
    }

    /// The bound remove accessor, if the descriptor referenced one
    #[must_use]
    pub fn remove_method(&self) -> Option<&MethodRc> {
        self.remove_method.get()
    }

    /// Bind the remove accessor (can only be set once)
    pub fn set_remove_method(&self, method: MethodRc) -> Result<(), MethodRc> {
        self.remove_method.set(method)
    }

    /// The bound raise accessor, if the descriptor referenced one
    #[must_use]
    pub fn raise_method(&self) -> Option<&MethodRc> {
        self.raise_method.get()
    }

    /// Bind the raise accessor (can only be set once)
    pub fn set_raise_method(&self, method: MethodRc) -> Result<(), MethodRc> {
        self.raise_method.set(method)
    }
}
