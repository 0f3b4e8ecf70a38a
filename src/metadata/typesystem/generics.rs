use std::sync::{Arc, OnceLock};

use crate::metadata::typesystem::{ManagedTypeRef, ManagedTypeRefList};

/// Reference to a [`GenericParamSlot`]
pub type GenericParamSlotRc = Arc<GenericParamSlot>;
/// A vector that holds a list of `GenericParamSlot`
pub type GenericParamList = Arc<boxcar::Vec<GenericParamSlotRc>>;

/// A generic parameter declared by a type or method.
///
/// Native metadata identifies generic parameters by a binary-wide index, and
/// the same parameter can be referenced from many signatures. Slots are
/// interned through [`crate::metadata::identity::IdentityStore`] so that every
/// reference to the same native index observes the same slot instance.
pub struct GenericParamSlot {
    /// The binary-wide native generic parameter index
    pub index: u32,
    /// Name of the parameter, e.g. `T` or `TKey`
    pub name: String,
    /// Raw attribute flags (variance and special constraints)
    pub flags: u32,
    /// Type constraints applied to this parameter
    pub constraints: ManagedTypeRefList,
    /// The placeholder type standing in for this parameter in signatures
    placeholder: OnceLock<ManagedTypeRef>,
}

impl GenericParamSlot {
    /// Create a new `GenericParamSlot`
    ///
    /// # Arguments
    /// * `index` - The binary-wide native generic parameter index
    /// * `name`  - Name of the parameter
    /// * `flags` - Raw attribute flags
    #[must_use]
    pub fn new(index: u32, name: String, flags: u32) -> Self {
        Self {
            index,
            name,
            flags,
            constraints: Arc::new(boxcar::Vec::new()),
            placeholder: OnceLock::new(),
        }
    }

    /// The placeholder type for this parameter, if one was registered
    #[must_use]
    pub fn placeholder(&self) -> Option<&ManagedTypeRef> {
        self.placeholder.get()
    }

    /// Set the placeholder type for this parameter (can only be set once)
    pub fn set_placeholder(&self, placeholder: ManagedTypeRef) -> Result<(), ManagedTypeRef> {
        self.placeholder.set(placeholder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_creation() {
        let slot = GenericParamSlot::new(7, "TKey".to_string(), 0);
        assert_eq!(slot.index, 7);
        assert_eq!(slot.name, "TKey");
        assert_eq!(slot.constraints.count(), 0);
        assert!(slot.placeholder().is_none());
    }
}
