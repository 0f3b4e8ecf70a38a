//! Native/managed identity correspondence for one reconstructed binary.
//!
//! The [`IdentityStore`] is the binary-scoped ledger every reconstruction
//! phase reads and writes: it maps native descriptor identities (linear type
//! indexes, tokens, method indexes, entry addresses, dispatch slots, generic
//! parameter indexes) to the managed entities built for them, interns shared
//! generic parameter slots, and keeps each type's resolved field layout.
//!
//! Managed tokens equal native tokens by construction, so token-keyed maps
//! serve both directions of the correspondence.
//!
//! # Thread Safety
//!
//! All maps are concurrent (`DashMap`, `crossbeam-skiplist`), matching the
//! parallel per-type population pass. Write disciplines differ per index and
//! are documented on the registration methods: the method-by-index and
//! method-by-address indexes keep the first writer, the virtual slot table
//! keeps the last.

use std::sync::Arc;

use crossbeam_skiplist::SkipMap;
use dashmap::DashMap;

use crate::metadata::{
    diagnostics::Diagnostics,
    member::{FieldLayoutEntry, ManagedFieldRc, MethodRc},
    token::Token,
    typesystem::{GenericParamSlot, GenericParamSlotRc, ManagedTypeRc, TypeRegistry},
};

/// Binary-scoped correspondence between native descriptors and managed entities.
pub struct IdentityStore {
    /// The registry owning all managed types of this binary
    registry: Arc<TypeRegistry>,
    /// Diagnostics collected across all phases
    diagnostics: Arc<Diagnostics>,
    /// Managed type by native linear type index
    types_by_index: DashMap<u32, ManagedTypeRc>,
    /// Native linear type index by managed token
    type_indices: DashMap<Token, u32>,
    /// Managed field by token
    fields: DashMap<Token, ManagedFieldRc>,
    /// Managed method by token
    methods: DashMap<Token, MethodRc>,
    /// Managed method by binary-wide native method index, first write wins
    methods_by_index: DashMap<u32, MethodRc>,
    /// Managed method by native entry address, first write wins
    methods_by_address: SkipMap<u64, MethodRc>,
    /// Virtual method by dispatch slot, last write wins
    virtual_methods_by_slot: DashMap<u16, MethodRc>,
    /// Interned generic parameter slots by binary-wide index
    generic_params: DashMap<u32, GenericParamSlotRc>,
    /// Resolved field layout per type, sorted ascending by offset
    field_layouts: DashMap<Token, Vec<FieldLayoutEntry>>,
}

impl IdentityStore {
    /// Creates an empty store around a fresh registry and diagnostics container.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: Arc::new(TypeRegistry::new()),
            diagnostics: Arc::new(Diagnostics::new()),
            types_by_index: DashMap::new(),
            type_indices: DashMap::new(),
            fields: DashMap::new(),
            methods: DashMap::new(),
            methods_by_index: DashMap::new(),
            methods_by_address: SkipMap::new(),
            virtual_methods_by_slot: DashMap::new(),
            generic_params: DashMap::new(),
            field_layouts: DashMap::new(),
        }
    }

    /// The registry owning all managed types of this binary
    #[must_use]
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Diagnostics collected across all phases
    #[must_use]
    pub fn diagnostics(&self) -> &Arc<Diagnostics> {
        &self.diagnostics
    }

    /// Registers a managed type under its native linear type index.
    pub fn register_type(&self, type_index: u32, ty: &ManagedTypeRc) {
        self.types_by_index.insert(type_index, ty.clone());
        self.type_indices.insert(ty.token, type_index);
    }

    /// Looks up a managed type by native linear type index.
    #[must_use]
    pub fn type_by_index(&self, type_index: u32) -> Option<ManagedTypeRc> {
        self.types_by_index
            .get(&type_index)
            .map(|entry| entry.value().clone())
    }

    /// Looks up the native linear type index of a managed type.
    #[must_use]
    pub fn index_of_type(&self, token: Token) -> Option<u32> {
        self.type_indices.get(&token).map(|entry| *entry.value())
    }

    /// Registers a managed field under its token.
    pub fn register_field(&self, field: &ManagedFieldRc) {
        self.fields.insert(field.token, field.clone());
    }

    /// Looks up a managed field by token.
    #[must_use]
    pub fn field(&self, token: Token) -> Option<ManagedFieldRc> {
        self.fields.get(&token).map(|entry| entry.value().clone())
    }

    /// Registers a managed method under its token, native index and, when it
    /// has a compiled body, its entry address.
    ///
    /// The index and address maps keep the first registration: generic method
    /// definitions can share an index or address with an instantiation, and
    /// the definition processed first is the one callers should find.
    pub fn register_method(&self, method: &MethodRc) {
        self.methods.insert(method.token, method.clone());
        self.methods_by_index
            .entry(method.native_index)
            .or_insert_with(|| method.clone());

        if method.native_address > 0 {
            self.methods_by_address
                .get_or_insert_with(method.native_address, || method.clone());
        }
    }

    /// Records a virtual method under its dispatch slot. Later registrations
    /// replace earlier ones: slot reuse across a hierarchy means the most
    /// derived implementation processed last owns the slot.
    pub fn register_virtual_slot(&self, slot: u16, method: &MethodRc) {
        self.virtual_methods_by_slot.insert(slot, method.clone());
    }

    /// Looks up a managed method by token.
    #[must_use]
    pub fn method(&self, token: Token) -> Option<MethodRc> {
        self.methods.get(&token).map(|entry| entry.value().clone())
    }

    /// Looks up a managed method by binary-wide native method index.
    #[must_use]
    pub fn method_by_index(&self, method_index: u32) -> Option<MethodRc> {
        self.methods_by_index
            .get(&method_index)
            .map(|entry| entry.value().clone())
    }

    /// Looks up a managed method by native entry address.
    #[must_use]
    pub fn method_by_address(&self, address: u64) -> Option<MethodRc> {
        self.methods_by_address
            .get(&address)
            .map(|entry| entry.value().clone())
    }

    /// Looks up the virtual method registered for a dispatch slot.
    #[must_use]
    pub fn virtual_method_by_slot(&self, slot: u16) -> Option<MethodRc> {
        self.virtual_methods_by_slot
            .get(&slot)
            .map(|entry| entry.value().clone())
    }

    /// Returns the interned generic parameter slot for a binary-wide index,
    /// creating it on first use. Every reference to the same native index
    /// observes the same slot instance.
    pub fn generic_param(&self, index: u32, name: &str, flags: u32) -> GenericParamSlotRc {
        if let Some(existing) = self.generic_params.get(&index) {
            return existing.value().clone();
        }

        self.generic_params
            .entry(index)
            .or_insert_with(|| Arc::new(GenericParamSlot::new(index, name.to_string(), flags)))
            .value()
            .clone()
    }

    /// Looks up an already-interned generic parameter slot.
    #[must_use]
    pub fn generic_param_by_index(&self, index: u32) -> Option<GenericParamSlotRc> {
        self.generic_params
            .get(&index)
            .map(|entry| entry.value().clone())
    }

    /// Appends a layout entry for a type and re-sorts the type's entry list
    /// by offset, keeping the ascending-order invariant after every add.
    pub fn add_field_layout(&self, type_token: Token, entry: FieldLayoutEntry) {
        let mut entries = self.field_layouts.entry(type_token).or_default();
        entries.push(entry);
        entries.sort_by_key(|e| e.offset);
    }

    /// Returns a snapshot of a type's layout entries, sorted ascending by offset.
    #[must_use]
    pub fn field_layout(&self, type_token: Token) -> Vec<FieldLayoutEntry> {
        self.field_layouts
            .get(&type_token)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }
}

impl Default for IdentityStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{
        member::{ManagedField, ManagedMethod, NO_SLOT},
        typesystem::{ManagedType, ManagedTypeRef, TypeFlavor},
    };

    fn make_type(store: &IdentityStore, token: u32, name: &str) -> ManagedTypeRc {
        let ty = Arc::new(ManagedType::new(
            Token::new(token),
            TypeFlavor::Class,
            "MyGame".to_string(),
            name.to_string(),
            0,
        ));
        store.registry().insert(ty.clone()).unwrap();
        ty
    }

    fn make_method(
        declaring: &ManagedTypeRc,
        token: u32,
        index: u32,
        address: u64,
    ) -> MethodRc {
        Arc::new(ManagedMethod::new(
            Token::new(token),
            "M".to_string(),
            0,
            ManagedTypeRef::new(declaring),
            NO_SLOT,
            index,
            address,
        ))
    }

    #[test]
    fn test_type_correspondence_roundtrip() {
        let store = IdentityStore::new();
        let ty = make_type(&store, 0x02000001, "Player");
        store.register_type(5, &ty);

        assert!(Arc::ptr_eq(&store.type_by_index(5).unwrap(), &ty));
        assert_eq!(store.index_of_type(ty.token), Some(5));
        assert!(store.type_by_index(6).is_none());
    }

    #[test]
    fn test_method_index_first_write_wins() {
        let store = IdentityStore::new();
        let ty = make_type(&store, 0x02000001, "Player");

        let first = make_method(&ty, 0x06000001, 10, 0x1000);
        let second = make_method(&ty, 0x06000002, 10, 0x1000);
        store.register_method(&first);
        store.register_method(&second);

        assert!(Arc::ptr_eq(&store.method_by_index(10).unwrap(), &first));
        assert!(Arc::ptr_eq(&store.method_by_address(0x1000).unwrap(), &first));
        // Token-keyed lookup still reaches both.
        assert!(store.method(Token::new(0x06000002)).is_some());
    }

    #[test]
    fn test_zero_address_not_indexed() {
        let store = IdentityStore::new();
        let ty = make_type(&store, 0x02000001, "Player");
        let method = make_method(&ty, 0x06000001, 0, 0);
        store.register_method(&method);

        assert!(store.method_by_address(0).is_none());
    }

    #[test]
    fn test_virtual_slot_last_write_wins() {
        let store = IdentityStore::new();
        let ty = make_type(&store, 0x02000001, "Player");

        let base = make_method(&ty, 0x06000001, 1, 0x1000);
        let derived = make_method(&ty, 0x06000002, 2, 0x2000);
        store.register_virtual_slot(3, &base);
        store.register_virtual_slot(3, &derived);

        assert!(Arc::ptr_eq(
            &store.virtual_method_by_slot(3).unwrap(),
            &derived
        ));
    }

    #[test]
    fn test_generic_param_interning() {
        let store = IdentityStore::new();

        let a = store.generic_param(7, "T", 0);
        let b = store.generic_param(7, "TIgnored", 0);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.name, "T");

        let c = store.generic_param(8, "U", 0);
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_field_layout_sorted_after_each_add() {
        let store = IdentityStore::new();
        let ty = make_type(&store, 0x02000001, "Player");
        let int32 = store.registry().get_primitive(
            crate::metadata::typesystem::PrimitiveKind::I4,
        );

        for (token, offset) in [(0x04000001u32, 8u64), (0x04000002, 0), (0x04000003, 16)] {
            let field = Arc::new(ManagedField::new(
                Token::new(token),
                format!("f{}", offset),
                0,
                ManagedTypeRef::new(&int32),
            ));
            store.add_field_layout(
                ty.token,
                FieldLayoutEntry {
                    name: field.name.clone(),
                    field_type: ManagedTypeRef::new(&int32),
                    offset,
                    is_static: false,
                    constant: None,
                    definition: field,
                },
            );
        }

        let offsets: Vec<u64> = store
            .field_layout(ty.token)
            .iter()
            .map(|e| e.offset)
            .collect();
        assert_eq!(offsets, vec![0, 8, 16]);

        assert!(store.field_layout(Token::new(0x02000099)).is_empty());
    }
}
