//! Central type registry for reconstructed binaries.
//!
//! This module provides the `TypeRegistry`, a thread-safe registry owning all
//! managed types reconstructed from one AOT-compiled binary. It is the single
//! place that holds strong references; every other part of the type graph
//! links through weak [`ManagedTypeRef`] handles.
//!
//! # Registry Architecture
//!
//! - **Token-based lookup**: Primary index using native metadata tokens
//! - **Name-based lookup**: Secondary index on full names
//! - **Synthetic interning**: Arrays, by-ref types, generic instances,
//!   generic parameter placeholders and external shells are created once
//!   per distinct shape and shared afterwards
//!
//! # Thread Safety
//!
//! The registry is built for the parallel population pass:
//! - Lock-free primary storage (`SkipMap`)
//! - Concurrent hash maps for the secondary indices (`DashMap`)
//! - Atomic synthetic token generation

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use crossbeam_skiplist::SkipMap;
use dashmap::DashMap;

use crate::{
    metadata::{
        token::Token,
        typesystem::{
            GenericParamSlotRc, ManagedType, ManagedTypeRc, ManagedTypeRef, PrimitiveKind,
            TypeFlavor,
        },
    },
    Result,
};

/// Table byte used for tokens of types the registry synthesizes itself
/// (primitives, arrays, by-ref types, generic instances, placeholders and
/// external shells). Chosen outside the range of real native tables so
/// synthetic tokens can never collide with descriptor tokens.
const SYNTHETIC_TABLE: u32 = 0xF0;

/// Central registry owning all managed types of one reconstructed binary.
pub struct TypeRegistry {
    /// Primary storage, indexed by token
    types: SkipMap<Token, ManagedTypeRc>,
    /// Secondary index on full names
    fullname_index: DashMap<String, ManagedTypeRc>,
    /// Lazily created primitive types
    primitives: DashMap<PrimitiveKind, ManagedTypeRc>,
    /// Interned synthetic compositions, keyed by composed full name
    synthetics: DashMap<String, ManagedTypeRc>,
    /// Row counter for synthetic tokens
    next_synthetic_row: AtomicU32,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        TypeRegistry {
            types: SkipMap::new(),
            fullname_index: DashMap::new(),
            primitives: DashMap::new(),
            synthetics: DashMap::new(),
            next_synthetic_row: AtomicU32::new(1),
        }
    }

    /// Allocates a fresh token in the synthetic table.
    pub(crate) fn next_synthetic_token(&self) -> Token {
        let row = self.next_synthetic_row.fetch_add(1, Ordering::Relaxed);
        Token::new((SYNTHETIC_TABLE << 24) | (row & 0x00FF_FFFF))
    }

    /// Registers a type under its token and full name.
    ///
    /// Shell creation assigns each native descriptor a distinct token, so a
    /// token collision indicates corrupted input and is rejected.
    ///
    /// # Errors
    /// Returns an error if a different type is already registered under the
    /// same token.
    pub fn insert(&self, ty: ManagedTypeRc) -> Result<()> {
        if self.types.contains_key(&ty.token) {
            return Err(malformed_error!(
                "Duplicate type token - {}",
                ty.token.value()
            ));
        }

        self.fullname_index.insert(ty.fullname(), ty.clone());
        self.types.insert(ty.token, ty);
        Ok(())
    }

    /// Looks up a type by its token.
    #[must_use]
    pub fn get(&self, token: &Token) -> Option<ManagedTypeRc> {
        self.types.get(token).map(|entry| entry.value().clone())
    }

    /// Looks up a type by its full name.
    #[must_use]
    pub fn get_by_fullname(&self, fullname: &str) -> Option<ManagedTypeRc> {
        self.fullname_index
            .get(fullname)
            .map(|entry| entry.value().clone())
    }

    /// Returns the managed type for a runtime primitive, creating it on first use.
    pub fn get_primitive(&self, kind: PrimitiveKind) -> ManagedTypeRc {
        if let Some(existing) = self.primitives.get(&kind) {
            return existing.value().clone();
        }

        let created = self
            .primitives
            .entry(kind)
            .or_insert_with(|| {
                let ty = Arc::new(ManagedType::new(
                    self.next_synthetic_token(),
                    kind.to_flavor(),
                    PrimitiveKind::NAMESPACE.to_string(),
                    kind.name().to_string(),
                    0,
                ));
                self.fullname_index.insert(ty.fullname(), ty.clone());
                self.types.insert(ty.token, ty.clone());
                ty
            })
            .value()
            .clone();

        created
    }

    /// Interns a synthetic type under its composed full name.
    fn get_or_create_synthetic<F>(&self, key: String, create: F) -> ManagedTypeRc
    where
        F: FnOnce() -> ManagedType,
    {
        if let Some(existing) = self.synthetics.get(&key) {
            return existing.value().clone();
        }

        self.synthetics
            .entry(key)
            .or_insert_with(|| {
                let ty = Arc::new(create());
                self.fullname_index.insert(ty.fullname(), ty.clone());
                self.types.insert(ty.token, ty.clone());
                ty
            })
            .value()
            .clone()
    }

    /// Returns the array type of `element`, creating it on first use.
    pub fn array_of(&self, element: &ManagedTypeRc) -> ManagedTypeRc {
        let key = format!("{}[]", element.fullname());
        self.get_or_create_synthetic(key, || {
            let ty = ManagedType::new(
                self.next_synthetic_token(),
                TypeFlavor::Array,
                element.namespace.clone(),
                format!("{}[]", element.name),
                0,
            );
            ty.set_element(ManagedTypeRef::new(element)).ok();
            ty
        })
    }

    /// Returns the by-reference type of `element`, creating it on first use.
    pub fn byref_of(&self, element: &ManagedTypeRc) -> ManagedTypeRc {
        let key = format!("{}&", element.fullname());
        self.get_or_create_synthetic(key, || {
            let ty = ManagedType::new(
                self.next_synthetic_token(),
                TypeFlavor::ByRef,
                element.namespace.clone(),
                format!("{}&", element.name),
                0,
            );
            ty.set_element(ManagedTypeRef::new(element)).ok();
            ty
        })
    }

    /// Returns the instantiation of `definition` with `args`, creating it on
    /// first use. Instantiations are interned by composed full name, so the
    /// same definition with the same arguments always yields the same type.
    pub fn generic_instance(
        &self,
        definition: &ManagedTypeRc,
        args: &[ManagedTypeRc],
    ) -> ManagedTypeRc {
        let arg_names = args
            .iter()
            .map(|arg| arg.fullname())
            .collect::<Vec<_>>()
            .join(", ");
        let key = format!("{}<{}>", definition.fullname(), arg_names);

        self.get_or_create_synthetic(key, || {
            let ty = ManagedType::new(
                self.next_synthetic_token(),
                TypeFlavor::GenericInstance,
                definition.namespace.clone(),
                definition.name.clone(),
                definition.flags,
            );
            ty.set_element(ManagedTypeRef::new(definition)).ok();
            for arg in args {
                ty.generic_args.push(ManagedTypeRef::new(arg));
            }
            ty
        })
    }

    /// Returns the placeholder type standing in for a generic parameter slot,
    /// creating it on first use and wiring it back into the slot.
    pub fn generic_parameter(&self, slot: &GenericParamSlotRc) -> ManagedTypeRc {
        if let Some(existing) = slot.placeholder().and_then(ManagedTypeRef::upgrade) {
            return existing;
        }

        let key = format!("!{}", slot.index);
        let created = self.get_or_create_synthetic(key, || {
            ManagedType::new(
                self.next_synthetic_token(),
                TypeFlavor::GenericParameter { index: slot.index },
                String::new(),
                slot.name.clone(),
                0,
            )
        });
        slot.set_placeholder(ManagedTypeRef::new(&created)).ok();
        created
    }

    /// Returns a shell for a well-known type that may not be defined in the
    /// binary's own descriptors, e.g. `System.Attribute`. Resolves to the real
    /// definition when one exists under that full name.
    pub fn external_type(&self, namespace: &str, name: &str) -> ManagedTypeRc {
        let fullname = if namespace.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", namespace, name)
        };

        if let Some(existing) = self.get_by_fullname(&fullname) {
            return existing;
        }

        self.get_or_create_synthetic(fullname, || {
            ManagedType::new(
                self.next_synthetic_token(),
                TypeFlavor::Class,
                namespace.to_string(),
                name.to_string(),
                0,
            )
        })
    }

    /// The number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// True if no types are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Iterates over all registered types.
    pub fn iter(&self) -> impl Iterator<Item = ManagedTypeRc> + '_ {
        self.types.iter().map(|entry| entry.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_interning() {
        let registry = TypeRegistry::new();

        let a = registry.get_primitive(PrimitiveKind::I4);
        let b = registry.get_primitive(PrimitiveKind::I4);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.fullname(), "System.Int32");

        assert!(registry.get_by_fullname("System.Int32").is_some());
        assert!(registry.get(&a.token).is_some());
    }

    #[test]
    fn test_insert_and_lookup() {
        let registry = TypeRegistry::new();
        let ty = Arc::new(ManagedType::new(
            Token::new(0x02000001),
            TypeFlavor::Class,
            "MyGame".to_string(),
            "Player".to_string(),
            0,
        ));

        registry.insert(ty.clone()).unwrap();
        assert!(Arc::ptr_eq(
            &registry.get(&Token::new(0x02000001)).unwrap(),
            &ty
        ));
        assert!(Arc::ptr_eq(
            &registry.get_by_fullname("MyGame.Player").unwrap(),
            &ty
        ));

        let duplicate = Arc::new(ManagedType::new(
            Token::new(0x02000001),
            TypeFlavor::Class,
            "MyGame".to_string(),
            "Other".to_string(),
            0,
        ));
        assert!(registry.insert(duplicate).is_err());
    }

    #[test]
    fn test_synthetic_interning() {
        let registry = TypeRegistry::new();
        let int32 = registry.get_primitive(PrimitiveKind::I4);

        let a = registry.array_of(&int32);
        let b = registry.array_of(&int32);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.fullname(), "System.Int32[]");
        assert_eq!(a.token.table(), 0xF0);

        let byref = registry.byref_of(&int32);
        assert_eq!(byref.fullname(), "System.Int32&");
        assert!(!Arc::ptr_eq(&a, &byref));
    }

    #[test]
    fn test_generic_instance_interning() {
        let registry = TypeRegistry::new();
        let int32 = registry.get_primitive(PrimitiveKind::I4);
        let definition = Arc::new(ManagedType::new(
            Token::new(0x02000001),
            TypeFlavor::Class,
            "System.Collections.Generic".to_string(),
            "List`1".to_string(),
            0,
        ));
        registry.insert(definition.clone()).unwrap();

        let a = registry.generic_instance(&definition, &[int32.clone()]);
        let b = registry.generic_instance(&definition, &[int32.clone()]);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(
            a.fullname(),
            "System.Collections.Generic.List`1<System.Int32>"
        );

        let string = registry.get_primitive(PrimitiveKind::String);
        let c = registry.generic_instance(&definition, &[string]);
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_generic_parameter_placeholder() {
        use crate::metadata::typesystem::GenericParamSlot;

        let registry = TypeRegistry::new();
        let slot = Arc::new(GenericParamSlot::new(3, "T".to_string(), 0));

        let a = registry.generic_parameter(&slot);
        let b = registry.generic_parameter(&slot);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.fullname(), "T");
        assert!(matches!(a.flavor, TypeFlavor::GenericParameter { index: 3 }));
        assert!(slot.placeholder().is_some());
    }

    #[test]
    fn test_external_type_prefers_existing() {
        let registry = TypeRegistry::new();
        let real = Arc::new(ManagedType::new(
            Token::new(0x02000001),
            TypeFlavor::Class,
            "System".to_string(),
            "Attribute".to_string(),
            0,
        ));
        registry.insert(real.clone()).unwrap();

        let resolved = registry.external_type("System", "Attribute");
        assert!(Arc::ptr_eq(&resolved, &real));

        let shell = registry.external_type("System", "Exception");
        assert_eq!(shell.fullname(), "System.Exception");
        assert_eq!(shell.token.table(), 0xF0);
    }
}
