//! Explicit override edge resolution.
//!
//! Native metadata cannot express explicit interface implementations or base
//! method overrides directly; the only surviving evidence is naming. The
//! [`OverrideResolver`] is a finishing pass over the reconstructed graph that
//! wires override edges from two sources:
//!
//! - **Compiler-generated state machines** (`<`-prefixed type names):
//!   iterator and async types implement well-known interfaces, and their
//!   methods follow fixed name rules (`MoveNext`, interface-qualified
//!   `Dispose` / `GetEnumerator`, `SetStateMachine`).
//! - **Name-qualified explicit overrides** (general case): a method named
//!   `Namespace.IBase.Member` overrides `Member` on `Namespace.IBase`,
//!   resolved purely by name through the registry's fullname index.
//!
//! Every failure here is recoverable: a diagnostic is recorded and only the
//! affected edge is skipped. The pass must not run before every type's
//! members are populated, since base methods are looked up across types.

mod names;

pub use names::{split_qualified_method_name, QualifiedTypeName};

use std::sync::Arc;

use crate::metadata::{
    diagnostics::DiagnosticCategory,
    identity::IdentityStore,
    member::{MethodOverride, MethodRc},
    typesystem::{
        ManagedModule, ManagedTypeRc, ManagedTypeRef, TypeFlavor,
    },
};

const IENUMERATOR: &str = "System.Collections.IEnumerator";
const IENUMERABLE: &str = "System.Collections.IEnumerable";
const IDISPOSABLE: &str = "System.IDisposable";
const GENERIC_IENUMERATOR: &str = "System.Collections.Generic.IEnumerator`1";
const GENERIC_IENUMERABLE: &str = "System.Collections.Generic.IEnumerable`1";
const GENERIC_IENUMERATOR_PREFIX: &str = "System.Collections.Generic.IEnumerator";
const GENERIC_IENUMERABLE_PREFIX: &str = "System.Collections.Generic.IEnumerable";
const IASYNC_STATE_MACHINE: &str = "System.Runtime.CompilerServices.IAsyncStateMachine";

/// The well-known interfaces a compiler-generated state machine implements.
#[derive(Default)]
struct StateMachineInterfaces {
    enumerator: Option<ManagedTypeRc>,
    enumerable: Option<ManagedTypeRc>,
    disposable: Option<ManagedTypeRc>,
    generic_enumerator: Option<ManagedTypeRc>,
    generic_enumerable: Option<ManagedTypeRc>,
}

/// Wires explicit override edges over a populated type graph.
pub struct OverrideResolver<'a> {
    store: &'a IdentityStore,
}

impl<'a> OverrideResolver<'a> {
    /// Creates a resolver over the store the graph was reconstructed into.
    #[must_use]
    pub fn new(store: &'a IdentityStore) -> Self {
        Self { store }
    }

    /// Resolves override edges for every type of `module`.
    pub fn resolve_module(&self, module: &ManagedModule) {
        for (_, ty) in module.types.iter() {
            self.resolve_type(ty);
        }
    }

    /// Resolves override edges for one type. Additive only: existing edges
    /// are never removed, and no edge is added twice.
    pub fn resolve_type(&self, ty: &ManagedTypeRc) {
        let is_state_machine = ty.name.starts_with('<');

        if is_state_machine {
            let interfaces = self.scan_state_machine_interfaces(ty);
            self.wire_state_machine_overrides(ty, &interfaces);

            // Generic enumerators are fully handled by the fixed name rules;
            // running the general pass too would double up the edges.
            if interfaces.generic_enumerator.is_some() {
                return;
            }
        }

        for (_, method) in ty.methods.iter() {
            if is_state_machine {
                self.wire_async_state_machine(ty, method);
            }

            // Constructors and compiler-generated iterator methods are
            // excluded; only dotted names qualify as explicit overrides.
            if !method.name.contains('.')
                || method.name.starts_with('.')
                || method.name.starts_with('<')
            {
                continue;
            }

            self.wire_name_qualified_override(ty, method);
        }
    }

    fn scan_state_machine_interfaces(&self, ty: &ManagedTypeRc) -> StateMachineInterfaces {
        let mut found = StateMachineInterfaces::default();

        for (_, interface) in ty.interfaces.iter() {
            let Some(interface) = interface.upgrade() else {
                continue;
            };

            if interface.flavor == TypeFlavor::GenericInstance {
                let Some(definition) = interface
                    .element()
                    .and_then(ManagedTypeRef::fullname)
                else {
                    continue;
                };
                match definition.as_str() {
                    GENERIC_IENUMERATOR => found.generic_enumerator = Some(interface),
                    GENERIC_IENUMERABLE => found.generic_enumerable = Some(interface),
                    _ => {}
                }
                continue;
            }

            match interface.fullname().as_str() {
                IENUMERATOR => found.enumerator = Some(interface),
                IENUMERABLE => found.enumerable = Some(interface),
                IDISPOSABLE => found.disposable = Some(interface),
                _ => {}
            }
        }

        found
    }

    fn wire_state_machine_overrides(
        &self,
        ty: &ManagedTypeRc,
        interfaces: &StateMachineInterfaces,
    ) {
        for (_, method) in ty.methods.iter() {
            if let Some(enumerator) = &interfaces.enumerator {
                if method.name.starts_with(IENUMERATOR) || method.name == "MoveNext" {
                    let base_name = last_segment(&method.name);
                    self.add_interface_override(method, enumerator, base_name, &[]);
                    continue;
                }
            }

            if let Some(disposable) = &interfaces.disposable {
                if method.name == "System.IDisposable.Dispose" {
                    self.add_interface_override(method, disposable, "Dispose", &[]);
                    continue;
                }
            }

            if let Some(enumerable) = &interfaces.enumerable {
                if method.name == "System.Collections.IEnumerable.GetEnumerator" {
                    self.add_interface_override(method, enumerable, "GetEnumerator", &[]);
                    continue;
                }
            }

            if let Some(generic_enumerator) = &interfaces.generic_enumerator {
                if method.name.starts_with(GENERIC_IENUMERATOR_PREFIX) {
                    self.add_generic_interface_override(
                        method,
                        generic_enumerator,
                        last_segment(&method.name),
                    );
                    continue;
                }
            }

            if let Some(generic_enumerable) = &interfaces.generic_enumerable {
                if method.name.starts_with(GENERIC_IENUMERABLE_PREFIX) {
                    self.add_generic_interface_override(
                        method,
                        generic_enumerable,
                        last_segment(&method.name),
                    );
                }
            }
        }
    }

    /// Async state machines wire `MoveNext` and `SetStateMachine` to the
    /// async interface, independent of the enumerator rules.
    fn wire_async_state_machine(&self, ty: &ManagedTypeRc, method: &MethodRc) {
        if method.name != "MoveNext" && method.name != "SetStateMachine" {
            return;
        }

        for (_, interface) in ty.interfaces.iter() {
            let Some(interface) = interface.upgrade() else {
                continue;
            };
            if interface.fullname() == IASYNC_STATE_MACHINE {
                self.add_interface_override(method, &interface, &method.name, &[]);
            }
        }
    }

    /// The general case: `Qualifier.Member` methods override `Member` on the
    /// by-name-resolved qualifier type.
    fn wire_name_qualified_override(&self, ty: &ManagedTypeRc, method: &MethodRc) {
        let Some((qualifier, base_name)) = split_qualified_method_name(&method.name) else {
            return;
        };

        let parsed = QualifiedTypeName::parse(qualifier);
        let Some(base_type) = self.lookup_type(&parsed.lookup_name) else {
            self.store.diagnostics().warning(
                DiagnosticCategory::Override,
                format!(
                    "Failed to resolve base type {} for base method override {}",
                    qualifier, method.name
                ),
            );
            return;
        };

        if parsed.generic_args.is_empty() {
            self.wire_non_generic_override(method, &base_type, base_name);
        } else {
            self.wire_generic_override(ty, method, &base_type, base_name, &parsed.generic_args);
        }
    }

    /// Non-generic base: the unique candidate by name, arity, return type and
    /// ordered parameter types.
    fn wire_non_generic_override(
        &self,
        method: &MethodRc,
        base_type: &ManagedTypeRc,
        base_name: &str,
    ) {
        let return_name = method.return_type().and_then(ManagedTypeRef::fullname);
        let param_names: Vec<Option<String>> = method
            .params
            .iter()
            .map(|(_, p)| p.param_type.fullname())
            .collect();

        let candidates: Vec<MethodRc> = base_type
            .methods
            .iter()
            .filter(|(_, candidate)| {
                candidate.name == base_name
                    && candidate.param_count() == method.param_count()
                    && candidate.return_type().and_then(ManagedTypeRef::fullname) == return_name
                    && candidate
                        .params
                        .iter()
                        .map(|(_, p)| p.param_type.fullname())
                        .eq(param_names.iter().cloned())
            })
            .map(|(_, candidate)| candidate.clone())
            .collect();

        match candidates.as_slice() {
            [unique] => self.push_edge(method, unique, Vec::new()),
            [] => self.store.diagnostics().warning(
                DiagnosticCategory::Override,
                format!(
                    "Failed to resolve base method override: type {}, name {}",
                    base_type.fullname(),
                    base_name
                ),
            ),
            _ => self.store.diagnostics().warning(
                DiagnosticCategory::Override,
                format!(
                    "More than one potential base method for base type {}, method name {}, while considering explicit override {}",
                    base_type.fullname(),
                    base_name,
                    method.name
                ),
            ),
        }
    }

    /// Generic base: the unique candidate by name and arity, then each
    /// generic argument name resolved independently.
    fn wire_generic_override(
        &self,
        ty: &ManagedTypeRc,
        method: &MethodRc,
        base_type: &ManagedTypeRc,
        base_name: &str,
        generic_args: &[String],
    ) {
        let candidates: Vec<MethodRc> = base_type
            .methods
            .iter()
            .filter(|(_, candidate)| {
                candidate.name == base_name && candidate.param_count() == method.param_count()
            })
            .map(|(_, candidate)| candidate.clone())
            .collect();

        let base_method = match candidates.as_slice() {
            [unique] => unique.clone(),
            _ => {
                self.store.diagnostics().warning(
                    DiagnosticCategory::Override,
                    format!(
                        "No unique base method for base type {}, method name {}, parameter count {}, while considering explicit override {}",
                        base_type.fullname(),
                        base_name,
                        method.param_count(),
                        method.name
                    ),
                );
                return;
            }
        };

        let mut resolved = Vec::with_capacity(generic_args.len());
        for raw in generic_args {
            match self.resolve_generic_argument(ty, raw) {
                Some(arg) => resolved.push(ManagedTypeRef::new(&arg)),
                None => {
                    self.store.diagnostics().warning(
                        DiagnosticCategory::Override,
                        format!(
                            "Failed to resolve generic parameter \"{}\" for base method override {}",
                            raw, method.name
                        ),
                    );
                    return;
                }
            }
        }

        self.push_edge(method, &base_method, resolved);
    }

    /// Resolves one generic argument name: a by-name type lookup (recursing
    /// into nested generic arguments and array markers), falling back to a
    /// generic parameter already in scope on the overriding type.
    fn resolve_generic_argument(&self, ty: &ManagedTypeRc, raw: &str) -> Option<ManagedTypeRc> {
        let parsed = QualifiedTypeName::parse(raw);
        let registry = self.store.registry();

        if let Some(found) = self.lookup_type(&parsed.lookup_name) {
            let mut result = found;

            if !parsed.generic_args.is_empty() {
                let args = parsed
                    .generic_args
                    .iter()
                    .map(|nested| self.resolve_generic_argument(ty, nested))
                    .collect::<Option<Vec<_>>>()?;
                result = registry.generic_instance(&result, &args);
            }

            if parsed.is_array {
                result = registry.array_of(&result);
            }

            return Some(result);
        }

        // Not a type name; try the generic parameters in scope on the
        // overriding type and its declaring chain.
        let mut scope = Some(ty.clone());
        while let Some(current) = scope {
            for (_, slot) in current.generic_params.iter() {
                if slot.name == raw {
                    if let Some(placeholder) = slot.placeholder().and_then(ManagedTypeRef::upgrade)
                    {
                        return Some(placeholder);
                    }
                    return Some(registry.generic_parameter(slot));
                }
            }
            scope = current.declaring().and_then(ManagedTypeRef::upgrade);
        }

        None
    }

    /// Adds an edge to the unique method named `base_name` on `interface`.
    fn add_interface_override(
        &self,
        method: &MethodRc,
        interface: &ManagedTypeRc,
        base_name: &str,
        generic_args: &[ManagedTypeRef],
    ) {
        let candidates: Vec<MethodRc> = interface
            .methods
            .iter()
            .filter(|(_, candidate)| candidate.name == base_name)
            .map(|(_, candidate)| candidate.clone())
            .collect();

        match candidates.as_slice() {
            [unique] => self.push_edge(method, unique, generic_args.to_vec()),
            _ => self.store.diagnostics().warning(
                DiagnosticCategory::Override,
                format!(
                    "No unique method {} on interface {} for override of {}",
                    base_name,
                    interface.fullname(),
                    method.name
                ),
            ),
        }
    }

    /// Adds an edge to the definition method of a generic interface instance,
    /// instantiated with the instance's own generic arguments.
    fn add_generic_interface_override(
        &self,
        method: &MethodRc,
        interface_instance: &ManagedTypeRc,
        base_name: &str,
    ) {
        let Some(definition) = interface_instance
            .element()
            .and_then(ManagedTypeRef::upgrade)
        else {
            return;
        };

        let generic_args: Vec<ManagedTypeRef> = interface_instance
            .generic_args
            .iter()
            .map(|(_, arg)| arg.clone())
            .collect();

        self.add_interface_override(method, &definition, base_name, &generic_args);
    }

    /// Appends an override edge unless one to the same base method exists.
    fn push_edge(&self, method: &MethodRc, base: &MethodRc, generic_args: Vec<ManagedTypeRef>) {
        let already_present = method
            .overrides
            .iter()
            .any(|(_, edge)| Arc::ptr_eq(&edge.base, base));
        if already_present {
            return;
        }

        method.overrides.push(MethodOverride {
            base: base.clone(),
            generic_args,
        });
    }

    fn lookup_type(&self, lookup_name: &str) -> Option<ManagedTypeRc> {
        self.store.registry().get_by_fullname(lookup_name)
    }
}

fn last_segment(name: &str) -> &str {
    match name.rfind('.') {
        Some(dot) => &name[dot + 1..],
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{
        member::{ManagedMethod, NO_SLOT},
        token::Token,
        typesystem::{ManagedType, PrimitiveKind},
    };

    fn make_type(
        store: &IdentityStore,
        token: u32,
        namespace: &str,
        name: &str,
        flavor: TypeFlavor,
    ) -> ManagedTypeRc {
        let ty = Arc::new(ManagedType::new(
            Token::new(token),
            flavor,
            namespace.to_string(),
            name.to_string(),
            0,
        ));
        store.registry().insert(ty.clone()).unwrap();
        ty
    }

    fn add_method(ty: &ManagedTypeRc, token: u32, name: &str) -> MethodRc {
        let method = Arc::new(ManagedMethod::new(
            Token::new(token),
            name.to_string(),
            0x6,
            ManagedTypeRef::new(ty),
            NO_SLOT,
            token,
            0,
        ));
        ty.methods.push(method.clone());
        method
    }

    #[test]
    fn test_iterator_state_machine_wiring() {
        let store = IdentityStore::new();

        let enumerator = make_type(
            &store,
            0x02000001,
            "System.Collections",
            "IEnumerator",
            TypeFlavor::Interface,
        );
        let base_move_next = add_method(&enumerator, 1, "MoveNext");
        let disposable = make_type(
            &store,
            0x02000002,
            "System",
            "IDisposable",
            TypeFlavor::Interface,
        );
        let base_dispose = add_method(&disposable, 2, "Dispose");

        let state_machine = make_type(
            &store,
            0x02000003,
            "",
            "<Run>d__4",
            TypeFlavor::Class,
        );
        state_machine.interfaces.push(ManagedTypeRef::new(&enumerator));
        state_machine.interfaces.push(ManagedTypeRef::new(&disposable));
        let move_next = add_method(&state_machine, 10, "MoveNext");
        let dispose = add_method(&state_machine, 11, "System.IDisposable.Dispose");

        OverrideResolver::new(&store).resolve_type(&state_machine);

        assert_eq!(move_next.overrides.count(), 1);
        let (_, edge) = move_next.overrides.iter().next().unwrap();
        assert!(Arc::ptr_eq(&edge.base, &base_move_next));

        assert_eq!(dispose.overrides.count(), 1);
        let (_, edge) = dispose.overrides.iter().next().unwrap();
        assert!(Arc::ptr_eq(&edge.base, &base_dispose));
    }

    #[test]
    fn test_generic_enumerator_early_return() {
        let store = IdentityStore::new();
        let registry = store.registry().clone();

        let generic_enumerator = make_type(
            &store,
            0x02000001,
            "System.Collections.Generic",
            "IEnumerator`1",
            TypeFlavor::Interface,
        );
        let base_get_current = add_method(&generic_enumerator, 1, "get_Current");
        let int32 = registry.get_primitive(PrimitiveKind::I4);
        let instance = registry.generic_instance(&generic_enumerator, &[int32]);

        let state_machine = make_type(&store, 0x02000002, "", "<Iter>d__1", TypeFlavor::Class);
        state_machine.interfaces.push(ManagedTypeRef::new(&instance));
        let get_current = add_method(
            &state_machine,
            10,
            "System.Collections.Generic.IEnumerator<System.Int32>.get_Current",
        );

        OverrideResolver::new(&store).resolve_type(&state_machine);

        assert_eq!(get_current.overrides.count(), 1);
        let (_, edge) = get_current.overrides.iter().next().unwrap();
        assert!(Arc::ptr_eq(&edge.base, &base_get_current));
        assert_eq!(edge.generic_args.len(), 1);
        assert_eq!(
            edge.generic_args[0].fullname().as_deref(),
            Some("System.Int32")
        );
    }

    #[test]
    fn test_async_state_machine_wiring() {
        let store = IdentityStore::new();

        let async_interface = make_type(
            &store,
            0x02000001,
            "System.Runtime.CompilerServices",
            "IAsyncStateMachine",
            TypeFlavor::Interface,
        );
        let base_move_next = add_method(&async_interface, 1, "MoveNext");
        let base_set = add_method(&async_interface, 2, "SetStateMachine");

        let state_machine = make_type(&store, 0x02000002, "", "<RunAsync>d__2", TypeFlavor::Class);
        state_machine
            .interfaces
            .push(ManagedTypeRef::new(&async_interface));
        let move_next = add_method(&state_machine, 10, "MoveNext");
        let set_state = add_method(&state_machine, 11, "SetStateMachine");

        OverrideResolver::new(&store).resolve_type(&state_machine);

        assert!(move_next
            .overrides
            .iter()
            .any(|(_, e)| Arc::ptr_eq(&e.base, &base_move_next)));
        assert!(set_state
            .overrides
            .iter()
            .any(|(_, e)| Arc::ptr_eq(&e.base, &base_set)));
    }

    #[test]
    fn test_name_qualified_override() {
        let store = IdentityStore::new();
        let registry = store.registry().clone();
        let void = registry.get_primitive(PrimitiveKind::Void);

        let comparable = make_type(
            &store,
            0x02000001,
            "MyGame",
            "IResettable",
            TypeFlavor::Interface,
        );
        let base_reset = add_method(&comparable, 1, "Reset");
        base_reset.set_return_type(ManagedTypeRef::new(&void)).ok();

        let player = make_type(&store, 0x02000002, "MyGame", "Player", TypeFlavor::Class);
        player.interfaces.push(ManagedTypeRef::new(&comparable));
        let explicit = add_method(&player, 10, "MyGame.IResettable.Reset");
        explicit.set_return_type(ManagedTypeRef::new(&void)).ok();
        let ctor = add_method(&player, 11, ".ctor");
        let plain = add_method(&player, 12, "Update");

        OverrideResolver::new(&store).resolve_type(&player);

        assert_eq!(explicit.overrides.count(), 1);
        let (_, edge) = explicit.overrides.iter().next().unwrap();
        assert!(Arc::ptr_eq(&edge.base, &base_reset));
        assert_eq!(ctor.overrides.count(), 0);
        assert_eq!(plain.overrides.count(), 0);
    }

    #[test]
    fn test_ambiguous_override_skipped_with_diagnostic() {
        let store = IdentityStore::new();
        let registry = store.registry().clone();
        let void = registry.get_primitive(PrimitiveKind::Void);

        let base_type = make_type(
            &store,
            0x02000001,
            "MyGame",
            "IAmbiguous",
            TypeFlavor::Interface,
        );
        // Two candidates with identical name, arity, return and parameters.
        let first = add_method(&base_type, 1, "Act");
        first.set_return_type(ManagedTypeRef::new(&void)).ok();
        let second = add_method(&base_type, 2, "Act");
        second.set_return_type(ManagedTypeRef::new(&void)).ok();

        let player = make_type(&store, 0x02000002, "MyGame", "Player", TypeFlavor::Class);
        let explicit = add_method(&player, 10, "MyGame.IAmbiguous.Act");
        explicit.set_return_type(ManagedTypeRef::new(&void)).ok();

        OverrideResolver::new(&store).resolve_type(&player);

        assert_eq!(explicit.overrides.count(), 0);
        assert!(store
            .diagnostics()
            .iter()
            .any(|d| d.category == DiagnosticCategory::Override));
    }

    #[test]
    fn test_unresolvable_base_type_skipped_with_diagnostic() {
        let store = IdentityStore::new();
        let player = make_type(&store, 0x02000001, "MyGame", "Player", TypeFlavor::Class);
        let explicit = add_method(&player, 10, "MyGame.IDoesNotExist.Run");

        OverrideResolver::new(&store).resolve_type(&player);

        assert_eq!(explicit.overrides.count(), 0);
        assert_eq!(store.diagnostics().len(), 1);
    }

    #[test]
    fn test_generic_base_override_with_scope_fallback() {
        let store = IdentityStore::new();
        let registry = store.registry().clone();
        let void = registry.get_primitive(PrimitiveKind::Void);

        let dictionary = make_type(
            &store,
            0x02000001,
            "System.Collections.Generic",
            "IDictionary`2",
            TypeFlavor::Interface,
        );
        let base_add = add_method(&dictionary, 1, "Add");
        base_add.set_return_type(ManagedTypeRef::new(&void)).ok();

        let map = make_type(&store, 0x02000002, "MyGame", "Map`2", TypeFlavor::Class);
        let key_slot = store.generic_param(0, "TKey", 0);
        registry.generic_parameter(&key_slot);
        map.generic_params.push(key_slot);
        let value_slot = store.generic_param(1, "TValue", 0);
        registry.generic_parameter(&value_slot);
        map.generic_params.push(value_slot);

        let explicit = add_method(
            &map,
            10,
            "System.Collections.Generic.IDictionary<TKey, TValue>.Add",
        );
        explicit.set_return_type(ManagedTypeRef::new(&void)).ok();

        OverrideResolver::new(&store).resolve_type(&map);

        assert_eq!(explicit.overrides.count(), 1);
        let (_, edge) = explicit.overrides.iter().next().unwrap();
        assert!(Arc::ptr_eq(&edge.base, &base_add));
        assert_eq!(edge.generic_args.len(), 2);
        assert_eq!(edge.generic_args[0].name().as_deref(), Some("TKey"));
        assert_eq!(edge.generic_args[1].name().as_deref(), Some("TValue"));
    }

    #[test]
    fn test_unresolved_generic_argument_skips_edge() {
        let store = IdentityStore::new();

        let dictionary = make_type(
            &store,
            0x02000001,
            "System.Collections.Generic",
            "IDictionary`2",
            TypeFlavor::Interface,
        );
        add_method(&dictionary, 1, "Add");

        let map = make_type(&store, 0x02000002, "MyGame", "Map", TypeFlavor::Class);
        let explicit = add_method(
            &map,
            10,
            "System.Collections.Generic.IDictionary<TKey, TValue>.Add",
        );

        OverrideResolver::new(&store).resolve_type(&map);

        assert_eq!(explicit.overrides.count(), 0);
        assert!(store.diagnostics().iter().any(|d| d
            .message
            .contains("Failed to resolve generic parameter")));
    }
}
