//! Reconstruction of the managed type graph from native descriptors.
//!
//! The [`MetadataReconstructor`] runs three phases over a [`NativeImage`]:
//!
//! 1. **Shell creation** - one empty [`crate::metadata::typesystem::ManagedType`]
//!    per native type descriptor, registered under its token and linear type
//!    index before any cross-referencing begins. The graph is cyclic, so every
//!    later phase resolves references against shells that already exist.
//! 2. **Hierarchy configuration** - per type, generic parameter slots first
//!    (base and interface references may mention them), then the base type,
//!    then the interface list. The full pass completes before any member
//!    population starts.
//! 3. **Population** - provenance shapes injected once per module, then
//!    per-type member population in the fixed order fields, methods,
//!    properties, events. Types are independent at this point, so the pass
//!    runs in parallel. Any per-type failure is wrapped in
//!    [`Error::TypePopulation`] and aborts the run.
//!
//! Override edges are wired afterwards by
//! [`crate::metadata::overrides::OverrideResolver`].

mod dump;
mod provenance;

use std::sync::Arc;

use rayon::prelude::*;

use crate::{
    metadata::{
        diagnostics::DiagnosticCategory,
        identity::IdentityStore,
        member::{
            ManagedEvent, ManagedField, ManagedMethod, ManagedProperty, Param, StubBody, NO_SLOT,
        },
        token::Token,
        typesystem::{
            ManagedModule, ManagedTypeRc, ManagedTypeRef, PrimitiveKind, TypeFlavor,
            SYSTEM_MULTICAST_DELEGATE,
        },
    },
    native::{
        AotBinary, NativeGenericContainer, NativeImage, NativeTypeDescriptor, NativeTypeRef,
    },
    Error, Result,
};

pub use dump::build_metadata_dump;
pub use provenance::{InjectedShapes, MarkerShapes, INJECTED_NAMESPACE};

/// Options controlling reconstruction behavior.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconstructionOptions {
    /// Suppresses the injected marker attribute types and all provenance
    /// annotations. The analysis-failure exception is injected regardless.
    pub suppress_provenance: bool,
}

/// Rebuilds the managed type graph of one AOT-compiled binary.
pub struct MetadataReconstructor<'a> {
    binary: &'a dyn AotBinary,
    store: &'a IdentityStore,
    options: ReconstructionOptions,
}

impl<'a> MetadataReconstructor<'a> {
    /// Creates a reconstructor with default options.
    #[must_use]
    pub fn new(binary: &'a dyn AotBinary, store: &'a IdentityStore) -> Self {
        Self {
            binary,
            store,
            options: ReconstructionOptions::default(),
        }
    }

    /// Replaces the reconstruction options.
    #[must_use]
    pub fn with_options(mut self, options: ReconstructionOptions) -> Self {
        self.options = options;
        self
    }

    /// Runs all three phases over `image` and returns the reconstructed module.
    ///
    /// # Errors
    /// Returns an error on duplicate tokens, unresolvable type references, or
    /// any per-type population failure (wrapped in [`Error::TypePopulation`]).
    pub fn reconstruct(&self, image: &NativeImage) -> Result<ManagedModule> {
        let module = self.create_shells(image)?;
        self.configure_hierarchy(image)?;
        self.populate_image(image, &module)?;
        Ok(module)
    }

    /// Phase 1: creates and registers an empty shell per native descriptor,
    /// then wires nesting relations between the shells.
    ///
    /// # Errors
    /// Returns an error when two descriptors carry the same token.
    pub fn create_shells(&self, image: &NativeImage) -> Result<ManagedModule> {
        let module = ManagedModule::new(image.name.clone());
        let registry = self.store.registry();

        for descriptor in &image.types {
            let flavor = if descriptor.is_interface {
                TypeFlavor::Interface
            } else if descriptor.is_value_type {
                TypeFlavor::ValueType
            } else {
                TypeFlavor::Class
            };

            let ty = Arc::new(crate::metadata::typesystem::ManagedType::new(
                Token::new(descriptor.token),
                flavor,
                descriptor.namespace.clone(),
                descriptor.name.clone(),
                descriptor.flags,
            ));

            registry.insert(ty.clone())?;
            self.store.register_type(descriptor.type_index, &ty);
            module.types.push(ty);
        }

        // Nesting relations only resolve once every shell exists.
        for descriptor in &image.types {
            let Some(declaring_index) = descriptor.declaring_type else {
                continue;
            };

            let nested = self.type_for(descriptor.type_index)?;
            let declaring = self.type_for(declaring_index)?;
            nested.set_declaring(ManagedTypeRef::new(&declaring)).ok();
            declaring.nested_types.push(ManagedTypeRef::new(&nested));
        }

        Ok(module)
    }

    /// Phase 2: generic parameter slots, base types and interface lists.
    ///
    /// Generic parameters of a type are interned strictly before its base and
    /// interface references are resolved, since those references may mention
    /// the type's own parameters.
    ///
    /// # Errors
    /// Returns an error when a raw reference cannot be resolved.
    pub fn configure_hierarchy(&self, image: &NativeImage) -> Result<()> {
        for descriptor in &image.types {
            let ty = self.type_for(descriptor.type_index)?;

            if let Some(container) = &descriptor.generic_container {
                self.attach_generic_params(container, &ty.generic_params)?;
            }

            if let Some(base) = &descriptor.base {
                let base = self.import_type(base)?;
                ty.set_base(ManagedTypeRef::new(&base)).ok();
            }

            for interface in &descriptor.interfaces {
                let interface = self.import_type(interface)?;
                ty.interfaces.push(ManagedTypeRef::new(&interface));
            }
        }

        Ok(())
    }

    /// Phase 3: injects provenance shapes once, then populates every type's
    /// members in parallel.
    ///
    /// # Errors
    /// Any per-type failure is wrapped in [`Error::TypePopulation`] with the
    /// identifying context of the failing type and returned; the run must be
    /// aborted, a partially-populated graph is not usable downstream.
    pub fn populate_image(&self, image: &NativeImage, module: &ManagedModule) -> Result<()> {
        let shapes = InjectedShapes::inject(
            self.store.registry(),
            module,
            !self.options.suppress_provenance,
        );
        module.set_injected(Arc::new(shapes)).ok();

        image.types.par_iter().try_for_each(|descriptor| {
            self.copy_native_data(descriptor, module).map_err(|source| {
                let declaring_type = descriptor.declaring_type.and_then(|index| {
                    self.store.type_by_index(index).map(|ty| ty.fullname())
                });
                Error::TypePopulation {
                    type_name: self
                        .store
                        .type_by_index(descriptor.type_index)
                        .map_or_else(|| descriptor.name.clone(), |ty| ty.fullname()),
                    module: module.name.clone(),
                    declaring_type,
                    image: image.name.clone(),
                    source: Box::new(source),
                }
            })
        })
    }

    /// Populates one type's members in the fixed order fields, methods,
    /// properties, events.
    fn copy_native_data(
        &self,
        descriptor: &NativeTypeDescriptor,
        module: &ManagedModule,
    ) -> Result<()> {
        let ty = self.type_for(descriptor.type_index)?;
        let markers = module.injected().and_then(|shapes| shapes.markers());

        if let Some(markers) = markers {
            ty.custom_attributes.push(markers.token_attribute(ty.token));
        }

        self.process_fields(descriptor, &ty, markers)?;
        self.process_methods(descriptor, &ty, markers)?;
        self.process_properties(descriptor, &ty, markers);
        self.process_events(descriptor, &ty, markers)?;

        Ok(())
    }

    fn process_fields(
        &self,
        descriptor: &NativeTypeDescriptor,
        ty: &ManagedTypeRc,
        markers: Option<&MarkerShapes>,
    ) -> Result<()> {
        let registry = self.store.registry();
        let is_string = ty.fullname() == "System.String";

        for (position, native_field) in descriptor.fields.iter().enumerate() {
            let mut field_type = self.import_type(&native_field.field_type)?;

            // The native layout of System.String places the character buffer
            // contiguously after the length field, so its char field is really
            // the start of a character array, not one scalar character.
            if is_string && field_type.flavor == TypeFlavor::Char {
                field_type = registry.array_of(&registry.get_primitive(PrimitiveKind::Char));
            }

            let field = Arc::new(ManagedField::new(
                Token::new(native_field.token),
                native_field.name.clone(),
                native_field.flags,
                ManagedTypeRef::new(&field_type),
            ));

            if let Some(constant) = &native_field.default_value {
                field.set_constant(constant.clone()).ok();
            }
            if let Some(blob) = &native_field.initial_value {
                field.set_initial_value(blob.clone()).ok();
            }

            self.store.register_field(&field);
            ty.fields.push(field.clone());

            let offset = self.binary.field_offset(
                descriptor.type_index,
                position,
                native_field.field_index,
                descriptor.is_value_type,
                field.is_static(),
            );
            self.store.add_field_layout(
                ty.token,
                crate::metadata::member::FieldLayoutEntry {
                    name: field.name.clone(),
                    field_type: ManagedTypeRef::new(&field_type),
                    offset,
                    is_static: field.is_static(),
                    constant: field.constant().cloned(),
                    definition: field.clone(),
                },
            );

            if let Some(markers) = markers {
                // Static offsets point into the static-data area, not the
                // instance layout; annotating them would mislead consumers.
                if !field.is_static() {
                    field
                        .custom_attributes
                        .push(markers.field_offset_attribute(offset));
                }
                field
                    .custom_attributes
                    .push(markers.token_attribute(field.token));
            }
        }

        Ok(())
    }

    fn process_methods(
        &self,
        descriptor: &NativeTypeDescriptor,
        ty: &ManagedTypeRc,
        markers: Option<&MarkerShapes>,
    ) -> Result<()> {
        let registry = self.store.registry();
        let extends_multicast_delegate = ty
            .base()
            .and_then(ManagedTypeRef::fullname)
            .is_some_and(|name| name == SYSTEM_MULTICAST_DELEGATE);

        for native_method in &descriptor.methods {
            let method = Arc::new(ManagedMethod::new(
                Token::new(native_method.token),
                native_method.name.clone(),
                native_method.flags,
                ManagedTypeRef::new(ty),
                native_method.slot,
                native_method.method_index,
                native_method.address,
            ));

            // Generic parameters before the return type: the return type may
            // reference them.
            if let Some(container) = &native_method.generic_container {
                self.attach_generic_params(container, &method.generic_params)?;
            }

            let return_type = self.import_type(&native_method.return_type)?;
            method
                .set_return_type(ManagedTypeRef::new(&return_type))
                .ok();

            for native_param in &native_method.params {
                let mut param_type = self.import_type(&native_param.param_type)?;
                if native_param.is_byref {
                    param_type = registry.byref_of(&param_type);
                }

                method.params.push(Arc::new(Param {
                    name: native_param.name.clone(),
                    param_type: ManagedTypeRef::new(&param_type),
                    flags: native_param.flags,
                    default_value: native_param.default_value.clone(),
                }));
            }

            // Delegate subtypes stay bodyless for the later decompilation pass.
            if method.requires_body() && !extends_multicast_delegate {
                let body = if return_type.flavor == TypeFlavor::Void {
                    StubBody::EmptyReturn
                } else if return_type.is_value_type() {
                    StubBody::ZeroInitReturn
                } else {
                    StubBody::NullReturn
                };
                method.set_body(body).ok();
            }

            self.store.register_method(&method);
            if native_method.slot != NO_SLOT {
                self.store.register_virtual_slot(native_method.slot, &method);
            }
            ty.methods.push(method.clone());

            if let Some(markers) = markers {
                if method.native_address > 0 {
                    let va = method.native_address;
                    let file_offset = self.binary.try_map_virtual_address(va);
                    if file_offset.is_none() {
                        self.store.diagnostics().warning(
                            DiagnosticCategory::Provenance,
                            format!(
                                "Failed to map virtual address 0x{:x} of method {} to a file offset",
                                va, method.name
                            ),
                        );
                    }
                    method.custom_attributes.push(markers.address_attribute(
                        self.binary.rva_of(va),
                        file_offset,
                        va,
                        method.slot,
                    ));
                } else if let Some(slot) = method.slot {
                    // No compiled body, but the dispatch slot is still real
                    // provenance (abstract and interface methods).
                    method.custom_attributes.push(markers.slot_attribute(slot));
                }
                method
                    .custom_attributes
                    .push(markers.token_attribute(method.token));
            }
        }

        Ok(())
    }

    fn process_properties(
        &self,
        descriptor: &NativeTypeDescriptor,
        ty: &ManagedTypeRc,
        markers: Option<&MarkerShapes>,
    ) {
        for native_property in &descriptor.properties {
            let getter = native_property
                .getter
                .and_then(|index| self.store.method_by_index(index));
            let setter = native_property
                .setter
                .and_then(|index| self.store.method_by_index(index));

            // The property type comes from the getter's return, or from the
            // setter's sole parameter when there is no getter.
            let property_type = getter
                .as_ref()
                .and_then(|getter| getter.return_type().cloned())
                .or_else(|| {
                    setter.as_ref().and_then(|setter| {
                        setter.params.iter().next().map(|(_, p)| p.param_type.clone())
                    })
                });

            let Some(property_type) = property_type else {
                self.store.diagnostics().warning(
                    DiagnosticCategory::Method,
                    format!(
                        "Property {} on {} references no resolvable accessor",
                        native_property.name,
                        ty.fullname()
                    ),
                );
                continue;
            };

            let property = Arc::new(ManagedProperty::new(
                Token::new(native_property.token),
                native_property.name.clone(),
                native_property.flags,
                property_type,
            ));
            if let Some(getter) = getter {
                property.set_getter(getter).ok();
            }
            if let Some(setter) = setter {
                property.set_setter(setter).ok();
            }

            if let Some(markers) = markers {
                property
                    .custom_attributes
                    .push(markers.token_attribute(property.token));
            }

            ty.properties.push(property);
        }
    }

    fn process_events(
        &self,
        descriptor: &NativeTypeDescriptor,
        ty: &ManagedTypeRc,
        markers: Option<&MarkerShapes>,
    ) -> Result<()> {
        for native_event in &descriptor.events {
            let event_type = self.import_type(&native_event.event_type)?;
            let event = Arc::new(ManagedEvent::new(
                Token::new(native_event.token),
                native_event.name.clone(),
                native_event.flags,
                ManagedTypeRef::new(&event_type),
            ));

            if let Some(method) = native_event
                .add
                .and_then(|index| self.store.method_by_index(index))
            {
                event.set_add_method(method).ok();
            }
            if let Some(method) = native_event
                .remove
                .and_then(|index| self.store.method_by_index(index))
            {
                event.set_remove_method(method).ok();
            }
            if let Some(method) = native_event
                .raise
                .and_then(|index| self.store.method_by_index(index))
            {
                event.set_raise_method(method).ok();
            }

            if let Some(markers) = markers {
                event
                    .custom_attributes
                    .push(markers.token_attribute(event.token));
            }

            ty.events.push(event);
        }

        Ok(())
    }

    /// Interns the container's parameter slots into `target`, then resolves
    /// constraints. Constraints come second since they may reference sibling
    /// parameters of the same container.
    fn attach_generic_params(
        &self,
        container: &NativeGenericContainer,
        target: &crate::metadata::typesystem::GenericParamList,
    ) -> Result<()> {
        let registry = self.store.registry();

        for native_param in &container.params {
            let slot =
                self.store
                    .generic_param(native_param.index, &native_param.name, native_param.flags);
            registry.generic_parameter(&slot);
            target.push(slot);
        }

        for native_param in &container.params {
            let slot = self
                .store
                .generic_param(native_param.index, &native_param.name, native_param.flags);

            // Slots are shared; a container revisited through another
            // declaration already carries its constraints.
            if slot.constraints.count() > 0 {
                continue;
            }

            for constraint in &native_param.constraints {
                let constraint = self.import_type(constraint)?;
                slot.constraints.push(ManagedTypeRef::new(&constraint));
            }
        }

        Ok(())
    }

    /// Resolves a raw native type reference into the managed graph.
    ///
    /// # Errors
    /// Returns an error when a type index has no registered shell.
    pub fn import_type(&self, reference: &NativeTypeRef) -> Result<ManagedTypeRc> {
        let registry = self.store.registry();

        match reference {
            NativeTypeRef::Primitive(kind) => Ok(registry.get_primitive(*kind)),
            NativeTypeRef::TypeIndex(index) => self.type_for(*index),
            NativeTypeRef::Array(element) => {
                let element = self.import_type(element)?;
                Ok(registry.array_of(&element))
            }
            NativeTypeRef::ByRef(element) => {
                let element = self.import_type(element)?;
                Ok(registry.byref_of(&element))
            }
            NativeTypeRef::GenericParam(index) => {
                let slot = match self.store.generic_param_by_index(*index) {
                    Some(slot) => slot,
                    // Forward references can reach a parameter before its
                    // container is configured; the real name replaces nothing
                    // since slots are first-write interned, so synthesize one.
                    None => self
                        .store
                        .generic_param(*index, &format!("T{}", index), 0),
                };
                Ok(registry.generic_parameter(&slot))
            }
            NativeTypeRef::GenericInstance { definition, args } => {
                let definition = self.type_for(*definition)?;
                let args = args
                    .iter()
                    .map(|arg| self.import_type(arg))
                    .collect::<Result<Vec<_>>>()?;
                Ok(registry.generic_instance(&definition, &args))
            }
        }
    }

    fn type_for(&self, type_index: u32) -> Result<ManagedTypeRc> {
        self.store.type_by_index(type_index).ok_or_else(|| {
            Error::TypeError(format!(
                "No managed type registered for native type index {}",
                type_index
            ))
        })
    }
}
