//! Injected provenance shapes.
//!
//! Reconstructed entities are annotated with marker attributes carrying their
//! native origin (addresses, offsets, slots, tokens) so downstream consumers
//! of the written assembly can trace every entity back into the binary. The
//! marker types do not exist in the input; they are injected once per module
//! into a dedicated namespace, alongside an exception type that downstream
//! decompilation reports failures through.
//!
//! All marker fields are strings, and every value is rendered as a
//! `0x`-prefixed uppercase hexadecimal number. The one exception is the
//! generic marker's `Name` field, which carries a plain name.

use std::sync::Arc;

use crate::metadata::{
    attributes::CustomAttribute,
    member::{ManagedField, ManagedMethod, Param, StubBody, NO_SLOT},
    token::Token,
    typesystem::{
        ManagedModule, ManagedTypeRc, ManagedTypeRef, PrimitiveKind, TypeRegistry,
    },
};

/// Namespace all injected shapes live in
pub const INJECTED_NAMESPACE: &str = "AotscopeInjected";

/// Public field attribute flags for injected marker fields
const INJECTED_FIELD_FLAGS: u32 = 0x0006;
/// Flags for the injected exception constructor: public, hidebysig,
/// specialname, rtspecialname
const INJECTED_CTOR_FLAGS: u32 = 0x0006 | 0x0080 | 0x0800 | 0x1000;

/// The five marker attribute types injected into a module.
pub struct MarkerShapes {
    /// `AddressAttribute { RVA, Offset, VA, Slot }` - method locations
    pub address: ManagedTypeRc,
    /// `FieldOffsetAttribute { Offset }` - field byte offsets
    pub field_offset: ManagedTypeRc,
    /// `AttributeAttribute { Name, RVA, Offset }` - attribute generator locations
    pub attribute: ManagedTypeRc,
    /// `MetadataOffsetAttribute { Offset }` - raw metadata locations
    pub metadata_offset: ManagedTypeRc,
    /// `TokenAttribute { Token }` - original native tokens
    pub token: ManagedTypeRc,
}

impl MarkerShapes {
    /// Builds a token marker instance for an entity's native token.
    #[must_use]
    pub fn token_attribute(&self, token: Token) -> CustomAttribute {
        CustomAttribute::new(ManagedTypeRef::new(&self.token))
            .with_field("Token", token.provenance_string())
    }

    /// Builds a field-offset marker instance.
    #[must_use]
    pub fn field_offset_attribute(&self, offset: u64) -> CustomAttribute {
        CustomAttribute::new(ManagedTypeRef::new(&self.field_offset))
            .with_field("Offset", format!("0x{:X}", offset))
    }

    /// Builds an address marker instance for a method with a compiled body.
    ///
    /// The file offset is omitted when the virtual address could not be
    /// mapped; the slot is omitted when the method owns none.
    #[must_use]
    pub fn address_attribute(
        &self,
        rva: u64,
        file_offset: Option<u64>,
        va: u64,
        slot: Option<u16>,
    ) -> CustomAttribute {
        let mut attribute = CustomAttribute::new(ManagedTypeRef::new(&self.address))
            .with_field("RVA", format!("0x{:X}", rva));

        if let Some(file_offset) = file_offset {
            attribute = attribute.with_field("Offset", format!("0x{:X}", file_offset));
        }

        attribute = attribute.with_field("VA", format!("0x{:X}", va));

        if let Some(slot) = slot {
            attribute = attribute.with_field("Slot", format!("0x{:X}", slot));
        }

        attribute
    }

    /// Builds an address marker carrying only the dispatch slot, for virtual
    /// methods without a compiled body.
    #[must_use]
    pub fn slot_attribute(&self, slot: u16) -> CustomAttribute {
        CustomAttribute::new(ManagedTypeRef::new(&self.address))
            .with_field("Slot", format!("0x{:X}", slot))
    }
}

/// The shapes injected into one reconstructed module.
///
/// The analysis-failure exception is always injected; the marker attribute
/// types only when provenance annotation is enabled.
pub struct InjectedShapes {
    /// `AnalysisFailedException`, with a message-taking constructor
    pub analysis_failed: ManagedTypeRc,
    markers: Option<MarkerShapes>,
}

impl InjectedShapes {
    /// Injects the shapes into `module`, registering them in `registry`.
    ///
    /// # Arguments
    /// * `registry`        - The registry of the binary being reconstructed
    /// * `module`          - The module receiving the injected types
    /// * `with_markers`    - False suppresses the marker attribute types
    pub fn inject(registry: &TypeRegistry, module: &ManagedModule, with_markers: bool) -> Self {
        let markers = with_markers.then(|| MarkerShapes {
            address: inject_marker(
                registry,
                module,
                "AddressAttribute",
                &["RVA", "Offset", "VA", "Slot"],
            ),
            field_offset: inject_marker(registry, module, "FieldOffsetAttribute", &["Offset"]),
            attribute: inject_marker(
                registry,
                module,
                "AttributeAttribute",
                &["Name", "RVA", "Offset"],
            ),
            metadata_offset: inject_marker(
                registry,
                module,
                "MetadataOffsetAttribute",
                &["Offset"],
            ),
            token: inject_marker(registry, module, "TokenAttribute", &["Token"]),
        });

        Self {
            analysis_failed: inject_exception(registry, module),
            markers,
        }
    }

    /// The marker shapes, `None` when provenance annotation is suppressed.
    #[must_use]
    pub fn markers(&self) -> Option<&MarkerShapes> {
        self.markers.as_ref()
    }
}

/// Injects one marker attribute type with public string fields.
fn inject_marker(
    registry: &TypeRegistry,
    module: &ManagedModule,
    name: &str,
    field_names: &[&str],
) -> ManagedTypeRc {
    let string_type = registry.get_primitive(PrimitiveKind::String);
    let attribute_base = registry.external_type("System", "Attribute");

    let marker = registry.external_type(INJECTED_NAMESPACE, name);
    marker
        .set_base(ManagedTypeRef::new(&attribute_base))
        .ok();

    for field_name in field_names {
        marker.fields.push(Arc::new(ManagedField::new(
            registry.next_synthetic_token(),
            (*field_name).to_string(),
            INJECTED_FIELD_FLAGS,
            ManagedTypeRef::new(&string_type),
        )));
    }

    inject_default_ctor(registry, &marker);

    module.types.push(marker.clone());
    marker
}

/// Gives an injected type a parameterless public constructor.
fn inject_default_ctor(registry: &TypeRegistry, owner: &ManagedTypeRc) {
    let void_type = registry.get_primitive(PrimitiveKind::Void);

    let ctor = ManagedMethod::new(
        registry.next_synthetic_token(),
        ".ctor".to_string(),
        INJECTED_CTOR_FLAGS,
        ManagedTypeRef::new(owner),
        NO_SLOT,
        u32::MAX,
        0,
    );
    ctor.set_return_type(ManagedTypeRef::new(&void_type)).ok();
    ctor.set_body(StubBody::EmptyReturn).ok();
    owner.methods.push(Arc::new(ctor));
}

/// Injects the analysis-failure exception type with its message constructor.
fn inject_exception(registry: &TypeRegistry, module: &ManagedModule) -> ManagedTypeRc {
    let exception_base = registry.external_type("System", "Exception");
    let string_type = registry.get_primitive(PrimitiveKind::String);
    let void_type = registry.get_primitive(PrimitiveKind::Void);

    let exception = registry.external_type(INJECTED_NAMESPACE, "AnalysisFailedException");
    exception
        .set_base(ManagedTypeRef::new(&exception_base))
        .ok();

    let ctor = ManagedMethod::new(
        registry.next_synthetic_token(),
        ".ctor".to_string(),
        INJECTED_CTOR_FLAGS,
        ManagedTypeRef::new(&exception),
        NO_SLOT,
        u32::MAX,
        0,
    );
    ctor.set_return_type(ManagedTypeRef::new(&void_type)).ok();
    ctor.params.push(Arc::new(Param {
        name: "message".to_string(),
        param_type: ManagedTypeRef::new(&string_type),
        flags: 0,
        default_value: None,
    }));
    ctor.set_body(StubBody::EmptyReturn).ok();
    exception.methods.push(Arc::new(ctor));

    module.types.push(exception.clone());
    exception
}
