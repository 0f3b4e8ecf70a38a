//! End-to-end reconstruction over a hand-built native image.

use std::collections::HashMap;

use aotscope::prelude::*;

const IMAGE_BASE: u64 = 0x1_4000_0000;

/// A 64-bit binary with a single mapped code section at RVA 0x1000.
struct FixtureBinary {
    field_offsets: HashMap<u32, u64>,
}

impl FixtureBinary {
    fn new() -> Self {
        // Widget's instance fields are laid out out of declaration order.
        let mut field_offsets = HashMap::new();
        field_offsets.insert(0, 8);
        field_offsets.insert(1, 0);
        field_offsets.insert(2, 16);
        Self { field_offsets }
    }
}

impl AotBinary for FixtureBinary {
    fn pointer_width(&self) -> PointerWidth {
        PointerWidth::X64
    }

    fn field_offset(
        &self,
        _type_index: u32,
        _field_position: usize,
        field_index: u32,
        _is_value_type: bool,
        _is_static: bool,
    ) -> u64 {
        self.field_offsets
            .get(&field_index)
            .copied()
            .unwrap_or(u64::from(field_index) * 8)
    }

    fn rva_of(&self, va: u64) -> u64 {
        va - IMAGE_BASE
    }

    fn try_map_virtual_address(&self, va: u64) -> Option<u64> {
        let rva = va.checked_sub(IMAGE_BASE)?;
        (0x1000..0x2000).contains(&rva).then(|| rva - 0xC00)
    }
}

fn int32() -> NativeTypeRef {
    NativeTypeRef::Primitive(PrimitiveKind::I4)
}

fn void() -> NativeTypeRef {
    NativeTypeRef::Primitive(PrimitiveKind::Void)
}

fn method(
    name: &str,
    token: u32,
    method_index: u32,
    flags: u32,
    return_type: NativeTypeRef,
    params: Vec<NativeParamDescriptor>,
    slot: u16,
    address: u64,
) -> NativeMethodDescriptor {
    NativeMethodDescriptor {
        name: name.to_string(),
        token,
        method_index,
        flags,
        return_type,
        params,
        generic_container: None,
        slot,
        address,
    }
}

fn param(name: &str, param_type: NativeTypeRef) -> NativeParamDescriptor {
    NativeParamDescriptor {
        name: name.to_string(),
        param_type,
        is_byref: false,
        flags: 0,
        default_value: None,
    }
}

fn field(
    name: &str,
    token: u32,
    field_index: u32,
    field_type: NativeTypeRef,
    flags: u32,
) -> NativeFieldDescriptor {
    NativeFieldDescriptor {
        name: name.to_string(),
        token,
        field_index,
        field_type,
        flags,
        default_value: None,
        initial_value: None,
    }
}

fn bare_type(token: u32, type_index: u32, namespace: &str, name: &str) -> NativeTypeDescriptor {
    NativeTypeDescriptor {
        token,
        type_index,
        namespace: namespace.to_string(),
        name: name.to_string(),
        flags: 0,
        is_value_type: false,
        is_interface: false,
        declaring_type: None,
        base: None,
        interfaces: Vec::new(),
        generic_container: None,
        fields: Vec::new(),
        methods: Vec::new(),
        properties: Vec::new(),
        events: Vec::new(),
    }
}

/// Type indices: 0 = System.Object, 1 = System.String, 2 = System.IDisposable,
/// 3 = MyGame.Widget.
fn fixture_image() -> NativeImage {
    let object = bare_type(0x0200_0001, 0, "System", "Object");

    let mut string = bare_type(0x0200_0002, 1, "System", "String");
    string.base = Some(NativeTypeRef::TypeIndex(0));
    string.fields = vec![
        field("m_stringLength", 0x0400_0010, 10, int32(), 0x1),
        field(
            "m_firstChar",
            0x0400_0011,
            11,
            NativeTypeRef::Primitive(PrimitiveKind::Char),
            0x1,
        ),
        // public static
        field("Empty", 0x0400_0012, 12, NativeTypeRef::TypeIndex(1), 0x16),
    ];

    let mut disposable = bare_type(0x0200_0003, 2, "System", "IDisposable");
    disposable.is_interface = true;
    // public virtual abstract hidebysig
    disposable.methods = vec![method(
        "Dispose",
        0x0600_0010,
        10,
        0x6 | 0x40 | 0x80 | 0x400,
        void(),
        Vec::new(),
        0,
        0,
    )];

    let mut widget = bare_type(0x0200_0004, 3, "MyGame", "Widget");
    widget.base = Some(NativeTypeRef::TypeIndex(0));
    widget.interfaces = vec![NativeTypeRef::TypeIndex(2)];
    widget.fields = vec![
        field("a", 0x0400_0001, 0, int32(), 0x1),
        field("b", 0x0400_0002, 1, int32(), 0x1),
        field("c", 0x0400_0003, 2, int32(), 0x1),
    ];
    widget.methods = vec![
        // public virtual hidebysig
        method(
            "Update",
            0x0600_0001,
            0,
            0x6 | 0x40 | 0x80,
            void(),
            vec![param("count", int32())],
            3,
            IMAGE_BASE + 0x1100,
        ),
        // private virtual final hidebysig: an explicit interface implementation
        method(
            "System.IDisposable.Dispose",
            0x0600_0002,
            1,
            0x1 | 0x20 | 0x40 | 0x80,
            void(),
            Vec::new(),
            4,
            IMAGE_BASE + 0x1180,
        ),
        // public specialname hidebysig
        method(
            "get_Count",
            0x0600_0003,
            2,
            0x6 | 0x80 | 0x800,
            int32(),
            Vec::new(),
            u16::MAX,
            IMAGE_BASE + 0x1200,
        ),
    ];
    widget.properties = vec![NativePropertyDescriptor {
        name: "Count".to_string(),
        token: 0x1700_0001,
        flags: 0,
        getter: Some(2),
        setter: None,
    }];

    NativeImage {
        name: "Assembly-CSharp.dll".to_string(),
        types: vec![object, string, disposable, widget],
    }
}

#[test]
fn test_full_reconstruction() {
    let binary = FixtureBinary::new();
    let store = IdentityStore::new();
    let reconstructor = MetadataReconstructor::new(&binary, &store);

    let module = reconstructor
        .reconstruct(&fixture_image())
        .expect("reconstruction should succeed");
    assert_eq!(module.name, "Assembly-CSharp.dll");

    // Four descriptors plus five markers plus the injected exception.
    assert_eq!(module.types.count(), 10);

    let registry = store.registry();
    let widget = registry.get_by_fullname("MyGame.Widget").unwrap();
    assert_eq!(
        widget.base().and_then(ManagedTypeRef::fullname),
        Some("System.Object".to_string())
    );
    assert_eq!(
        widget
            .interfaces
            .iter()
            .next()
            .and_then(|(_, i)| i.fullname()),
        Some("System.IDisposable".to_string())
    );

    // The layout is ordered by compiler-assigned offset, not declaration order.
    let layout = store.field_layout(widget.token);
    assert_eq!(
        layout
            .iter()
            .map(|entry| (entry.name.as_str(), entry.offset))
            .collect::<Vec<_>>(),
        vec![("b", 0), ("a", 8), ("c", 16)]
    );

    // String's character field is really the start of the character buffer.
    let string = registry.get_by_fullname("System.String").unwrap();
    let first_char = string
        .fields
        .iter()
        .find(|(_, f)| f.name == "m_firstChar")
        .map(|(_, f)| f.clone())
        .unwrap();
    assert_eq!(
        first_char.field_type.fullname(),
        Some("System.Char[]".to_string())
    );

    // Stub bodies: void return gets an empty return, a primitive return a
    // zero-initialized one, and the abstract interface method none at all.
    let update = store.method(Token::new(0x0600_0001)).unwrap();
    assert_eq!(update.body(), Some(StubBody::EmptyReturn));
    let getter = store.method(Token::new(0x0600_0003)).unwrap();
    assert_eq!(getter.body(), Some(StubBody::ZeroInitReturn));
    let dispose_base = store.method(Token::new(0x0600_0010)).unwrap();
    assert_eq!(dispose_base.body(), None);

    // The property picked up its type from the getter's return.
    let (_, count_property) = widget.properties.iter().next().unwrap();
    assert_eq!(
        count_property.property_type.fullname(),
        Some("System.Int32".to_string())
    );
    assert!(count_property.getter().is_some());
    assert!(count_property.setter().is_none());

    // Slots: Update carries one, the property getter does not.
    assert_eq!(update.slot, Some(3));
    assert_eq!(getter.slot, None);
    assert!(store.virtual_method_by_slot(3).is_some());

    // No diagnostics on a clean image.
    assert!(store.diagnostics().is_empty());
}

#[test]
fn test_provenance_annotations() {
    let binary = FixtureBinary::new();
    let store = IdentityStore::new();
    let reconstructor = MetadataReconstructor::new(&binary, &store);
    reconstructor.reconstruct(&fixture_image()).unwrap();

    let update = store.method(Token::new(0x0600_0001)).unwrap();
    let attributes: Vec<_> = update
        .custom_attributes
        .iter()
        .map(|(_, a)| a)
        .collect();
    assert_eq!(attributes.len(), 2);

    let address = attributes
        .iter()
        .find(|a| {
            a.attribute_type.fullname()
                == Some("AotscopeInjected.AddressAttribute".to_string())
        })
        .expect("address marker should be present");
    assert_eq!(address.field("RVA"), Some("0x1100"));
    assert_eq!(address.field("VA"), Some("0x140001100"));
    assert_eq!(address.field("Offset"), Some("0x500"));
    assert_eq!(address.field("Slot"), Some("0x3"));

    let token = attributes
        .iter()
        .find(|a| {
            a.attribute_type.fullname()
                == Some("AotscopeInjected.TokenAttribute".to_string())
        })
        .expect("token marker should be present");
    assert_eq!(token.field("Token"), Some("0x6000001"));

    let widget = store.registry().get_by_fullname("MyGame.Widget").unwrap();
    let field_a = widget
        .fields
        .iter()
        .find(|(_, f)| f.name == "a")
        .map(|(_, f)| f.clone())
        .unwrap();
    let offset_marker = field_a
        .custom_attributes
        .iter()
        .find(|(_, a)| {
            a.attribute_type.fullname()
                == Some("AotscopeInjected.FieldOffsetAttribute".to_string())
        })
        .map(|(_, a)| a)
        .expect("field offset marker should be present");
    assert_eq!(offset_marker.field("Offset"), Some("0x8"));

    // A virtual method without a compiled body still records its slot.
    let dispose_base = store.method(Token::new(0x0600_0010)).unwrap();
    let slot_marker = dispose_base
        .custom_attributes
        .iter()
        .find(|(_, a)| {
            a.attribute_type.fullname()
                == Some("AotscopeInjected.AddressAttribute".to_string())
        })
        .map(|(_, a)| a)
        .expect("slot-only address marker should be present");
    assert_eq!(slot_marker.field("Slot"), Some("0x0"));
    assert_eq!(slot_marker.field("RVA"), None);
    assert_eq!(slot_marker.field("VA"), None);
    assert_eq!(slot_marker.field("Offset"), None);

    // Static fields get a token marker but no offset marker; their offsets
    // live in the static-data area, not the instance layout.
    let string = store.registry().get_by_fullname("System.String").unwrap();
    let empty = string
        .fields
        .iter()
        .find(|(_, f)| f.name == "Empty")
        .map(|(_, f)| f.clone())
        .unwrap();
    assert!(empty.custom_attributes.iter().all(|(_, a)| {
        a.attribute_type.fullname()
            != Some("AotscopeInjected.FieldOffsetAttribute".to_string())
    }));
    assert!(empty.custom_attributes.iter().any(|(_, a)| {
        a.attribute_type.fullname() == Some("AotscopeInjected.TokenAttribute".to_string())
    }));
}

#[test]
fn test_suppressed_provenance_still_injects_exception() {
    let binary = FixtureBinary::new();
    let store = IdentityStore::new();
    let reconstructor = MetadataReconstructor::new(&binary, &store).with_options(
        ReconstructionOptions {
            suppress_provenance: true,
        },
    );

    let module = reconstructor.reconstruct(&fixture_image()).unwrap();
    // Four descriptors plus the exception, no markers.
    assert_eq!(module.types.count(), 5);
    assert!(store
        .registry()
        .get_by_fullname("AotscopeInjected.AnalysisFailedException")
        .is_some());
    assert!(store
        .registry()
        .get_by_fullname("AotscopeInjected.TokenAttribute")
        .is_none());

    let update = store.method(Token::new(0x0600_0001)).unwrap();
    assert_eq!(update.custom_attributes.count(), 0);
}

#[test]
fn test_explicit_override_wiring() {
    let binary = FixtureBinary::new();
    let store = IdentityStore::new();
    let module = MetadataReconstructor::new(&binary, &store)
        .reconstruct(&fixture_image())
        .unwrap();

    OverrideResolver::new(&store).resolve_module(&module);

    let dispose = store.method(Token::new(0x0600_0002)).unwrap();
    let edges: Vec<_> = dispose.overrides.iter().map(|(_, e)| e.clone()).collect();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].base.token, Token::new(0x0600_0010));
    assert!(edges[0].generic_args.is_empty());

    // Resolution is idempotent: a second pass adds nothing.
    OverrideResolver::new(&store).resolve_module(&module);
    assert_eq!(dispose.overrides.count(), 1);

    // Unqualified methods pick up no edges.
    let update = store.method(Token::new(0x0600_0001)).unwrap();
    assert_eq!(update.overrides.count(), 0);
}

#[test]
fn test_metadata_dump() {
    let binary = FixtureBinary::new();
    let store = IdentityStore::new();
    let module = MetadataReconstructor::new(&binary, &store)
        .reconstruct(&fixture_image())
        .unwrap();

    let dump = build_metadata_dump(&store, &module, &binary);

    assert!(dump.contains("Type: MyGame.Widget"));
    assert!(dump.contains("\tBase: System.Object"));
    assert!(dump.contains("\tImplements: System.IDisposable"));
    // Fields in layout order with their offsets.
    let b_pos = dump.find("instance field System.Int32 b at offset 0x0").unwrap();
    let a_pos = dump.find("instance field System.Int32 a at offset 0x8").unwrap();
    assert!(b_pos < a_pos);
    assert!(dump.contains(
        "public System.Void Update at file offset 0x00000500, address 0x140001100, slot 3"
    ));
    assert!(dump.contains("parameter count: System.Int32"));
}

#[test]
fn test_duplicate_token_is_rejected() {
    let binary = FixtureBinary::new();
    let store = IdentityStore::new();

    let mut image = fixture_image();
    let mut duplicate = bare_type(0x0200_0004, 4, "MyGame", "Gadget");
    duplicate.base = Some(NativeTypeRef::TypeIndex(0));
    image.types.push(duplicate);

    let result = MetadataReconstructor::new(&binary, &store).reconstruct(&image);
    assert!(matches!(result, Err(Error::Malformed { .. })));
}
