use std::sync::{Arc, OnceLock};

use bitflags::bitflags;

use crate::metadata::{
    attributes::CustomAttributeList,
    token::Token,
    typesystem::{ConstantValue, GenericParamList, ManagedTypeRef},
};

/// Reference to a `ManagedMethod`
pub type MethodRc = Arc<ManagedMethod>;
/// A vector that holds a list of `ManagedMethod`
pub type MethodList = Arc<boxcar::Vec<MethodRc>>;
/// Reference to a `Param`
pub type ParamRc = Arc<Param>;
/// A vector that holds a list of `Param`
pub type ParamList = Arc<boxcar::Vec<ParamRc>>;

/// Sentinel carried by native method descriptors that own no virtual slot
pub const NO_SLOT: u16 = u16::MAX;

bitflags! {
    /// Method attribute flags as carried by native method descriptors.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MethodModifiers: u32 {
        /// Member access mask
        const MEMBER_ACCESS_MASK = 0x0007;
        /// Defined on type, else per instance
        const STATIC = 0x0010;
        /// Method may not be overridden
        const FINAL = 0x0020;
        /// Method is virtual
        const VIRTUAL = 0x0040;
        /// Method hides by name+sig, else just by name
        const HIDE_BY_SIG = 0x0080;
        /// Method does not provide an implementation
        const ABSTRACT = 0x0400;
        /// Method is special
        const SPECIAL_NAME = 0x0800;
        /// Runtime should check name encoding
        const RT_SPECIAL_NAME = 0x1000;
        /// Implementation is forwarded through PInvoke
        const PINVOKE_IMPL = 0x2000;
    }
}

/// The shape of a synthesized placeholder body.
///
/// Reconstruction does not decompile native code into method bodies; methods
/// that require a body get a minimal placeholder keyed to the return type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StubBody {
    /// `void` return, body is a bare return
    EmptyReturn,
    /// Value type return, body returns a zero-initialized local of the return type
    ZeroInitReturn,
    /// Reference type return, body returns null
    NullReturn,
}

/// An explicit override edge from a method to a base or interface method.
#[derive(Clone)]
pub struct MethodOverride {
    /// The overridden base or interface method
    pub base: MethodRc,
    /// Generic arguments resolved for the base method's declaring type,
    /// empty for non-generic overrides
    pub generic_args: Vec<ManagedTypeRef>,
}

/// A parameter of a reconstructed method.
pub struct Param {
    /// Name of the parameter
    pub name: String,
    /// The type of the parameter
    pub param_type: ManagedTypeRef,
    /// Raw parameter attribute flags
    pub flags: u32,
    /// Default value, if the descriptor carries one
    pub default_value: Option<ConstantValue>,
}

/// A method reconstructed from a native method descriptor.
///
/// Identity fields and parameters are fixed at creation. The return type and
/// placeholder body are set once during population, and override edges are
/// appended by the resolution pass that runs after all types are populated.
pub struct ManagedMethod {
    /// The native metadata token
    pub token: Token,
    /// Name of the method
    pub name: String,
    /// Raw method attribute flags
    pub flags: u32,
    /// The type declaring this method
    pub declaring_type: ManagedTypeRef,
    /// The return type
    return_type: OnceLock<ManagedTypeRef>,
    /// All parameters, in declaration order (without the implicit `this`)
    pub params: ParamList,
    /// All generic parameters this method declares
    pub generic_params: GenericParamList,
    /// Explicit override edges resolved for this method
    pub overrides: Arc<boxcar::Vec<MethodOverride>>,
    /// The synthesized placeholder body, if one was attached
    body: OnceLock<StubBody>,
    /// The virtual slot, if the descriptor assigned one
    pub slot: Option<u16>,
    /// The binary-wide native method index
    pub native_index: u32,
    /// The virtual address of the compiled method body, 0 when absent
    pub native_address: u64,
    /// All custom attributes attached to this method
    pub custom_attributes: CustomAttributeList,
}

impl ManagedMethod {
    /// Create a new `ManagedMethod`
    ///
    /// # Arguments
    /// * `token`          - The native metadata token
    /// * `name`           - Name of the method
    /// * `flags`          - Raw method attribute flags
    /// * `declaring_type` - The type declaring this method
    /// * `slot`           - Raw slot value, [`NO_SLOT`] when none is assigned
    /// * `native_index`   - The binary-wide native method index
    /// * `native_address` - Virtual address of the compiled body, 0 when absent
    #[must_use]
    pub fn new(
        token: Token,
        name: String,
        flags: u32,
        declaring_type: ManagedTypeRef,
        slot: u16,
        native_index: u32,
        native_address: u64,
    ) -> Self {
        Self {
            token,
            name,
            flags,
            declaring_type,
            return_type: OnceLock::new(),
            params: Arc::new(boxcar::Vec::new()),
            generic_params: Arc::new(boxcar::Vec::new()),
            overrides: Arc::new(boxcar::Vec::new()),
            body: OnceLock::new(),
            slot: if slot == NO_SLOT { None } else { Some(slot) },
            native_index,
            native_address,
            custom_attributes: Arc::new(boxcar::Vec::new()),
        }
    }

    /// Typed view of the raw flags
    #[must_use]
    pub fn modifiers(&self) -> MethodModifiers {
        MethodModifiers::from_bits_truncate(self.flags)
    }

    /// True if this method is static
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.modifiers().contains(MethodModifiers::STATIC)
    }

    /// True if this method is virtual
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        self.modifiers().contains(MethodModifiers::VIRTUAL)
    }

    /// True if this method must carry a body.
    ///
    /// Abstract and PInvoke-forwarded methods have no body by definition;
    /// everything else gets a synthesized placeholder.
    #[must_use]
    pub fn requires_body(&self) -> bool {
        !self
            .modifiers()
            .intersects(MethodModifiers::ABSTRACT | MethodModifiers::PINVOKE_IMPL)
    }

    /// The return type, if population has set it
    #[must_use]
    pub fn return_type(&self) -> Option<&ManagedTypeRef> {
        self.return_type.get()
    }

    /// Set the return type (can only be set once)
    pub fn set_return_type(&self, return_type: ManagedTypeRef) -> Result<(), ManagedTypeRef> {
        self.return_type.set(return_type)
    }

    /// The synthesized placeholder body, if one was attached
    #[must_use]
    pub fn body(&self) -> Option<StubBody> {
        self.body.get().copied()
    }

    /// Attach the placeholder body (can only be set once)
    pub fn set_body(&self, body: StubBody) -> Result<(), StubBody> {
        self.body.set(body)
    }

    /// Number of declared parameters, without the implicit `this`
    #[must_use]
    pub fn param_count(&self) -> usize {
        self.params.count()
    }
}
