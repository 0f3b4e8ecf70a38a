use std::sync::{Arc, RwLock};

use strum::Display;

use crate::metadata::typesystem::{ConstantValue, ManagedTypeRc};

/// Reference to an `AnalysedOperand`
pub type OperandRc = Arc<AnalysedOperand>;

/// One observed machine-level value at a point in the external analysis.
///
/// The set of operand kinds is closed: every consumer matches both variants
/// exhaustively. Operands are shared by `Arc` between the analysis context
/// and recovered argument lists, so a constant reinterpretation performed
/// during matching is visible everywhere the operand appears.
pub enum AnalysedOperand {
    /// A value with a known concrete type and value
    Constant(ConstantOperand),
    /// A local whose type may or may not have been inferred
    Local(LocalOperand),
}

/// A constant operand. Type and value are rewritable in place: the boolean
/// reinterpretation rule corrects ABI-widened booleans during matching.
pub struct ConstantOperand {
    ty: RwLock<ManagedTypeRc>,
    value: RwLock<ConstantValue>,
}

impl ConstantOperand {
    /// Create a new constant operand
    #[must_use]
    pub fn new(ty: ManagedTypeRc, value: ConstantValue) -> Self {
        Self {
            ty: RwLock::new(ty),
            value: RwLock::new(value),
        }
    }

    /// The current concrete type of this constant
    #[must_use]
    pub fn managed_type(&self) -> ManagedTypeRc {
        self.ty
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// The current value of this constant
    #[must_use]
    pub fn value(&self) -> ConstantValue {
        self.value
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Rewrites type and value in place.
    pub fn reinterpret(&self, ty: ManagedTypeRc, value: ConstantValue) {
        *self
            .ty
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = ty;
        *self
            .value
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = value;
    }
}

/// A local operand with an optionally inferred type.
pub struct LocalOperand {
    /// Name assigned by the external analysis
    pub name: String,
    /// The inferred managed type, `None` when unknown
    pub ty: Option<ManagedTypeRc>,
}

/// The integer and float argument registers of the 64-bit calling convention.
#[allow(missing_docs)]
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
#[strum(serialize_all = "lowercase")]
pub enum Register {
    Rcx,
    Rdx,
    R8,
    R9,
    Xmm0,
    Xmm1,
    Xmm2,
    Xmm3,
}

/// The integer/float register pairs, in calling-convention order.
pub const ARGUMENT_REGISTER_PAIRS: [(Register, Register); 4] = [
    (Register::Rcx, Register::Xmm0),
    (Register::Rdx, Register::Xmm1),
    (Register::R8, Register::Xmm2),
    (Register::R9, Register::Xmm3),
];

/// A snapshot of the argument registers at a call site.
///
/// The external analysis decides what counts as an empty slot: slots it
/// considers vacated hold one of the `placeholders`, compared by identity.
/// Matching only inspects the snapshot; it never mutates it.
pub struct RegisterFile {
    rcx: Option<OperandRc>,
    rdx: Option<OperandRc>,
    r8: Option<OperandRc>,
    r9: Option<OperandRc>,
    xmm0: Option<OperandRc>,
    xmm1: Option<OperandRc>,
    xmm2: Option<OperandRc>,
    xmm3: Option<OperandRc>,
    placeholders: Vec<OperandRc>,
}

impl RegisterFile {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rcx: None,
            rdx: None,
            r8: None,
            r9: None,
            xmm0: None,
            xmm1: None,
            xmm2: None,
            xmm3: None,
            placeholders: Vec::new(),
        }
    }

    /// Sets the operand observed in a register.
    pub fn set(&mut self, register: Register, operand: OperandRc) {
        *self.slot_mut(register) = Some(operand);
    }

    /// The operand in a register, `None` when the analysis saw nothing there.
    #[must_use]
    pub fn get(&self, register: Register) -> Option<OperandRc> {
        self.slot(register).clone()
    }

    /// Registers an operand the analysis considers an empty placeholder.
    pub fn add_placeholder(&mut self, operand: OperandRc) {
        self.placeholders.push(operand);
    }

    /// True if the analysis considers `operand` an empty placeholder.
    /// Identity comparison; the predicate is owned by the analysis context.
    #[must_use]
    pub fn is_placeholder(&self, operand: &OperandRc) -> bool {
        self.placeholders.iter().any(|p| Arc::ptr_eq(p, operand))
    }

    fn slot(&self, register: Register) -> &Option<OperandRc> {
        match register {
            Register::Rcx => &self.rcx,
            Register::Rdx => &self.rdx,
            Register::R8 => &self.r8,
            Register::R9 => &self.r9,
            Register::Xmm0 => &self.xmm0,
            Register::Xmm1 => &self.xmm1,
            Register::Xmm2 => &self.xmm2,
            Register::Xmm3 => &self.xmm3,
        }
    }

    fn slot_mut(&mut self, register: Register) -> &mut Option<OperandRc> {
        match register {
            Register::Rcx => &mut self.rcx,
            Register::Rdx => &mut self.rdx,
            Register::R8 => &mut self.r8,
            Register::R9 => &mut self.r9,
            Register::Xmm0 => &mut self.xmm0,
            Register::Xmm1 => &mut self.xmm1,
            Register::Xmm2 => &mut self.xmm2,
            Register::Xmm3 => &mut self.xmm3,
        }
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

/// The evaluation stack of the 32-bit calling convention. LIFO; shared with
/// the external analysis, so failed match attempts must leave it unchanged.
#[derive(Default)]
pub struct EvalStack {
    entries: Vec<OperandRc>,
}

impl EvalStack {
    /// Creates an empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Pushes an operand.
    pub fn push(&mut self, operand: OperandRc) {
        self.entries.push(operand);
    }

    /// Pops the top operand.
    pub fn pop(&mut self) -> Option<OperandRc> {
        self.entries.pop()
    }

    /// The top operand, without removing it.
    #[must_use]
    pub fn peek(&self) -> Option<&OperandRc> {
        self.entries.last()
    }

    /// Number of operands on the stack.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the stack is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A mutable call-site context: one of the two calling conventions.
pub enum CallingContext {
    /// 64-bit register passing
    Registers(RegisterFile),
    /// 32-bit stack passing
    Stack(EvalStack),
}
