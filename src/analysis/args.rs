use std::collections::VecDeque;
use std::sync::Arc;

use crate::{
    analysis::operand::{
        AnalysedOperand, CallingContext, EvalStack, LocalOperand, OperandRc, RegisterFile,
        ARGUMENT_REGISTER_PAIRS,
    },
    metadata::{
        identity::IdentityStore,
        member::{ManagedFieldRc, MethodRc},
        typesystem::{ConstantValue, ManagedTypeRc, PrimitiveKind, TypeFlavor},
    },
};

/// A side effect synthesized while matching a decomposed struct argument.
///
/// The native calling convention passes small value types as their individual
/// scalar fields; a successful decomposition reports how to rebuild the
/// aggregate in the analysis context.
pub enum SynthesizedAction {
    /// Allocate a fresh instance of a value type
    AllocateInstance {
        /// The synthesized instance operand
        instance: OperandRc,
        /// The value type being rebuilt
        ty: ManagedTypeRc,
    },
    /// Store a consumed scalar into a field of a synthesized instance
    FieldStore {
        /// The synthesized instance operand
        instance: OperandRc,
        /// The target field
        field: ManagedFieldRc,
        /// The consumed scalar
        source: OperandRc,
    },
}

/// A successful match against the 32-bit evaluation stack.
pub struct StackMatch {
    /// Matched operands, one per declared parameter, in declaration order
    pub args: Vec<OperandRc>,
    /// Struct decomposition side effects, in synthesis order
    pub actions: Vec<SynthesizedAction>,
}

/// The result of a successful argument recovery attempt.
pub enum RecoveredArguments {
    /// 64-bit result: one entry per parameter, `None` where the register
    /// slot was empty (a missing trailing argument)
    Registers(Vec<Option<OperandRc>>),
    /// 32-bit result: consumed operands plus synthesized actions
    Stack(StackMatch),
}

/// Matches declared method signatures against observed call-site state.
///
/// Match failure is an ordinary negative result, never an error: callers try
/// candidate signatures in turn and keep the one that matches.
pub struct ArgumentRecovery<'a> {
    store: &'a IdentityStore,
}

impl<'a> ArgumentRecovery<'a> {
    /// Creates a recovery pass over the store the graph was reconstructed into.
    #[must_use]
    pub fn new(store: &'a IdentityStore) -> Self {
        Self { store }
    }

    /// Matches `method`'s parameter list against a call-site context,
    /// dispatching on the calling convention the context models.
    ///
    /// `is_instance` removes the leading register pair on 64-bit targets
    /// (it carries `this`); `strict` enables the 64-bit leftover-argument
    /// check. Both are ignored by the 32-bit model.
    pub fn check_parameters(
        &self,
        method: &MethodRc,
        context: &mut CallingContext,
        is_instance: bool,
        strict: bool,
    ) -> Option<RecoveredArguments> {
        match context {
            CallingContext::Registers(registers) => self
                .check_parameters_x64(method, registers, is_instance, strict)
                .map(RecoveredArguments::Registers),
            CallingContext::Stack(stack) => self
                .check_parameters_x86(method, stack)
                .map(RecoveredArguments::Stack),
        }
    }

    /// 64-bit register model. Inspects a snapshot; never mutates the file
    /// (apart from in-place constant reinterpretation on accepted operands).
    pub fn check_parameters_x64(
        &self,
        method: &MethodRc,
        registers: &RegisterFile,
        is_instance: bool,
        strict: bool,
    ) -> Option<Vec<Option<OperandRc>>> {
        let mut candidates: VecDeque<Option<OperandRc>> = ARGUMENT_REGISTER_PAIRS
            .iter()
            .skip(usize::from(is_instance))
            .map(|(integer, float)| registers.get(*integer).or_else(|| registers.get(*float)))
            .collect();

        let mut matched = Vec::with_capacity(method.param_count());

        for (_, param) in method.params.iter() {
            // Nothing real left anywhere means this signature wants more
            // arguments than the call site supplied.
            if candidates.iter().all(Option::is_none) {
                return None;
            }

            let candidate = candidates.pop_front()?;

            match candidate {
                // An empty slot in the middle of real arguments is a missing
                // (defaulted) argument, not a mismatch.
                None => matched.push(None),
                Some(operand) => {
                    let declared = param.param_type.upgrade()?;
                    if !self.check_single(&operand, &declared) {
                        return None;
                    }
                    matched.push(Some(operand));
                }
            }
        }

        if strict {
            for leftover in candidates.iter().flatten() {
                if !registers.is_placeholder(leftover) {
                    // A real operand past the last parameter proves this is
                    // the wrong signature.
                    return None;
                }
            }
        }

        Some(matched)
    }

    /// 32-bit stack model with struct decomposition.
    ///
    /// On failure every popped entry, including entries consumed by a
    /// successful decomposition earlier in the attempt, is pushed back in
    /// original order. On success the stack is left advanced past everything
    /// consumed.
    pub fn check_parameters_x86(
        &self,
        method: &MethodRc,
        stack: &mut EvalStack,
    ) -> Option<StackMatch> {
        let mut popped: Vec<OperandRc> = Vec::new();
        let mut args = Vec::with_capacity(method.param_count());
        let mut actions = Vec::new();

        let restore = |stack: &mut EvalStack, popped: Vec<OperandRc>| {
            for operand in popped.into_iter().rev() {
                stack.push(operand);
            }
        };

        for (_, param) in method.params.iter() {
            let Some(declared) = param.param_type.upgrade() else {
                restore(stack, popped);
                return None;
            };

            let compatible = match stack.peek() {
                Some(top) => self.check_single(top, &declared),
                None => {
                    restore(stack, popped);
                    return None;
                }
            };

            if compatible {
                let operand = match stack.pop() {
                    Some(operand) => operand,
                    None => {
                        restore(stack, popped);
                        return None;
                    }
                };
                popped.push(operand.clone());
                args.push(operand);
                continue;
            }

            // Incompatible top: a non-primitive value type may have been
            // passed as its decomposed scalar fields.
            if declared.is_primitive() || !declared.is_value_type() {
                restore(stack, popped);
                return None;
            }

            match self.decompose_struct(&declared, stack, &mut popped, &mut actions) {
                Some(instance) => args.push(instance),
                None => {
                    restore(stack, popped);
                    return None;
                }
            }
        }

        Some(StackMatch { args, actions })
    }

    /// Pops one stack entry per non-static instance field of `declared`,
    /// checking each against the field's type in declaration order, and
    /// synthesizes the allocation plus one store per field. A value type
    /// without instance fields matches vacuously, consuming nothing.
    fn decompose_struct(
        &self,
        declared: &ManagedTypeRc,
        stack: &mut EvalStack,
        popped: &mut Vec<OperandRc>,
        actions: &mut Vec<SynthesizedAction>,
    ) -> Option<OperandRc> {
        let fields: Vec<ManagedFieldRc> = declared
            .fields
            .iter()
            .filter(|(_, field)| !field.is_static())
            .map(|(_, field)| field.clone())
            .collect();

        if stack.len() < fields.len() {
            return None;
        }

        let mut sources = Vec::with_capacity(fields.len());
        for field in &fields {
            let field_type = field.field_type.upgrade()?;
            let compatible = match stack.peek() {
                Some(top) => self.check_single(top, &field_type),
                None => false,
            };
            if !compatible {
                return None;
            }

            let operand = stack.pop()?;
            popped.push(operand.clone());
            sources.push(operand);
        }

        let instance: OperandRc = Arc::new(AnalysedOperand::Local(LocalOperand {
            name: format!("synthesized_{}", declared.name),
            ty: Some(declared.clone()),
        }));

        actions.push(SynthesizedAction::AllocateInstance {
            instance: instance.clone(),
            ty: declared.clone(),
        });
        for (field, source) in fields.into_iter().zip(sources) {
            actions.push(SynthesizedAction::FieldStore {
                instance: instance.clone(),
                field,
                source,
            });
        }

        Some(instance)
    }

    /// Checks one operand against one declared type.
    ///
    /// Constants must match by type exactly, except for the boolean
    /// reinterpretation rule: a widened-integer constant holding 0 or 1
    /// against a declared boolean is rewritten in place. Locals must carry a
    /// known type assignable to the declared one, except that two primitives
    /// always forgive each other (integer width differences are immaterial
    /// at the machine level).
    fn check_single(&self, operand: &OperandRc, declared: &ManagedTypeRc) -> bool {
        match operand.as_ref() {
            AnalysedOperand::Constant(constant) => {
                if constant.managed_type().fullname() == declared.fullname() {
                    return true;
                }

                if declared.flavor == TypeFlavor::Boolean {
                    if let Some(raw) = constant.value().as_widened_integer() {
                        if raw <= 1 {
                            let bool_type = self
                                .store
                                .registry()
                                .get_primitive(PrimitiveKind::Boolean);
                            constant.reinterpret(bool_type, ConstantValue::Boolean(raw == 1));
                            return true;
                        }
                    }
                }

                false
            }
            AnalysedOperand::Local(local) => match &local.ty {
                Some(ty) => {
                    declared.is_assignable_from(ty)
                        || (declared.is_primitive() && ty.is_primitive())
                }
                None => false,
            },
        }
    }
}
