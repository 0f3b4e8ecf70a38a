//! Call-site argument recovery.
//!
//! An external native analysis observes machine state at call sites; this
//! module matches that state against the parameter lists of reconstructed
//! managed methods to decide which candidate signature the call targets.
//! Two calling conventions are modelled: 64-bit register passing with paired
//! integer and float registers, and 32-bit stack passing with value-type
//! decomposition.
//!
//! # Usage
//!
//! ```rust,ignore
//! use aotscope::analysis::{ArgumentRecovery, CallingContext, RegisterFile};
//! use aotscope::metadata::identity::IdentityStore;
//!
//! let store = IdentityStore::new();
//! let recovery = ArgumentRecovery::new(&store);
//! let mut context = CallingContext::Registers(observed_registers);
//! if let Some(arguments) = recovery.check_parameters(&method, &mut context, false, true) {
//!     // one operand per declared parameter
//! }
//! ```

mod args;
mod operand;

pub use args::{ArgumentRecovery, RecoveredArguments, StackMatch, SynthesizedAction};
pub use operand::{
    AnalysedOperand, CallingContext, ConstantOperand, EvalStack, LocalOperand, OperandRc,
    Register, RegisterFile, ARGUMENT_REGISTER_PAIRS,
};
