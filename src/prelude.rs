//! # aotscope Prelude
//!
//! This module provides a convenient prelude for the most commonly used types
//! from the aotscope library. Import this module to get quick access to the
//! essential types for reconstructing managed metadata from AOT binaries.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all aotscope operations
pub use crate::Error;

/// The result type used throughout aotscope
pub use crate::Result;

// ================================================================================================
// Native Descriptor Model
// ================================================================================================

/// The binary-format seam and the descriptor types it feeds
pub use crate::native::{
    AotBinary, NativeEventDescriptor, NativeFieldDescriptor, NativeGenericContainer,
    NativeGenericParam, NativeImage, NativeMethodDescriptor, NativeParamDescriptor,
    NativePropertyDescriptor, NativeTypeDescriptor, NativeTypeRef, PointerWidth,
};

// ================================================================================================
// Metadata System - Core Types
// ================================================================================================

/// Metadata token type carried over from native descriptors
pub use crate::metadata::token::Token;

/// Non-fatal findings collected across reconstruction
pub use crate::metadata::diagnostics::{
    Diagnostic, DiagnosticCategory, DiagnosticSeverity, Diagnostics,
};

// ================================================================================================
// Type System
// ================================================================================================

/// Core type system components
pub use crate::metadata::typesystem::{
    ConstantValue, ManagedModule, ManagedType, ManagedTypeList, ManagedTypeRc, ManagedTypeRef,
    ManagedTypeRefList, PrimitiveKind, TypeFlavor, TypeRegistry,
};

/// Member definitions
pub use crate::metadata::member::{
    FieldLayoutEntry, ManagedEvent, ManagedField, ManagedFieldRc, ManagedMethod, ManagedProperty,
    MethodOverride, MethodRc, Param, StubBody,
};

// ================================================================================================
// Reconstruction
// ================================================================================================

/// Cross-reference indexes over the reconstructed graph
pub use crate::metadata::identity::IdentityStore;

/// The reconstruction passes and provenance injection
pub use crate::metadata::reconstruct::{
    build_metadata_dump, InjectedShapes, MetadataReconstructor, ReconstructionOptions,
};

/// Explicit override resolution
pub use crate::metadata::overrides::OverrideResolver;

// ================================================================================================
// Argument Recovery
// ================================================================================================

/// Call-site argument recovery
pub use crate::analysis::{
    AnalysedOperand, ArgumentRecovery, CallingContext, EvalStack, RecoveredArguments, Register,
    RegisterFile,
};
