//! Managed metadata representation reconstructed from native descriptors.
//!
//! This module contains the managed-side program representation: the type
//! system, member definitions, the identity store that indexes everything,
//! and the passes that build it all from the native metadata a stripped
//! AOT binary still carries.
//!
//! # Key Components
//!
//! - [`typesystem`] - Types, primitives, generics and the concurrent registry
//! - [`member`] - Fields, methods, properties and events
//! - [`identity`] - Cross-reference indexes over the reconstructed graph
//! - [`reconstruct`] - The population passes and provenance injection
//! - [`overrides`] - Name-based explicit override resolution
//! - [`token`] - Metadata tokens carried over from native descriptors
//! - [`diagnostics`] - Non-fatal findings collected across all passes
//!
//! # Examples
//!
//! ```rust,ignore
//! use aotscope::metadata::{identity::IdentityStore, reconstruct::MetadataReconstructor};
//!
//! let store = IdentityStore::new();
//! let reconstructor = MetadataReconstructor::new(&binary, &store);
//! let module = reconstructor.reconstruct(&image)?;
//! println!("Types: {}", store.registry().len());
//! ```

/// Implementation of injected provenance attribute representation
pub mod attributes;
/// Implementation of the non-fatal finding container
pub mod diagnostics;
/// Implementation of the cross-reference indexes over the reconstructed graph
pub mod identity;
/// Implementation of field, method, property and event definitions
pub mod member;
/// Implementation of explicit override resolution from qualified method names
pub mod overrides;
/// Implementation of the reconstruction passes
pub mod reconstruct;
/// Implementation of metadata tokens
pub mod token;
/// Implementation of the managed type system
pub mod typesystem;
