// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # aotscope
//!
//! Reconstruction of a managed .NET program representation from AOT-compiled
//! native binaries. Built in pure Rust, `aotscope` rebuilds types, generics,
//! fields, methods, properties, events and explicit override relationships
//! from the native metadata an ahead-of-time compiler leaves behind, without
//! requiring Windows or the .NET runtime.
//!
//! ## Features
//!
//! - **📊 Rich type system** - Full reconstruction of classes, value types,
//!   interfaces, arrays, byrefs and generic instantiations
//! - **🔗 Override resolution** - Explicit interface implementations and
//!   compiler-generated state machines wired back to their base methods
//! - **🏷️ Provenance markers** - Injected attributes record the native
//!   address, layout offset and token every reconstructed member came from
//! - **🔍 Argument recovery** - Call-site matching against both 64-bit
//!   register and 32-bit stack calling conventions
//! - **⚡ Parallel population** - Per-type reconstruction runs across all
//!   cores
//! - **🛡️ Memory safe** - Built in Rust with comprehensive error handling
//!
//! ## Quick Start
//!
//! Add `aotscope` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! aotscope = "0.1"
//! ```
//!
//! ### Using the Prelude
//!
//! For convenient access to the most commonly used types, import the prelude:
//!
//! ```rust,ignore
//! use aotscope::prelude::*;
//!
//! let store = IdentityStore::new();
//! let module = MetadataReconstructor::new(&binary, &store).reconstruct(&image)?;
//! OverrideResolver::new(&store).resolve_module(&module);
//! println!("Reconstructed {} types", store.registry().len());
//! ```
//!
//! ## Architecture
//!
//! `aotscope` is organized into several key modules:
//!
//! - [`prelude`] - Convenient re-exports of commonly used types
//! - [`metadata`] - The managed type system, identity store and
//!   reconstruction passes
//! - [`native`] - Descriptor model for the metadata an AOT binary carries
//! - [`analysis`] - Call-site argument recovery
//! - [`Error`] and [`Result`] - Comprehensive error handling
//!
//! The [`native::AotBinary`] trait is the seam to the binary format: callers
//! provide pointer width, field layout offsets and address mapping, and the
//! [`metadata::reconstruct::MetadataReconstructor`] builds the managed graph
//! from [`native::NativeImage`] descriptors on top of it.
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`](Result) with detailed error
//! information:
//!
//! ```rust,ignore
//! use aotscope::Error;
//!
//! match reconstructor.reconstruct(&image) {
//!     Ok(module) => println!("Reconstructed module {}", module.name),
//!     Err(Error::TypePopulation { type_name, .. }) => {
//!         println!("Failed while populating {}", type_name)
//!     }
//!     Err(e) => println!("Error: {}", e),
//! }
//! ```
//!
//! Non-fatal findings (an unresolvable override target, an unmappable method
//! address) never abort reconstruction; they are collected as
//! [`metadata::diagnostics::Diagnostic`] entries on the identity store.

#[macro_use]
pub(crate) mod error;

/// Convenient re-exports of the most commonly used types.
///
/// # Example
///
/// ```rust,ignore
/// use aotscope::prelude::*;
///
/// let store = IdentityStore::new();
/// let module = MetadataReconstructor::new(&binary, &store).reconstruct(&image)?;
/// ```
pub mod prelude;

/// Call-site argument recovery against the reconstructed method graph.
///
/// Matches observed machine state (register snapshots on 64-bit targets, the
/// evaluation stack on 32-bit targets) against declared parameter lists. See
/// [`analysis::ArgumentRecovery`].
pub mod analysis;

/// The managed metadata representation and the passes that reconstruct it.
///
/// Contains the type system ([`metadata::typesystem`]), member definitions
/// ([`metadata::member`]), the identity store ([`metadata::identity`]), the
/// reconstruction passes ([`metadata::reconstruct`]) and explicit override
/// resolution ([`metadata::overrides`]).
pub mod metadata;

/// The native-side descriptor model an AOT binary is read into.
///
/// [`native::AotBinary`] abstracts the concrete binary format;
/// [`native::NativeImage`] and the descriptor types carry the raw metadata
/// the reconstruction passes consume.
pub mod native;

/// `aotscope` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is
/// always [`Error`]. Used consistently throughout the crate for all fallible
/// operations.
pub type Result<T> = std::result::Result<T, Error>;

/// `aotscope` Error type
///
/// The main error type for all operations in this crate. Provides detailed
/// error information for descriptor validation and reconstruction failures.
pub use error::Error;
