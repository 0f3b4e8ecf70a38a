use thiserror::Error;

use crate::metadata::token::Token;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// This enum covers all failure modes of metadata reconstruction from AOT-compiled binaries.
/// Match failures in call-site argument recovery are deliberately *not* errors - they are
/// ordinary negative results (`Option::None`), since callers are expected to try the next
/// candidate signature. Override-resolution failures are likewise not errors; they are
/// reported through [`crate::metadata::diagnostics::Diagnostics`] and skip only the
/// affected override edge.
///
/// # Error Categories
///
/// ## Input Errors
/// - [`Error::Malformed`] - Native descriptor data that violates its own invariants
/// - [`Error::NotSupported`] - Unsupported descriptor shape or feature
///
/// ## Type System Errors
/// - [`Error::TypeNotFound`] - A native type reference that cannot be resolved
/// - [`Error::TypeError`] - General type system operation error
///
/// ## Reconstruction Errors
/// - [`Error::TypePopulation`] - Fatal per-type population failure, wrapped with the
///   identifying context required by the run-abort contract
#[derive(Error, Debug)]
pub enum Error {
    /// The native descriptor data is damaged or self-inconsistent.
    ///
    /// The error includes the source location where the malformation was
    /// detected for debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// This descriptor shape is not supported.
    #[error("This input is not supported")]
    NotSupported,

    /// Generic error for miscellaneous failures.
    ///
    /// Used for errors that don't fit into other categories or for
    /// wrapping external collaborator errors with additional context.
    #[error("{0}")]
    Error(String),

    /// Failed to find a type in the `TypeRegistry` / `IdentityStore`.
    ///
    /// This error occurs when a native type reference points at a type index
    /// or token for which no managed shell was registered before reconstruction
    /// began.
    ///
    /// The associated [`Token`] identifies which type was not found.
    #[error("Failed to find type - {0}")]
    TypeNotFound(Token),

    /// General error during type system usage.
    ///
    /// Covers type resolution, inheritance chain analysis, or synthetic type
    /// construction failures.
    #[error("{0}")]
    TypeError(String),

    /// Fatal failure while populating a single type.
    ///
    /// Any error raised during per-type member population is wrapped with the
    /// identifying context of the type being processed and re-raised. The caller
    /// must abort reconstruction of the current binary - a partially-populated
    /// type graph cannot be safely used downstream.
    #[error("Failed to process type {type_name} (module {module}, declaring type {declaring_type:?}) in {image}: {source}")]
    TypePopulation {
        /// Full name of the type whose population failed
        type_name: String,
        /// Name of the module the type belongs to
        module: String,
        /// Full name of the declaring type, for nested types
        declaring_type: Option<String>,
        /// Name of the binary image being reconstructed
        image: String,
        /// The underlying failure
        #[source]
        source: Box<Error>,
    },
}
