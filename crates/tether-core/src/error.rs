//! Error types for Tether.
//!
//! Only recoverable failures are errors. Expected misses (an unknown slot
//! name, a signature mismatch, a tear-down refused during dispatch) are
//! reported as `None`, `0` or `false` by the operations themselves, and
//! contract violations panic.

/// A specialized Result type for Tether operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for Tether operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Object-related error.
    #[error("Object error: {0}")]
    Object(#[from] ObjectError),

    /// Argument-related error.
    #[error("Argument error: {0}")]
    Argument(#[from] ArgumentError),
}

/// Errors raised while attaching or detaching extensions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ObjectError {
    /// The extension already belongs to a live object.
    #[error("Extension '{name}' is already attached to an object")]
    AlreadyAttached {
        /// Name of the extension.
        name: String,
    },

    /// The object already has an extension with the same name.
    #[error("Object already has an extension named '{name}'")]
    DuplicateExtension {
        /// The clashing name.
        name: String,
    },

    /// The extension ID is invalid or the extension was already removed.
    #[error("Invalid or removed extension ID")]
    InvalidExtensionId,
}

impl ObjectError {
    /// Create an already-attached error.
    pub fn already_attached(name: impl Into<String>) -> Self {
        Self::AlreadyAttached { name: name.into() }
    }

    /// Create a duplicate-name error.
    pub fn duplicate_extension(name: impl Into<String>) -> Self {
        Self::DuplicateExtension { name: name.into() }
    }
}

/// Errors raised while reading packaged arguments.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArgumentError {
    /// No argument at the requested index.
    #[error("Argument index {index} out of range ({len} arguments)")]
    OutOfRange {
        /// The requested index.
        index: usize,
        /// Number of packaged arguments.
        len: usize,
    },

    /// The argument exists but has another type.
    #[error("Argument {index} type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        /// The requested index.
        index: usize,
        /// The requested type name.
        expected: &'static str,
        /// The packaged type name.
        got: &'static str,
    },
}
