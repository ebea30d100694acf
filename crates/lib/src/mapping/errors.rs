//! Error types for record mapping.

use thiserror::Error;

/// Errors raised while describing, flattening or rebuilding records.
///
/// Registration errors are raised once, when a record type is registered;
/// conversion errors are raised per document.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum MappingError {
    /// The record type was never registered with the client.
    #[error("Record type not registered: {type_name}")]
    Unregistered {
        /// Rust type name of the record
        type_name: &'static str,
    },

    /// The descriptor does not declare the configured id field.
    #[error("Record {collection} has no id field '{id_field}'")]
    MissingIdField {
        /// Collection of the record
        collection: String,
        /// The id field the client expects
        id_field: String,
    },

    /// The descriptor's id field differs from the client's.
    #[error("Record {collection} uses id field '{found}' but the client expects '{expected}'")]
    IdFieldMismatch {
        /// Collection of the record
        collection: String,
        /// The id field the client expects
        expected: String,
        /// The id field the record declares
        found: String,
    },

    /// Two fields share a name once case is ignored.
    #[error("Record {collection} declares field '{field}' twice")]
    DuplicateField {
        /// Collection of the record
        collection: String,
        /// The repeated field name
        field: String,
    },

    /// The parent field is not declared as a reference.
    #[error("Record {collection} parent field '{field}' must be a reference")]
    InvalidParentField {
        /// Collection of the record
        collection: String,
        /// The offending field
        field: String,
    },

    /// The descriptor itself is unusable.
    #[error("Invalid record descriptor: {reason}")]
    InvalidDescriptor {
        /// Description of the problem
        reason: String,
    },

    /// A required field is absent from the document.
    #[error("Missing field '{field}' in {collection} document")]
    MissingField {
        /// Collection of the record
        collection: String,
        /// The absent field
        field: String,
    },

    /// A field holds a value of the wrong kind.
    #[error("Field '{field}' expected {expected}, found {found}")]
    TypeMismatch {
        /// The offending field
        field: String,
        /// The expected kind
        expected: &'static str,
        /// The kind found in the document
        found: &'static str,
    },
}

impl MappingError {
    /// Check if this error was raised while registering a record type.
    pub fn is_registration_error(&self) -> bool {
        matches!(
            self,
            MappingError::MissingIdField { .. }
                | MappingError::IdFieldMismatch { .. }
                | MappingError::DuplicateField { .. }
                | MappingError::InvalidParentField { .. }
                | MappingError::InvalidDescriptor { .. }
        )
    }

    /// Check if this error was raised while converting a document.
    pub fn is_conversion_error(&self) -> bool {
        matches!(
            self,
            MappingError::MissingField { .. } | MappingError::TypeMismatch { .. }
        )
    }

    pub fn is_unregistered(&self) -> bool {
        matches!(self, MappingError::Unregistered { .. })
    }
}

impl From<MappingError> for crate::Error {
    fn from(err: MappingError) -> Self {
        crate::Error::Mapping(err)
    }
}
