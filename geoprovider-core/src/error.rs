//! Error taxonomy shared by every provider operation.

use thiserror::Error;

use crate::FeatureId;
use crate::store::StoreError;

/// Type-erased error carried from a backend without exposing its type.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Broad classification of a [`ProviderError`].
///
/// Callers map these onto their own surface: HTTP status codes, exit codes,
/// or retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The backing store could not be read or written.
    Storage,
    /// The request itself was malformed.
    InvalidInput,
    /// The addressed feature does not exist.
    NotFound,
    /// The request conflicts with existing data.
    Conflict,
}

/// Errors returned by provider operations.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The backend could not be reached, opened or decoded.
    #[error("backend {locator} is unavailable: {source}")]
    BackendUnavailable {
        /// Path, URL or table naming the backend.
        locator: String,
        /// Underlying failure.
        #[source]
        source: BoxError,
    },
    /// Persisting a change failed; the previous state is intact.
    #[error("failed to write to backend {locator}: {source}")]
    BackendWrite {
        /// Path, URL or table naming the backend.
        locator: String,
        /// Underlying failure.
        #[source]
        source: BoxError,
    },
    /// A feature carried no usable identifier.
    #[error("feature has no identifier in `id` or property `{field}`")]
    MissingIdentifier {
        /// Configured identifier field.
        field: String,
    },
    /// A filter expression could not be parsed.
    #[error("invalid filter at offset {offset}: {message}")]
    InvalidFilterSyntax {
        /// Byte offset in the expression where parsing failed.
        offset: usize,
        /// Description of the failure.
        message: String,
    },
    /// A sort key named a property absent from the data.
    #[error("cannot sort by unknown property `{property}`")]
    InvalidSortProperty {
        /// Requested property.
        property: String,
    },
    /// A payload was not a valid GeoJSON feature.
    #[error("invalid feature payload: {0}")]
    InvalidFeature(#[source] serde_json::Error),
    /// Provider configuration was rejected.
    #[error("invalid provider configuration: {0}")]
    InvalidConfiguration(String),
    /// No feature matched the identifier.
    #[error("feature {id} not found")]
    NotFound {
        /// Requested identifier.
        id: FeatureId,
    },
    /// A feature with the identifier already exists.
    #[error("feature {id} already exists")]
    DuplicateIdentifier {
        /// Conflicting identifier.
        id: FeatureId,
    },
}

impl ProviderError {
    /// Classify the error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::BackendUnavailable { .. }
            | Self::BackendWrite { .. }
            | Self::InvalidConfiguration(_) => ErrorKind::Storage,
            Self::MissingIdentifier { .. }
            | Self::InvalidFilterSyntax { .. }
            | Self::InvalidSortProperty { .. }
            | Self::InvalidFeature(_) => ErrorKind::InvalidInput,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::DuplicateIdentifier { .. } => ErrorKind::Conflict,
        }
    }
}

impl From<StoreError> for ProviderError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Unavailable { locator, source } => {
                Self::BackendUnavailable { locator, source }
            }
            StoreError::Write { locator, source } => Self::BackendWrite { locator, source },
            invalid @ StoreError::InvalidTable { .. } => {
                Self::InvalidConfiguration(invalid.to_string())
            }
        }
    }
}
