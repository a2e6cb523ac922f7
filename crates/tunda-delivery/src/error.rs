use thiserror::Error;
use tunda_core::{ConfigError, CoreError};

/// Errors a fee computation surfaces to its caller.
///
/// Geocoder failures never appear here; they degrade the quote instead.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("invalid input for {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("delivery configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<CoreError> for DeliveryError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidInput { field, reason } => {
                DeliveryError::InvalidInput { field, reason }
            }
        }
    }
}

impl DeliveryError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        DeliveryError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Why a single geocoding or distance lookup produced nothing usable.
///
/// Internal to the fallback ladders; always absorbed into a degraded
/// result.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error(transparent)]
    Geocoder(#[from] tunda_geocoder::GeocoderError),

    #[error("{coords} lies outside {country}")]
    OutOfBounds {
        coords: tunda_core::Coordinates,
        country: &'static str,
    },

    #[error("request deadline expired")]
    DeadlineExpired,
}
