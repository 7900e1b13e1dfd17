use subtle::ConstantTimeEq;

use crate::application::error::ApplicationError;

/// Compares a caller supplied secret with the configured one in constant time.
pub fn verify_secret(expected: &str, provided: Option<&str>) -> Result<(), ApplicationError> {
    let provided = provided.unwrap_or_default();
    if bool::from(expected.as_bytes().ct_eq(provided.as_bytes())) {
        Ok(())
    } else {
        Err(ApplicationError::InvalidSecret)
    }
}
