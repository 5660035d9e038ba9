//! User-script registration errors.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("User-script facility is unavailable on this host")]
    Unavailable,

    #[error("Registration failed for {id}: {message}")]
    RegistrationFailed { id: String, message: String },

    #[error("Unregistration failed: {0}")]
    UnregistrationFailed(String),
}
