//! Credential records and their encryption on the way in and out of storage

mod manager;
mod types;

pub use manager::CredentialManager;
pub use types::*;
