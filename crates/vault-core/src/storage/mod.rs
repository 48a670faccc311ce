//! Storage backends for accounts and encrypted credentials
//!
//! The relational store of the desktop app lives outside this crate; the
//! JSON file backend here serves the CLI and tests.

mod traits;
mod json_file;

pub use traits::CredentialStore;
pub use json_file::JsonFileStore;
