//! pubmend library exports

pub mod assist;
pub mod catalog;
pub mod document;
pub mod error;
pub mod manifest;
pub mod search;
pub mod settings;

pub use error::{Error, Result};
