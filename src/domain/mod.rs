//! Domain types shared across the application and cache layers.

pub mod anzsco;
pub mod error;
pub mod selection;

pub use anzsco::AnzscoCode;
pub use error::DomainError;
pub use selection::Selection;
