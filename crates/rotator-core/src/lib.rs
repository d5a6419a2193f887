pub mod catalog;
pub mod error;
#[cfg(feature = "fixtures")]
pub mod fixture;
pub mod gateway;
pub mod probe;
pub mod reconcile;
pub mod record;
pub mod schedule;
pub mod selection;
pub mod types;
pub mod url;
pub mod view;

pub use error::{Result, RotatorError};
pub use types::*;
