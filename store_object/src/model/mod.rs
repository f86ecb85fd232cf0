//! Entity model registration

pub mod registry;

pub use registry::{EntityModel, ModelRegistry};
