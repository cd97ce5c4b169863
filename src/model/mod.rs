mod engine;
pub mod registry;

pub use engine::{CoordConverter, EngineError, InterpolatedSet, InterpolationRequest, ModelEngine};
pub use registry::{Identifier, RegistryError};
