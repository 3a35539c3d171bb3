//! Market data aggregate: bars, validation, loaders and indicator computation.

pub mod entities;
pub mod indicator_engine;
pub mod indicators;
pub mod metrics;
pub mod repositories;
pub mod services;
pub mod value_objects;

pub use entities::*;
pub use indicator_engine::*;
pub use repositories::*;
pub use services::*;
pub use value_objects::*;
