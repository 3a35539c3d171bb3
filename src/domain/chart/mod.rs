//! Chart aggregate: viewport virtualization, axes and label layout.

pub mod animation;
pub mod entities;
pub mod label_collision;
pub mod price_axis;
pub mod time_axis;
pub mod value_objects;
pub mod viewport_manager;

pub use animation::*;
pub use entities::*;
pub use label_collision::*;
pub use price_axis::*;
pub use time_axis::*;
pub use value_objects::*;
pub use viewport_manager::*;
