//! Tool layer: registry, the six tutor operations, and the JSON store.

pub mod registry;
pub mod store;
pub mod tutor_ops;

pub use registry::ToolRegistry;
pub use store::JsonStore;
pub use tutor_ops::TutorOps;
