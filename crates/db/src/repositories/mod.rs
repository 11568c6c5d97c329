//! Repository layer.

pub mod dependent_repo;
pub mod instance_repo;

pub use dependent_repo::DependentRepo;
pub use instance_repo::InstanceRepo;
