//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument. Multi-table writes and
//! row-lock critical sections live here, never in handlers.

pub mod human_request_repo;
pub mod message_repo;
pub mod output_item_repo;
pub mod recipe_step_repo;
pub mod release_repo;
pub mod resource_repo;
pub mod run_repo;
pub mod tenant_repo;
pub mod thread_repo;
pub mod usage_repo;

pub use human_request_repo::HumanRequestRepo;
pub use message_repo::MessageRepo;
pub use output_item_repo::OutputItemRepo;
pub use recipe_step_repo::RecipeStepRepo;
pub use release_repo::ReleaseRepo;
pub use resource_repo::ResourceRepo;
pub use run_repo::RunRepo;
pub use tenant_repo::TenantRepo;
pub use thread_repo::ThreadRepo;
pub use usage_repo::UsageRepo;
