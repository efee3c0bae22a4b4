//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A `Deserialize` create DTO for inserts
//! - Response DTOs where an operation returns more than the row

pub mod human_request;
pub mod message;
pub mod output_item;
pub mod recipe_step;
pub mod resource;
pub mod run;
pub mod tenant;
pub mod thread;
pub mod usage;
