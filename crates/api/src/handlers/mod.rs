pub mod human;
pub mod resources;
pub mod threads;
pub mod usage;
