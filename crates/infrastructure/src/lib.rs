pub mod dynamodb;
pub mod memory;
pub mod models;
pub mod password;
pub mod repositories;

pub use dynamodb::*;
pub use memory::*;
pub use password::*;
pub use repositories::*;
