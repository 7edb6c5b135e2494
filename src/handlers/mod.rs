pub mod config;
pub mod sessions;
pub mod tools;

pub use config::*;
pub use sessions::*;
pub use tools::*;
