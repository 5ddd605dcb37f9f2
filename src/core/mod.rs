pub mod config;
pub mod errors;
pub mod utils;

pub use config::ReorderSettings;
pub use errors::ReorderError;
