pub mod collection;
pub mod core;
pub mod corpus;
pub mod dictionary;
pub mod persistence;
pub mod ranking;
pub mod segmentation;
pub mod target;

pub use crate::core::{
    ReorderError,
    ReorderSettings,
};
