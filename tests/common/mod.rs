#![allow(dead_code)] // Each test binary uses a different slice of the fixtures

pub mod builders;
pub mod mocks;
pub mod strategies;

pub use builders::*;
pub use mocks::*;
