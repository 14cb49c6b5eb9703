//! Concrete storage backends for the lifecycle traits.

mod rest;

pub use rest::RestDirectory;
