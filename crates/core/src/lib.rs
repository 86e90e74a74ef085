//! # GeoLocus Core
//!
//! Core types, traits and I/O for the GeoLocus local spatial statistics library.
//!
//! This crate provides:
//! - `Dataset`: geometry collection with an aligned attribute table
//! - `AttributeTable`: ordered, named columns of scalar values
//! - Error types shared by every GeoLocus crate
//! - Algorithm trait for a consistent API
//! - GeoJSON I/O and legacy field-name mapping

pub mod error;
pub mod io;
pub mod vector;

pub use error::{Error, Result};
pub use vector::{AttributeTable, AttributeValue, Column, Dataset};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::vector::{AttributeTable, AttributeValue, Dataset};
    pub use crate::Algorithm;
}

/// Core trait for all analyses in GeoLocus.
///
/// Analyses are pure functions that transform input data according to parameters.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
