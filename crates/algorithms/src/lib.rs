//! # GeoLocus Algorithms
//!
//! Local spatial statistics for GeoLocus.
//!
//! ## Available Algorithm Categories
//!
//! - **weights**: Queen/rook contiguity (any order), distance rows
//! - **kernel**: Distance-decay kernels and bandwidths
//! - **gwr**: Geographically weighted regression, bandwidth search, robust fit
//! - **lisa**: Local Moran's I with permutation inference
//! - **assemble**: Output tables and run summaries

pub mod assemble;
pub mod gwr;
pub mod kernel;
pub mod linalg;
pub mod lisa;
pub mod weights;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::assemble::{gwr_table, lisa_table, DescriptiveStats, GwrSummary, LisaSummary};
    pub use crate::gwr::{
        gwr, BandwidthSpec, Criterion, Gwr, GwrOutput, GwrParams, LocalStatus, RobustParams,
        SearchParams,
    };
    pub use crate::kernel::{Bandwidth, Kernel};
    pub use crate::lisa::{
        lisa, Lisa, LisaCluster, LisaOutput, LisaParams, LisaVariables, PermutationParams,
    };
    pub use crate::weights::{
        contiguity_weights, Contiguity, ContiguityParams, DistanceWeights, SpatialWeights,
    };
    pub use geolocus_core::prelude::*;
    pub use geolocus_parallel::{Execution, ProcessingMode};
}
