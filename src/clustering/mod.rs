//! Keyword clustering: features, reduction, density clustering, naming
//! and refinement.
//!
//! [`ClusteringPipeline`] drives the stages; each stage is a plain function
//! or trait object so it can be exercised on its own.

pub mod assemble;
pub mod cross_encoder;
pub mod density;
pub mod features;
pub mod naming;
mod pipeline;
pub mod reassign;
pub mod reduction;
pub mod refine;
pub mod similarity;
mod types;

pub use cross_encoder::{CrossEncoderModel, LocalCrossEncoder};
pub use density::{DensityClusterer, DensityParams, HdbscanClusterer};
pub use pipeline::ClusteringPipeline;
pub use refine::{RefineSettings, RelevanceScorer, ScoreCalibration};
pub use types::*;
