//! Configuration loading for kwcluster.

mod settings;

pub use settings::*;
