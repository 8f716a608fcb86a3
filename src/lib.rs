//! # nemora
//!
//! A stochastic neural-assembly engine: named areas of binary neurons,
//! sparse lazily-materialized random connectomes, winner-take-`k` firing,
//! and Hebbian-style multiplicative plasticity, advanced one projection
//! round at a time.
//!
//! ## Quick Start
//!
//! ```
//! use nemora::prelude::*;
//!
//! let cfg = BrainConfig::new(0.05).with_seed(42);
//! let mut brain = Brain::new(cfg)?;
//!
//! brain.add_stimulus("stim", 100)?;
//! brain.add_area("A", 10_000, 100, 0.05)?;
//!
//! // Fire the stimulus into A, then keep A's recurrent loop active too.
//! brain.project(&Projection::new().stimulus("stim", &["A"]))?;
//! let proj = Projection::new().stimulus("stim", &["A"]).area("A", &["A"]);
//! brain.project_rounds(&proj, 9)?;
//!
//! let a = brain.area("A")?;
//! assert!(a.winners().len() <= 100);
//! assert!(a.w() >= 100);
//! # Ok::<(), nemora::BrainError>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `serde` (default): serde derives on the small inspection types and the
//!   [`storage`] result-table module
//!
//! ## Modules
//!
//! - [`brain`]: areas, stimuli, and the projection round
//! - [`connectome`]: sparse weighted edge sets
//! - [`sampling`]: random-graph sampling primitives
//! - [`analysis`]: winner-set overlap statistics
//! - [`storage`]: aggregate result-table save/restore

#[path = "core/sampling.rs"]
pub mod sampling;

#[path = "core/connectome.rs"]
pub mod connectome;

#[path = "core/brain.rs"]
pub mod brain;

#[path = "core/analysis.rs"]
pub mod analysis;

#[cfg(feature = "serde")]
#[path = "core/storage.rs"]
pub mod storage;

pub use brain::BrainError;

/// Prelude module for convenient imports.
///
/// ```
/// use nemora::prelude::*;
/// ```
pub mod prelude {
    pub use crate::brain::{
        Area, Brain, BrainConfig, BrainError, Diagnostics, Projection, Stimulus,
    };
    pub use crate::connectome::{Connectome, NeuronId, Synapse};
}
