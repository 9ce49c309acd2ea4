//! Monte-Carlo simulation of the 1-D quantum rotor on a periodic lattice.
//!
//! A ring of angle variables is equilibrated with either a local Metropolis
//! sweep or a Wolff-type reflection-cluster update, configurations are
//! streamed to disk in a compact binary format, and a second pass measures
//! topological charge, action, plaquette and correlation observables.

pub mod config;
pub mod lattice;
pub mod mcmc;
pub mod simulation;

mod diagnostics;
mod error;
mod observables;
mod stats;
mod storage;

pub use config::{RunConfig, UpdateMode};
pub use diagnostics::{MemorySink, ObservableSink, SharedSink};
pub use error::{Result, RotorError};
pub use lattice::{AlgorithmTag, Boundary, Lattice, Site};
pub use mcmc::{ClusterUpdate, Equilibrate, Metropolis};
pub use observables::Complex;
pub use simulation::{
    build_update, generate_ensemble, measure_ensemble, run_generation, run_measurement,
    MeasureSinks, MeasureSummary,
};
pub use stats::Statistics;
pub use storage::{ConfigReader, ConfigWriter, ObsFile};
