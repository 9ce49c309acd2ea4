//! Markov-chain equilibration of a lattice.
//!
//! Two update rules share one flat capability: advance the chain by a single
//! step against a caller-supplied RNG, and flush per-step diagnostics. The
//! chain is strictly sequential: step N+1 observes the fully mutated
//! lattice produced by step N, and every random draw goes through the
//! explicitly threaded generator so a fixed seed reproduces a run
//! bit for bit.

pub mod cluster;
pub mod metropolis;

pub use cluster::ClusterUpdate;
pub use metropolis::Metropolis;

use rand_xoshiro::Xoshiro256StarStar;

use crate::error::Result;
use crate::lattice::Lattice;

/// Capability shared by the two equilibration algorithms.
///
/// Implementors never own or copy the lattice; they receive a mutable
/// borrow per call, managed by the driver. `advance_with` overrides the
/// proposal width for rules that have one (the cluster update ignores it).
pub trait Equilibrate {
    fn advance(&mut self, lattice: &mut Lattice, rng: &mut Xoshiro256StarStar);

    fn advance_with(&mut self, lattice: &mut Lattice, rng: &mut Xoshiro256StarStar, width: f64);

    /// Emit the per-step diagnostic scalars to the sinks handed over at
    /// construction.
    fn flush_diagnostics(&mut self, lattice: &Lattice) -> Result<()>;
}
