use rand::Rng;
use rand_xoshiro::Xoshiro256StarStar;

use crate::diagnostics::ObservableSink;
use crate::error::Result;
use crate::lattice::{AlgorithmTag, Lattice};
use crate::mcmc::Equilibrate;

/// Local single-site Metropolis sweep.
///
/// One step visits every site in index order, proposes a shifted angle and
/// accepts it with probability `min(1, exp(-dS))`. The sweep is sequential
/// and in place: an accepted update at site `i` is already visible when site
/// `i+1` evaluates its local action. The visitation order is therefore part
/// of the kernel (most lattice codes use odd/even sublattice updates
/// instead) and must not change.
pub struct Metropolis {
    /// Default proposal width, read once at construction.
    width: f64,
    /// Acceptance rate of the last sweep (accepted / N).
    acceptance: f64,
    acceptance_sink: Box<dyn ObservableSink>,
    phi_sq_sink: Box<dyn ObservableSink>,
}

impl Metropolis {
    pub fn new(
        width: f64,
        acceptance_sink: Box<dyn ObservableSink>,
        phi_sq_sink: Box<dyn ObservableSink>,
    ) -> Self {
        Metropolis {
            width,
            acceptance: 0.0,
            acceptance_sink,
            phi_sq_sink,
        }
    }

    pub fn acceptance(&self) -> f64 {
        self.acceptance
    }

    fn sweep(&mut self, lattice: &mut Lattice, rng: &mut Xoshiro256StarStar, width: f64) {
        let mut accepted = 0usize;

        for i in 0..lattice.xdim {
            let r = 2.0 * rng.gen::<f64>() - 1.0;
            let phi_old = lattice.sites[i].phi;
            let phi_new = phi_old + width * r;

            let delta_s =
                lattice.local_action_with(i, phi_new) - lattice.local_action_with(i, phi_old);

            let r2: f64 = rng.gen();
            if r2 <= (-delta_s).exp() {
                lattice.sites[i].phi = phi_new;
                accepted += 1;
            }
        }

        lattice.algorithm = AlgorithmTag::Metropolis;
        self.acceptance = accepted as f64 / lattice.xdim as f64;
    }
}

impl Equilibrate for Metropolis {
    fn advance(&mut self, lattice: &mut Lattice, rng: &mut Xoshiro256StarStar) {
        self.sweep(lattice, rng, self.width);
    }

    fn advance_with(&mut self, lattice: &mut Lattice, rng: &mut Xoshiro256StarStar, width: f64) {
        self.sweep(lattice, rng, width);
    }

    fn flush_diagnostics(&mut self, lattice: &Lattice) -> Result<()> {
        self.acceptance_sink.append_scalar(self.acceptance)?;
        self.phi_sq_sink.append_scalar(lattice.mean_phi_sq)?;
        Ok(())
    }
}
