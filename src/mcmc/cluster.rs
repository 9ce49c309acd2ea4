use std::f64::consts::TAU;

use rand::Rng;
use rand_xoshiro::Xoshiro256StarStar;

use crate::diagnostics::ObservableSink;
use crate::error::Result;
use crate::lattice::{AlgorithmTag, Lattice};
use crate::mcmc::Equilibrate;

/// Non-local Wolff-type reflection-cluster update.
///
/// One step draws a reflection angle and a random start site, grows a
/// contiguous cluster right and then left by stochastic bond activation,
/// and reflects every member about the drawn angle. The borders are kept
/// un-wrapped (possibly negative or >= N) so the flip loop can iterate one
/// contiguous range even when the cluster straddles index 0.
pub struct ClusterUpdate {
    /// Start site of the last step.
    start: usize,
    /// Reflection angle of the last step.
    angle: f64,
    /// Inclusive borders of the last cluster, un-wrapped.
    left_border: isize,
    right_border: isize,
    /// Member count of the last cluster.
    size: isize,
    /// Mean bond probability over the internal bonds of the last cluster.
    bond_prob: f64,
    size_sink: Box<dyn ObservableSink>,
    prob_sink: Box<dyn ObservableSink>,
    phi_sq_sink: Box<dyn ObservableSink>,
}

impl ClusterUpdate {
    pub fn new(
        size_sink: Box<dyn ObservableSink>,
        prob_sink: Box<dyn ObservableSink>,
        phi_sq_sink: Box<dyn ObservableSink>,
    ) -> Self {
        ClusterUpdate {
            start: 0,
            angle: 0.0,
            left_border: 0,
            right_border: 0,
            size: 0,
            bond_prob: 0.0,
            size_sink,
            prob_sink,
            phi_sq_sink,
        }
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn left_border(&self) -> isize {
        self.left_border
    }

    pub fn right_border(&self) -> isize {
        self.right_border
    }

    pub fn size(&self) -> isize {
        self.size
    }

    pub fn mean_bond_probability(&self) -> f64 {
        self.bond_prob
    }

    /// Probability of the bond between site `i` and its right neighbor
    /// joining the cluster:
    /// `1 - exp(-2 (I/a) cos(angle - phi[i]) cos(angle - phi[next(i)]))`.
    ///
    /// The exponent changes sign with the cosine product; the negative
    /// branch is clamped to zero so the returned value is a probability.
    pub fn bond_probability(&self, lattice: &Lattice, i: usize) -> f64 {
        let next = lattice.sites[i].id_after;
        let raw = 1.0
            - (-2.0 * (lattice.inertia / lattice.spacing)
                * (self.angle - lattice.sites[i].phi).cos()
                * (self.angle - lattice.sites[next].phi).cos())
            .exp();
        raw.max(0.0)
    }

    /// Grow the cluster around `self.start`: first rightwards until a bond
    /// is rejected or growth returns to the start, then leftwards until
    /// rejection or the already-found right border. Sets the un-wrapped
    /// borders, the size and the mean internal bond probability.
    fn grow(&mut self, lattice: &Lattice, rng: &mut Xoshiro256StarStar) {
        let n = lattice.xdim as isize;

        // Accepted-bond probabilities, accumulated across both directions.
        let mut prob_sum = 0.0;
        let mut prob = 0.0;

        // Rightwards. `overflow` records whether growth wrapped past N-1,
        // which puts the right border outside [0, N).
        let mut i = self.start;
        let mut overflow = 0isize;
        loop {
            prob_sum += prob;
            i = lattice.sites[i].id_after;
            if i == 0 {
                overflow = 1;
            }
            let r: f64 = rng.gen();
            prob = self.bond_probability(lattice, lattice.sites[i].id_before);
            if !(r <= prob && i != self.start) {
                break;
            }
        }
        // A stop exactly on site 0 means the border itself is N-1; no wrap.
        if i == 0 {
            overflow = 0;
        }
        self.right_border = lattice.sites[i].id_before as isize + overflow * n;

        // Leftwards, stopping at the right border's wrapped position.
        let right_wrapped = lattice.wrap(self.right_border);
        let mut i = self.start;
        let mut overflow = 0isize;
        prob = 0.0;
        loop {
            prob_sum += prob;
            i = lattice.sites[i].id_before;
            if i == lattice.xdim - 1 {
                overflow = 1;
            }
            let r: f64 = rng.gen();
            prob = self.bond_probability(lattice, i);
            if !(r <= prob && i != right_wrapped) {
                break;
            }
        }
        if i == lattice.xdim - 1 {
            overflow = 0;
        }
        self.left_border = lattice.sites[i].id_after as isize - overflow * n;

        self.size = self.right_border + 1 - self.left_border;
        self.bond_prob = if self.size > 1 {
            prob_sum / (self.size - 1) as f64
        } else {
            0.0
        };
    }

    fn step(&mut self, lattice: &mut Lattice, rng: &mut Xoshiro256StarStar) {
        // Reflection axis, then start site. The draw order is part of the
        // reproducibility contract.
        self.angle = rng.gen::<f64>() * TAU;
        self.start = rng.gen_range(0..lattice.xdim);

        self.grow(lattice, rng);

        for i in self.left_border..=self.right_border {
            let idx = lattice.wrap(i);
            lattice.sites[idx].phi = lattice.sites[idx].reflected(self.angle);
        }

        lattice.algorithm = AlgorithmTag::Cluster;
    }
}

impl Equilibrate for ClusterUpdate {
    fn advance(&mut self, lattice: &mut Lattice, rng: &mut Xoshiro256StarStar) {
        self.step(lattice, rng);
    }

    /// The cluster rule has no proposal width; the overload degenerates to
    /// a plain step.
    fn advance_with(&mut self, lattice: &mut Lattice, rng: &mut Xoshiro256StarStar, _width: f64) {
        self.step(lattice, rng);
    }

    fn flush_diagnostics(&mut self, lattice: &Lattice) -> Result<()> {
        self.size_sink.append_int(self.size as i64)?;
        self.prob_sink.append_scalar(self.bond_prob)?;
        self.phi_sq_sink.append_scalar(lattice.mean_phi_sq)?;
        Ok(())
    }
}
