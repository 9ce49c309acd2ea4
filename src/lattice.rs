use std::f64::consts::TAU;

use rand::Rng;
use rand_xoshiro::Xoshiro256StarStar;

use crate::config::RunConfig;

/// Boundary condition of the ring. Only `Periodic` gives correct physics;
/// a freshly built lattice is `Open` until [`Lattice::set_periodic_boundaries`]
/// closes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    Open,
    Periodic,
}

impl Boundary {
    /// One-byte tag used in the configuration header.
    pub fn as_byte(self) -> u8 {
        match self {
            Boundary::Open => 0,
            Boundary::Periodic => b'p',
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Boundary::Open),
            b'p' => Some(Boundary::Periodic),
            _ => None,
        }
    }
}

/// Which update rule last touched the lattice. Purely diagnostic; recorded
/// in the configuration header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgorithmTag {
    None,
    Metropolis,
    Cluster,
}

impl AlgorithmTag {
    pub fn as_byte(self) -> u8 {
        match self {
            AlgorithmTag::None => 0,
            AlgorithmTag::Metropolis => b'm',
            AlgorithmTag::Cluster => b'c',
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(AlgorithmTag::None),
            b'm' => Some(AlgorithmTag::Metropolis),
            b'c' => Some(AlgorithmTag::Cluster),
            _ => None,
        }
    }
}

/// One angle variable on the ring with its fixed neighbor indices.
///
/// `phi` is an unconstrained real; it is reduced to (-π, π] only on demand
/// via [`Site::mod_2pi`]. Neighbor links are plain indices into the owning
/// lattice (arena + index, no pointers), static for the lattice's lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct Site {
    pub id: usize,
    pub id_before: usize,
    pub id_after: usize,
    pub phi: f64,
}

impl Site {
    /// Interior site with chain neighbors `id - 1` and `id + 1`. The two
    /// ring ends stay self-linked until the boundary is closed.
    fn new(id: usize, xdim: usize, phi: f64) -> Self {
        Site {
            id,
            id_before: id.saturating_sub(1),
            id_after: if id + 1 < xdim { id + 1 } else { id },
            phi,
        }
    }

    /// Reduce `phi` into (-π, π].
    pub fn mod_2pi(&mut self) {
        self.phi -= TAU * (self.phi / TAU).round();
    }

    /// Draw a fresh angle uniformly from [0, 2π).
    pub fn set_random(&mut self, rng: &mut Xoshiro256StarStar) {
        self.phi = rng.gen::<f64>() * TAU;
    }

    /// Reflect the angle about `angle` (the O(2) spin-flip identity used by
    /// the cluster update).
    pub fn reflected(&self, angle: f64) -> f64 {
        std::f64::consts::PI - self.phi + 2.0 * angle
    }
}

/// Periodic ring of angle variables plus the model constants coupling them.
///
/// The lattice exclusively owns its sites and the correlation buffer;
/// equilibration algorithms borrow it mutably per step and never outlive it.
/// `q` and `mean_phi_sq` cache the last computed topological charge and mean
/// squared angle for the diagnostics consumed by both update rules.
#[derive(Debug, Clone)]
pub struct Lattice {
    /// Moment of inertia I.
    pub inertia: f64,
    /// Lattice spacing a.
    pub spacing: f64,
    /// Ring size N, fixed for the lattice's lifetime.
    pub xdim: usize,
    /// Topological coupling θ (may be 0).
    pub theta: f64,
    pub boundary: Boundary,
    pub algorithm: AlgorithmTag,
    pub sites: Vec<Site>,
    /// Last computed topological charge.
    pub q: f64,
    /// Last computed mean squared angle.
    pub mean_phi_sq: f64,
    /// Correlation buffer of length `xdim`, filled by `compute_corr`.
    pub corr: Vec<f64>,
}

impl Default for Lattice {
    /// Historical default model point: I = 0.25, a = 0.2 on a 10-site ring.
    fn default() -> Self {
        Lattice::new(0.25, 0.2, 10, 0.0)
    }
}

impl Lattice {
    pub fn new(inertia: f64, spacing: f64, xdim: usize, theta: f64) -> Self {
        let sites = (0..xdim).map(|i| Site::new(i, xdim, 0.0)).collect();
        Lattice {
            inertia,
            spacing,
            xdim,
            theta,
            boundary: Boundary::Open,
            algorithm: AlgorithmTag::None,
            sites,
            q: 0.0,
            mean_phi_sq: 0.0,
            corr: vec![0.0; xdim],
        }
    }

    pub fn from_config(config: &RunConfig) -> Self {
        Lattice::new(config.inertia, config.spacing, config.xdim, config.theta)
    }

    /// Reduce an arbitrary (possibly negative) index onto the ring.
    #[inline]
    pub fn wrap(&self, i: isize) -> usize {
        i.rem_euclid(self.xdim as isize) as usize
    }

    /// Close the ring: link site 0 backwards to N-1 and site N-1 forwards
    /// to 0. Must be called exactly once before any equilibration step;
    /// the ring invariant does not hold otherwise.
    pub fn set_periodic_boundaries(&mut self) {
        self.sites[0].id_before = self.xdim - 1;
        self.sites[self.xdim - 1].id_after = 0;
        self.boundary = Boundary::Periodic;
    }

    pub fn set_zero(&mut self) {
        for site in &mut self.sites {
            site.phi = 0.0;
        }
    }

    /// Hot start: every angle uniform in [0, 2π).
    pub fn set_random(&mut self, rng: &mut Xoshiro256StarStar) {
        for site in &mut self.sites {
            site.set_random(rng);
        }
    }

    /// Action of the single link leaving site `i`:
    /// `(I/a) * (1 - cos(phi[next] - phi[i]))`.
    pub fn action_summand(&self, i: usize) -> f64 {
        let next = self.sites[i].id_after;
        self.inertia / self.spacing * (1.0 - (self.sites[next].phi - self.sites[i].phi).cos())
    }

    /// Action of the two links incident on site `i`.
    pub fn local_action(&self, i: usize) -> f64 {
        self.local_action_with(i, self.sites[i].phi)
    }

    /// Action of site `i`'s two incident links if its angle were
    /// `trial_phi`. Lets the Metropolis sweep evaluate a proposal without
    /// recomputing the whole lattice.
    pub fn local_action_with(&self, i: usize, trial_phi: f64) -> f64 {
        let after = self.sites[self.sites[i].id_after].phi;
        let before = self.sites[self.sites[i].id_before].phi;
        self.inertia / self.spacing
            * (1.0 - (after - trial_phi).cos() + 1.0 - (trial_phi - before).cos())
    }

    /// Total lattice action, one summand per link.
    pub fn action(&self) -> f64 {
        (0..self.xdim).map(|i| self.action_summand(i)).sum()
    }

    /// Reduce every angle into (-π, π]. A display/storage convenience: any
    /// observable that is already 2π-periodic is unaffected.
    pub fn mod_2pi(&mut self) {
        for site in &mut self.sites {
            site.mod_2pi();
        }
    }
}
