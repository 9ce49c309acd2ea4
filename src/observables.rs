//! Observable calculus on lattice state: topological charge, plaquette,
//! correlation, means, and the complex reweighting factors used by
//! downstream theta/alpha analyses.

use std::f64::consts::{PI, TAU};

use crate::lattice::Lattice;

/// Minimal re/im pair for the reweighting observables.
///
/// The corpus carries no complex-number crate; the handful of operations
/// the observables need are spelled out here instead.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Complex {
    pub re: f64,
    pub im: f64,
}

impl Complex {
    pub const ZERO: Complex = Complex { re: 0.0, im: 0.0 };

    /// Purely imaginary value `i * im`.
    pub fn imaginary(im: f64) -> Self {
        Complex { re: 0.0, im }
    }

    /// Unit phase `exp(i * arg)`.
    pub fn cis(arg: f64) -> Self {
        Complex {
            re: arg.cos(),
            im: arg.sin(),
        }
    }

    /// `exp(-self)`.
    pub fn exp_neg(self) -> Self {
        let scale = (-self.re).exp();
        Complex {
            re: scale * (-self.im).cos(),
            im: scale * (-self.im).sin(),
        }
    }

    pub fn add(self, other: Complex) -> Self {
        Complex {
            re: self.re + other.re,
            im: self.im + other.im,
        }
    }

    pub fn scale(self, factor: f64) -> Self {
        Complex {
            re: self.re * factor,
            im: self.im * factor,
        }
    }

    pub fn norm(self) -> f64 {
        self.re.hypot(self.im)
    }
}

/// Branch of `diff` nearest 0 mod 2π, with the ambiguous half-integer case
/// (within 1e-12 of an odd multiple of π) forced to +π. The naive rounding
/// is unstable exactly at the branch cut, so the tie-break must be explicit.
fn winding_contribution(diff: f64) -> f64 {
    if ((diff - PI) % TAU).abs() <= 1e-12 {
        PI
    } else {
        diff - TAU * (diff / TAU).round()
    }
}

impl Lattice {
    /// Topological charge: the winding number of the angle field around the
    /// ring. Caches the result in `self.q` and returns it.
    pub fn compute_q(&mut self) -> f64 {
        let sum: f64 = (0..self.xdim)
            .map(|i| {
                let next = self.sites[i].id_after;
                winding_contribution(self.sites[next].phi - self.sites[i].phi)
            })
            .sum();
        self.q = sum / TAU;
        self.q
    }

    /// `cos` of the angle difference across the link leaving site `i`.
    pub fn local_plaquette_at(&self, i: usize) -> f64 {
        let next = self.sites[i].id_after;
        (self.sites[next].phi - self.sites[i].phi).cos()
    }

    /// Mean plaquette over all links.
    pub fn compute_plaquette(&self) -> f64 {
        let sum: f64 = (0..self.xdim).map(|i| self.local_plaquette_at(i)).sum();
        sum / self.xdim as f64
    }

    /// `exp(i * diff)` across the link leaving site `i`.
    pub fn complex_local_plaquette_at(&self, i: usize) -> Complex {
        let next = self.sites[i].id_after;
        Complex::cis(self.sites[next].phi - self.sites[i].phi)
    }

    /// Mean complex plaquette, for reweighting analyses.
    pub fn compute_complex_plaquette(&self) -> Complex {
        (0..self.xdim)
            .map(|i| self.complex_local_plaquette_at(i))
            .fold(Complex::ZERO, Complex::add)
            .scale(1.0 / self.xdim as f64)
    }

    /// Autocorrelation of the angle field over every separation:
    /// `corr[j] = (1/N) * sum_i phi[i] * phi[(i+j) % N]`. O(N^2), on
    /// demand; the result lives in `self.corr`.
    pub fn compute_corr(&mut self) {
        for j in 0..self.xdim {
            let mut sum = 0.0;
            for i in 0..self.xdim {
                sum += self.sites[i].phi * self.sites[self.wrap((i + j) as isize)].phi;
            }
            self.corr[j] = sum / self.xdim as f64;
        }
    }

    pub fn compute_mean_phi(&self) -> f64 {
        let sum: f64 = self.sites.iter().map(|s| s.phi).sum();
        sum / self.xdim as f64
    }

    /// Mean squared angle, cached in `self.mean_phi_sq` for the diagnostics
    /// consumed by both update rules.
    pub fn compute_mean_phi_sq(&mut self) -> f64 {
        let sum: f64 = self.sites.iter().map(|s| s.phi * s.phi).sum();
        self.mean_phi_sq = sum / self.xdim as f64;
        self.mean_phi_sq
    }

    /// `i * theta * q * 2π`. Recomputes the charge first.
    pub fn theta_action(&mut self) -> Complex {
        let q = self.compute_q();
        Complex::imaginary(self.theta * q * TAU)
    }

    /// `exp(-theta_action)`, the reweighting factor attached to one
    /// configuration. Not part of the Markov-chain acceptance.
    pub fn theta_weight(&mut self) -> Complex {
        self.theta_action().exp_neg()
    }

    /// `i * theta * 2π * sum_i phi[i]`.
    pub fn alpha_action(&self) -> Complex {
        let sum: f64 = self.sites.iter().map(|s| s.phi).sum();
        Complex::imaginary(self.theta * TAU * sum)
    }

    pub fn alpha_weight(&self) -> Complex {
        self.alpha_action().exp_neg()
    }
}
