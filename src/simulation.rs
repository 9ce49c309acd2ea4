//! Run drivers: ensemble generation and ensemble measurement.
//!
//! Both drivers are strictly sequential single-chain loops; every random
//! draw goes through one explicitly threaded generator, so a fixed seed
//! reproduces the written byte stream exactly.

use std::io::{Read, Write};
use std::path::PathBuf;

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;

use crate::config::{RunConfig, UpdateMode};
use crate::diagnostics::ObservableSink;
use crate::error::Result;
use crate::lattice::Lattice;
use crate::mcmc::{ClusterUpdate, Equilibrate, Metropolis};
use crate::stats::Statistics;
use crate::storage::{
    self, read_header, read_record, write_header, write_record, ConfigReader, ConfigWriter,
    ObsFile,
};

/// Proposal width used during thermalization, independent of the run's
/// `delta_metro`. The cluster rule ignores it.
const THERMAL_WIDTH: f64 = 0.5;

/// Wire up the configured update rule with file-backed diagnostic sinks.
pub fn build_update(config: &RunConfig) -> Result<Box<dyn Equilibrate>> {
    match config.update_mode {
        UpdateMode::Metropolis => {
            let acceptance = ObsFile::create("MetropolisAcc", config)?;
            let phi_sq = ObsFile::create("MeanPhiSq", config)?;
            Ok(Box::new(Metropolis::new(
                config.delta_metro,
                Box::new(acceptance),
                Box::new(phi_sq),
            )))
        }
        UpdateMode::Cluster => {
            let size = ObsFile::create("ClusterSize", config)?;
            let prob = ObsFile::create("ClusterProb", config)?;
            let phi_sq = ObsFile::create("MeanPhiSq", config)?;
            Ok(Box::new(ClusterUpdate::new(
                Box::new(size),
                Box::new(prob),
                Box::new(phi_sq),
            )))
        }
    }
}

/// Generate an ensemble: hot start, thermalize, then alternate one update
/// step with one stored configuration record. `on_step` fires once per
/// stored record (progress reporting).
pub fn generate_ensemble<W, F>(
    config: &RunConfig,
    update: &mut dyn Equilibrate,
    out: &mut W,
    mut on_step: F,
) -> Result<()>
where
    W: Write,
    F: FnMut(usize),
{
    let mut lattice = Lattice::from_config(config);
    lattice.set_periodic_boundaries();

    let mut rng = Xoshiro256StarStar::seed_from_u64(config.seed);
    lattice.set_random(&mut rng);

    for _ in 0..config.n_thermal {
        update.advance_with(&mut lattice, &mut rng, THERMAL_WIDTH);
    }

    // Written after thermalization so the algorithm tag is set.
    write_header(&lattice, out)?;

    for step in 0..config.n_steps {
        update.advance(&mut lattice, &mut rng);
        lattice.mod_2pi();
        lattice.compute_mean_phi_sq();
        write_record(&lattice, out)?;
        update.flush_diagnostics(&lattice)?;
        on_step(step);
    }
    Ok(())
}

/// One sink per measured observable. Correlation rows go to `corr` as
/// `step, separation, value` triples; everything else is a scalar series.
pub struct MeasureSinks {
    pub charge: Box<dyn ObservableSink>,
    pub action: Box<dyn ObservableSink>,
    pub plaquette: Box<dyn ObservableSink>,
    pub corr: Box<dyn ObservableSink>,
}

impl MeasureSinks {
    /// File-backed sinks under the run's output directory.
    pub fn create_files(config: &RunConfig) -> Result<Self> {
        Ok(MeasureSinks {
            charge: Box::new(ObsFile::create("Q", config)?),
            action: Box::new(ObsFile::create("S", config)?),
            plaquette: Box::new(ObsFile::create("Plaq", config)?),
            corr: Box::new(ObsFile::create("Corr", config)?),
        })
    }
}

#[derive(Debug)]
pub struct MeasureSummary {
    /// Records consumed before clean end-of-stream or the step limit.
    pub records: usize,
    pub plaquette: Statistics,
}

/// Measure a stored ensemble: per record, topological charge, action, mean
/// plaquette and the full correlation function. Stops at clean end-of-stream
/// or after `max_records`; a stream truncated mid-record is fatal.
pub fn measure_ensemble<R, F>(
    config: &RunConfig,
    input: &mut R,
    sinks: &mut MeasureSinks,
    max_records: Option<usize>,
    mut on_record: F,
) -> Result<MeasureSummary>
where
    R: Read,
    F: FnMut(usize),
{
    let mut lattice = Lattice::from_config(config);
    read_header(&mut lattice, input)?;

    let mut plaquette = Statistics::new();
    let mut step = 0;
    while max_records.map_or(true, |max| step < max) {
        if !read_record(&mut lattice, input)? {
            break;
        }

        sinks.charge.append_scalar(lattice.compute_q())?;
        sinks.action.append_scalar(lattice.action())?;

        let plaq = lattice.compute_plaquette();
        sinks.plaquette.append_scalar(plaq)?;
        plaquette.update(plaq);

        lattice.compute_corr();
        for separation in 0..lattice.xdim {
            sinks.corr.append_row(step, separation, lattice.corr[separation])?;
        }

        on_record(step);
        step += 1;
    }

    Ok(MeasureSummary {
        records: step,
        plaquette,
    })
}

/// Full generation run against the filesystem: pin a file index, open the
/// configuration stream and diagnostic files, generate, flush. Returns the
/// path of the written configuration file.
pub fn run_generation<F>(config: &mut RunConfig, on_step: F) -> Result<PathBuf>
where
    F: FnMut(usize),
{
    if config.file_id.is_none() {
        config.file_id = Some(storage::next_free_config_id(config)?);
    }
    let mut update = build_update(config)?;
    let mut writer = ConfigWriter::create(config)?;
    generate_ensemble(config, update.as_mut(), &mut writer, on_step)?;
    writer.flush()?;
    Ok(writer.path().to_path_buf())
}

/// Full measurement run against the filesystem, reading at most `n_steps`
/// records. An unset file index means the first file of the run.
pub fn run_measurement<F>(config: &mut RunConfig, on_record: F) -> Result<MeasureSummary>
where
    F: FnMut(usize),
{
    if config.file_id.is_none() {
        config.file_id = Some(0);
    }
    let mut reader = ConfigReader::open(config)?;
    let mut sinks = MeasureSinks::create_files(config)?;
    measure_ensemble(config, &mut reader, &mut sinks, Some(config.n_steps), on_record)
}
