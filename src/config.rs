//! Run configuration: defaults, `--key=value` overrides, parameter files
//! and validation.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use validator::{Validate, ValidationError};

use crate::error::{Result, RotorError};

/// Which equilibration rule drives the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    Metropolis,
    Cluster,
}

impl TryFrom<&str> for UpdateMode {
    type Error = String;
    fn try_from(s: &str) -> std::result::Result<Self, Self::Error> {
        match s {
            "metropolis" => Ok(Self::Metropolis),
            "cluster" => Ok(Self::Cluster),
            _ => Err(format!(
                "unknown algorithm '{s}', expected 'metropolis' or 'cluster'"
            )),
        }
    }
}

fn validate_run_config(cfg: &RunConfig) -> std::result::Result<(), ValidationError> {
    if cfg.xdim < 2 {
        return Err(ValidationError::new("xdim must be >= 2"));
    }
    if !(cfg.inertia > 0.0) {
        return Err(ValidationError::new("inertia must be > 0"));
    }
    if !(cfg.spacing > 0.0) {
        return Err(ValidationError::new("spacing must be > 0"));
    }
    if cfg.n_steps < 1 {
        return Err(ValidationError::new("n_steps must be >= 1"));
    }
    if cfg.update_mode == UpdateMode::Metropolis && !(cfg.delta_metro > 0.0) {
        return Err(ValidationError::new(
            "delta_metro must be > 0 for the metropolis algorithm",
        ));
    }
    Ok(())
}

/// Everything a run needs, with the historical defaults of the tool.
///
/// `file_id` of `None` means "pick the next free index" when a file is
/// first resolved.
#[derive(Debug, Clone, Validate)]
#[validate(schema(function = "validate_run_config"))]
pub struct RunConfig {
    pub run_name: String,
    pub inertia: f64,
    pub theta: f64,
    pub spacing: f64,
    pub xdim: usize,
    pub n_steps: usize,
    pub n_thermal: usize,
    pub update_mode: UpdateMode,
    /// Metropolis proposal half-width.
    pub delta_metro: f64,
    pub config_directory: String,
    pub output_directory: String,
    pub file_id: Option<usize>,
    pub seed: u64,
    /// Progress reporting interval in steps; 0 silences the bar.
    pub verbosity: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            run_name: "test".into(),
            inertia: 1.0,
            theta: 0.0,
            spacing: 1.0,
            xdim: 4,
            n_steps: 10_000,
            n_thermal: 1_000,
            update_mode: UpdateMode::Cluster,
            delta_metro: 0.5,
            config_directory: "./out/".into(),
            output_directory: "./out/".into(),
            file_id: None,
            seed: 0,
            verbosity: 10,
        }
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| RotorError::InvalidParameter(format!("cannot parse {key} = '{value}'")))
}

impl RunConfig {
    /// Apply one `key = value` assignment.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "run_name" => self.run_name = value.to_string(),
            "inertia" => self.inertia = parse_value(key, value)?,
            "theta" => self.theta = parse_value(key, value)?,
            "spacing" => self.spacing = parse_value(key, value)?,
            "xdim" => self.xdim = parse_value(key, value)?,
            "n_steps" => self.n_steps = parse_value(key, value)?,
            "n_thermal" => self.n_thermal = parse_value(key, value)?,
            "algorithm" => {
                self.update_mode = UpdateMode::try_from(value)
                    .map_err(|_| RotorError::UnknownAlgorithm(value.to_string()))?;
            }
            "delta_metro" => self.delta_metro = parse_value(key, value)?,
            "config_dir" => self.config_directory = value.to_string(),
            "output_dir" => self.output_directory = value.to_string(),
            "file_id" => self.file_id = Some(parse_value(key, value)?),
            "seed" => self.seed = parse_value(key, value)?,
            "verbosity" => self.verbosity = parse_value(key, value)?,
            "params" => self.load_file(Path::new(value))?,
            _ => {
                return Err(RotorError::InvalidParameter(format!(
                    "unknown parameter '{key}'"
                )))
            }
        }
        Ok(())
    }

    /// Apply a parameter file of `key = value` lines. Blank lines and lines
    /// starting with `#` are skipped.
    pub fn load_file(&mut self, path: &Path) -> Result<()> {
        let text = fs::read_to_string(path).map_err(|source| RotorError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| {
                RotorError::InvalidParameter(format!("malformed parameter line '{line}'"))
            })?;
            self.set(key.trim(), value.trim())?;
        }
        Ok(())
    }

    /// Build a configuration from `--key=value` command-line arguments,
    /// applied over the defaults in order, then validate it.
    pub fn from_args<I>(args: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut config = RunConfig::default();
        for arg in args {
            let arg = arg.as_ref();
            let stripped = arg.strip_prefix("--").ok_or_else(|| {
                RotorError::InvalidParameter(format!("expected --key=value, got '{arg}'"))
            })?;
            let (key, value) = stripped.split_once('=').ok_or_else(|| {
                RotorError::InvalidParameter(format!("expected --key=value, got '{arg}'"))
            })?;
            config.set(key, value)?;
        }
        config
            .validate()
            .map_err(|e| RotorError::InvalidParameter(e.to_string()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.run_name, "test");
        assert_eq!(config.inertia, 1.0);
        assert_eq!(config.xdim, 4);
        assert_eq!(config.n_steps, 10_000);
        assert_eq!(config.n_thermal, 1_000);
        assert_eq!(config.update_mode, UpdateMode::Cluster);
        assert_eq!(config.delta_metro, 0.5);
        assert_eq!(config.file_id, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_update_mode_parsing() {
        assert_eq!(
            UpdateMode::try_from("metropolis"),
            Ok(UpdateMode::Metropolis)
        );
        assert_eq!(UpdateMode::try_from("cluster"), Ok(UpdateMode::Cluster));
        assert!(UpdateMode::try_from("wolff").is_err());
    }

    #[test]
    fn test_from_args_overrides_defaults() {
        let config = RunConfig::from_args([
            "--run_name=scan",
            "--inertia=0.25",
            "--theta=1.5",
            "--spacing=0.2",
            "--xdim=10",
            "--n_steps=500",
            "--algorithm=metropolis",
            "--delta_metro=0.3",
            "--file_id=2",
            "--seed=42",
        ])
        .unwrap();

        assert_eq!(config.run_name, "scan");
        assert_eq!(config.inertia, 0.25);
        assert_eq!(config.theta, 1.5);
        assert_eq!(config.spacing, 0.2);
        assert_eq!(config.xdim, 10);
        assert_eq!(config.n_steps, 500);
        assert_eq!(config.update_mode, UpdateMode::Metropolis);
        assert_eq!(config.delta_metro, 0.3);
        assert_eq!(config.file_id, Some(2));
        assert_eq!(config.seed, 42);
    }

    #[test]
    fn test_from_args_rejects_bad_shapes() {
        assert!(RunConfig::from_args(["xdim=10"]).is_err());
        assert!(RunConfig::from_args(["--xdim"]).is_err());
        assert!(RunConfig::from_args(["--xdim=ten"]).is_err());
        assert!(RunConfig::from_args(["--bogus=1"]).is_err());
        assert!(matches!(
            RunConfig::from_args(["--algorithm=heatbath"]),
            Err(RotorError::UnknownAlgorithm(_))
        ));
    }

    #[test]
    fn test_validation_bounds() {
        assert!(RunConfig::from_args(["--xdim=1"]).is_err());
        assert!(RunConfig::from_args(["--inertia=0"]).is_err());
        assert!(RunConfig::from_args(["--spacing=-1"]).is_err());
        assert!(RunConfig::from_args(["--n_steps=0"]).is_err());
        assert!(RunConfig::from_args(["--algorithm=metropolis", "--delta_metro=0"]).is_err());
        // a cluster run never reads delta_metro, so zero is tolerated there
        assert!(RunConfig::from_args(["--algorithm=cluster", "--delta_metro=0"]).is_ok());
    }

    #[test]
    fn test_parameter_file() {
        let path = std::env::temp_dir().join(format!("rotor-params-{}.txt", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "# scan point 3").unwrap();
        writeln!(file, "inertia = 0.5").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "xdim = 16").unwrap();
        writeln!(file, "algorithm = metropolis").unwrap();
        drop(file);

        let config = RunConfig::from_args([format!("--params={}", path.display())]).unwrap();
        assert_eq!(config.inertia, 0.5);
        assert_eq!(config.xdim, 16);
        assert_eq!(config.update_mode, UpdateMode::Metropolis);

        std::fs::remove_file(path).ok();
    }
}
