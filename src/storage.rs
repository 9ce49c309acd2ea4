//! Persistence: the binary configuration stream and the plain-text
//! observable files.
//!
//! The configuration format is bare: a fixed-layout header followed by raw
//! little-endian records, no version tag, no checksum.
//! Reader and writer agree out-of-band on `xdim` and byte order.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::config::{RunConfig, UpdateMode};
use crate::diagnostics::ObservableSink;
use crate::error::{Result, RotorError};
use crate::lattice::{AlgorithmTag, Boundary, Lattice};

// --- Binary configuration stream ---

/// Header layout: I (f64), a (f64), xdim (i32), boundary (u8), algorithm (u8).
pub fn write_header<W: Write>(lattice: &Lattice, out: &mut W) -> Result<()> {
    out.write_all(&lattice.inertia.to_le_bytes())?;
    out.write_all(&lattice.spacing.to_le_bytes())?;
    out.write_all(&(lattice.xdim as i32).to_le_bytes())?;
    out.write_all(&[lattice.boundary.as_byte()])?;
    out.write_all(&[lattice.algorithm.as_byte()])?;
    Ok(())
}

/// Read a header into `lattice`, resizing its site and correlation buffers
/// if the stored `xdim` differs, and re-establishing periodic boundaries
/// when the stored boundary flag says so.
pub fn read_header<R: Read>(lattice: &mut Lattice, input: &mut R) -> Result<()> {
    let mut buf8 = [0u8; 8];
    input.read_exact(&mut buf8)?;
    lattice.inertia = f64::from_le_bytes(buf8);
    input.read_exact(&mut buf8)?;
    lattice.spacing = f64::from_le_bytes(buf8);

    let mut buf4 = [0u8; 4];
    input.read_exact(&mut buf4)?;
    let xdim = i32::from_le_bytes(buf4);
    if xdim < 1 {
        return Err(RotorError::InvalidParameter(format!(
            "configuration header carries xdim = {xdim}"
        )));
    }

    let mut byte = [0u8; 1];
    input.read_exact(&mut byte)?;
    let boundary = Boundary::from_byte(byte[0]).ok_or(RotorError::InvalidHeader {
        field: "boundary",
        value: byte[0],
    })?;
    input.read_exact(&mut byte)?;
    let algorithm = AlgorithmTag::from_byte(byte[0]).ok_or(RotorError::InvalidHeader {
        field: "algorithm",
        value: byte[0],
    })?;

    if lattice.xdim != xdim as usize {
        *lattice = Lattice::new(lattice.inertia, lattice.spacing, xdim as usize, lattice.theta);
    }
    lattice.algorithm = algorithm;
    if boundary == Boundary::Periodic {
        lattice.set_periodic_boundaries();
    }
    Ok(())
}

/// One record: `xdim` consecutive f64 site angles in index order.
pub fn write_record<W: Write>(lattice: &Lattice, out: &mut W) -> Result<()> {
    for site in &lattice.sites {
        out.write_all(&site.phi.to_le_bytes())?;
    }
    Ok(())
}

enum FloatRead {
    Value(f64),
    CleanEof,
    MidFloatEof,
}

fn read_f64<R: Read>(input: &mut R) -> Result<FloatRead> {
    let mut buf = [0u8; 8];
    let mut filled = 0;
    while filled < 8 {
        let n = input.read(&mut buf[filled..])?;
        if n == 0 {
            return Ok(if filled == 0 {
                FloatRead::CleanEof
            } else {
                FloatRead::MidFloatEof
            });
        }
        filled += n;
    }
    Ok(FloatRead::Value(f64::from_le_bytes(buf)))
}

/// Read one record into the lattice.
///
/// Returns `Ok(true)` when a full record was read, `Ok(false)` on clean
/// end-of-stream exactly at a record boundary. A stream that stops strictly
/// inside a record is corrupt and fatal.
pub fn read_record<R: Read>(lattice: &mut Lattice, input: &mut R) -> Result<bool> {
    for i in 0..lattice.xdim {
        match read_f64(input)? {
            FloatRead::Value(phi) => lattice.sites[i].phi = phi,
            FloatRead::CleanEof if i == 0 => return Ok(false),
            FloatRead::CleanEof | FloatRead::MidFloatEof => {
                return Err(RotorError::TruncatedRecord {
                    read: i,
                    expected: lattice.xdim,
                })
            }
        }
    }
    Ok(true)
}

// --- Run-derived file naming ---

/// Build the run-derived name stem for a file of the given kind, e.g.
/// `Q_test_I0.25_a0.2_xdim10_Cluster`. Configuration files (`Conf`) omit
/// the run name and the theta tag so that differently named runs can share
/// configurations.
pub fn file_stem(kind: &str, config: &RunConfig) -> String {
    let mut stem = kind.to_string();
    if kind != "Conf" {
        stem.push_str(&format!("_{}", config.run_name));
    }
    stem.push_str(&format!("_I{}", config.inertia));
    if kind != "Conf" && config.theta.abs() > 1e-15 {
        stem.push_str(&format!("_theta{}", config.theta));
    }
    stem.push_str(&format!("_a{}", config.spacing));
    stem.push_str(&format!("_xdim{}", config.xdim));
    match config.update_mode {
        UpdateMode::Metropolis => stem.push_str(&format!("_Metro_delta{}", config.delta_metro)),
        UpdateMode::Cluster => stem.push_str("_Cluster"),
    }
    stem
}

fn next_free_id(directory: &Path, stem: &str) -> usize {
    let mut id = 0;
    while directory.join(format!("{stem}_id{id}")).exists() {
        id += 1;
    }
    id
}

/// Next unused file index for this run's configuration stem. Drivers pin
/// this into `config.file_id` up front so the configuration stream and all
/// observable files of one run share an index.
pub fn next_free_config_id(config: &RunConfig) -> Result<usize> {
    let directory = Path::new(&config.config_directory);
    fs::create_dir_all(directory).map_err(|source| RotorError::Open {
        path: directory.to_path_buf(),
        source,
    })?;
    Ok(next_free_id(directory, &file_stem("Conf", config)))
}

/// Full path for an observable file, creating the output directory on
/// demand. When `config.file_id` is unset the next free index is used.
pub fn observable_path(kind: &str, config: &RunConfig) -> Result<PathBuf> {
    resolve_path(kind, Path::new(&config.output_directory), config)
}

/// Full path for the configuration file inside the config directory.
pub fn config_path(config: &RunConfig) -> Result<PathBuf> {
    resolve_path("Conf", Path::new(&config.config_directory), config)
}

fn resolve_path(kind: &str, directory: &Path, config: &RunConfig) -> Result<PathBuf> {
    fs::create_dir_all(directory).map_err(|source| RotorError::Open {
        path: directory.to_path_buf(),
        source,
    })?;
    let stem = file_stem(kind, config);
    let id = match config.file_id {
        Some(id) => id,
        None => next_free_id(directory, &stem),
    };
    Ok(directory.join(format!("{stem}_id{id}")))
}

// --- Observable files ---

/// Plain-text observable file: one scalar per line, or tab-separated
/// correlation rows. Failure to create or open is fatal at open time.
pub struct ObsFile {
    path: PathBuf,
    out: BufWriter<File>,
}

impl ObsFile {
    /// Create (truncate) the observable file for `kind` under the run's
    /// output directory.
    pub fn create(kind: &str, config: &RunConfig) -> Result<Self> {
        let path = observable_path(kind, config)?;
        let file = File::create(&path).map_err(|source| RotorError::Open {
            path: path.clone(),
            source,
        })?;
        Ok(ObsFile {
            path,
            out: BufWriter::new(file),
        })
    }

    /// Open an existing observable file for appending.
    pub fn open_append(kind: &str, config: &RunConfig) -> Result<Self> {
        let path = observable_path(kind, config)?;
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| RotorError::Open {
                path: path.clone(),
                source,
            })?;
        Ok(ObsFile {
            path,
            out: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

impl ObservableSink for ObsFile {
    fn append_scalar(&mut self, value: f64) -> Result<()> {
        writeln!(self.out, "{value}")?;
        Ok(())
    }

    fn append_int(&mut self, value: i64) -> Result<()> {
        writeln!(self.out, "{value}")?;
        Ok(())
    }

    fn append_row(&mut self, step: usize, separation: usize, value: f64) -> Result<()> {
        writeln!(self.out, "{step}\t{separation}\t{value}")?;
        Ok(())
    }
}

// --- Configuration files ---

/// Writer over the binary configuration stream.
pub struct ConfigWriter {
    path: PathBuf,
    out: BufWriter<File>,
}

impl ConfigWriter {
    pub fn create(config: &RunConfig) -> Result<Self> {
        let path = config_path(config)?;
        let file = File::create(&path).map_err(|source| RotorError::Open {
            path: path.clone(),
            source,
        })?;
        Ok(ConfigWriter {
            path,
            out: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_header(&mut self, lattice: &Lattice) -> Result<()> {
        write_header(lattice, &mut self.out)
    }

    pub fn write_record(&mut self, lattice: &Lattice) -> Result<()> {
        write_record(lattice, &mut self.out)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

impl Write for ConfigWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.out.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.out.flush()
    }
}

/// Reader over the binary configuration stream.
pub struct ConfigReader {
    path: PathBuf,
    input: BufReader<File>,
}

impl ConfigReader {
    pub fn open(config: &RunConfig) -> Result<Self> {
        let path = config_path(config)?;
        Self::open_path(path)
    }

    pub fn open_path(path: PathBuf) -> Result<Self> {
        let file = File::open(&path).map_err(|source| RotorError::Open {
            path: path.clone(),
            source,
        })?;
        Ok(ConfigReader {
            path,
            input: BufReader::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_header(&mut self, lattice: &mut Lattice) -> Result<()> {
        read_header(lattice, &mut self.input)
    }

    pub fn read_record(&mut self, lattice: &mut Lattice) -> Result<bool> {
        read_record(lattice, &mut self.input)
    }
}

impl Read for ConfigReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.input.read(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_lattice() -> Lattice {
        let mut lat = Lattice::new(0.25, 0.2, 6, 0.0);
        lat.set_periodic_boundaries();
        for (i, site) in lat.sites.iter_mut().enumerate() {
            site.phi = 0.37 * i as f64 - 1.0;
        }
        lat.algorithm = AlgorithmTag::Cluster;
        lat
    }

    #[test]
    fn test_header_layout_is_22_bytes() {
        let lat = sample_lattice();
        let mut buf = Vec::new();
        write_header(&lat, &mut buf).unwrap();

        assert_eq!(buf.len(), 8 + 8 + 4 + 1 + 1);
        assert_eq!(f64::from_le_bytes(buf[0..8].try_into().unwrap()), 0.25);
        assert_eq!(f64::from_le_bytes(buf[8..16].try_into().unwrap()), 0.2);
        assert_eq!(i32::from_le_bytes(buf[16..20].try_into().unwrap()), 6);
        assert_eq!(buf[20], b'p');
        assert_eq!(buf[21], b'c');
    }

    #[test]
    fn test_header_round_trip_restores_ring() {
        let lat = sample_lattice();
        let mut buf = Vec::new();
        write_header(&lat, &mut buf).unwrap();

        let mut restored = Lattice::new(1.0, 1.0, 6, 0.0);
        read_header(&mut restored, &mut Cursor::new(buf)).unwrap();

        assert_eq!(restored.inertia, 0.25);
        assert_eq!(restored.spacing, 0.2);
        assert_eq!(restored.xdim, 6);
        assert_eq!(restored.boundary, Boundary::Periodic);
        assert_eq!(restored.algorithm, AlgorithmTag::Cluster);
        assert_eq!(restored.sites[0].id_before, 5);
        assert_eq!(restored.sites[5].id_after, 0);
    }

    #[test]
    fn test_header_resizes_mismatched_lattice() {
        let lat = sample_lattice();
        let mut buf = Vec::new();
        write_header(&lat, &mut buf).unwrap();

        let mut restored = Lattice::new(1.0, 1.0, 3, 0.5);
        read_header(&mut restored, &mut Cursor::new(buf)).unwrap();
        assert_eq!(restored.xdim, 6);
        assert_eq!(restored.sites.len(), 6);
        assert_eq!(restored.corr.len(), 6);
        // theta is not part of the header and survives the resize
        assert_eq!(restored.theta, 0.5);
    }

    #[test]
    fn test_record_round_trip_is_bit_exact() {
        let lat = sample_lattice();
        let mut buf = Vec::new();
        write_record(&lat, &mut buf).unwrap();
        assert_eq!(buf.len(), 6 * 8);

        let mut restored = Lattice::new(0.25, 0.2, 6, 0.0);
        restored.set_periodic_boundaries();
        assert!(read_record(&mut restored, &mut Cursor::new(buf)).unwrap());

        for (a, b) in lat.sites.iter().zip(restored.sites.iter()) {
            assert_eq!(a.phi.to_bits(), b.phi.to_bits());
        }
    }

    #[test]
    fn test_clean_eof_at_record_boundary() {
        let lat = sample_lattice();
        let mut buf = Vec::new();
        write_record(&lat, &mut buf).unwrap();

        let mut restored = sample_lattice();
        let mut cursor = Cursor::new(buf);
        assert!(read_record(&mut restored, &mut cursor).unwrap());
        // Next read starts exactly at a record boundary: clean end of stream.
        assert!(!read_record(&mut restored, &mut cursor).unwrap());
    }

    #[test]
    fn test_truncated_record_is_fatal() {
        let lat = sample_lattice();
        let mut buf = Vec::new();
        write_record(&lat, &mut buf).unwrap();
        buf.truncate(3 * 8); // stops between floats 2 and 3

        let mut restored = sample_lattice();
        let err = read_record(&mut restored, &mut Cursor::new(buf)).unwrap_err();
        match err {
            RotorError::TruncatedRecord { read, expected } => {
                assert_eq!(read, 3);
                assert_eq!(expected, 6);
            }
            other => panic!("expected TruncatedRecord, got {other}"),
        }
    }

    #[test]
    fn test_partial_first_float_is_fatal() {
        let mut restored = sample_lattice();
        let buf = vec![0u8; 5]; // mid-float end of stream
        assert!(read_record(&mut restored, &mut Cursor::new(buf)).is_err());
    }

    #[test]
    fn test_unknown_header_bytes_rejected() {
        let lat = sample_lattice();
        let mut buf = Vec::new();
        write_header(&lat, &mut buf).unwrap();
        buf[20] = b'x';

        let mut restored = Lattice::new(1.0, 1.0, 6, 0.0);
        let err = read_header(&mut restored, &mut Cursor::new(buf)).unwrap_err();
        assert!(matches!(
            err,
            RotorError::InvalidHeader {
                field: "boundary",
                value: b'x'
            }
        ));
    }

    #[test]
    fn test_file_stem_metropolis_and_cluster() {
        let mut config = RunConfig::default();
        config.run_name = "demo".into();
        config.inertia = 0.25;
        config.spacing = 0.2;
        config.xdim = 10;
        config.delta_metro = 0.5;

        config.update_mode = UpdateMode::Metropolis;
        assert_eq!(
            file_stem("Q", &config),
            "Q_demo_I0.25_a0.2_xdim10_Metro_delta0.5"
        );

        config.update_mode = UpdateMode::Cluster;
        config.theta = 1.5;
        assert_eq!(
            file_stem("Q", &config),
            "Q_demo_I0.25_theta1.5_a0.2_xdim10_Cluster"
        );
        // Conf files omit the run name and theta tag
        assert_eq!(file_stem("Conf", &config), "Conf_I0.25_a0.2_xdim10_Cluster");
    }

    #[test]
    fn test_config_file_round_trip_on_disk() {
        let dir = std::env::temp_dir().join(format!("rotor-sim-test-{}", std::process::id()));
        let mut config = RunConfig::default();
        config.config_directory = dir.to_string_lossy().into_owned();
        config.output_directory = config.config_directory.clone();
        config.xdim = 4;
        config.file_id = Some(0);

        let mut lat = Lattice::from_config(&config);
        lat.set_periodic_boundaries();
        for (i, site) in lat.sites.iter_mut().enumerate() {
            site.phi = 1.25 * i as f64;
        }

        let mut writer = ConfigWriter::create(&config).unwrap();
        writer.write_header(&lat).unwrap();
        writer.write_record(&lat).unwrap();
        writer.flush().unwrap();

        let mut restored = Lattice::from_config(&config);
        let mut reader = ConfigReader::open(&config).unwrap();
        reader.read_header(&mut restored).unwrap();
        assert!(reader.read_record(&mut restored).unwrap());
        assert!(!reader.read_record(&mut restored).unwrap());

        for (a, b) in lat.sites.iter().zip(restored.sites.iter()) {
            assert_eq!(a.phi.to_bits(), b.phi.to_bits());
        }

        std::fs::remove_dir_all(dir).ok();
    }
}
