use std::process::ExitCode;

use indicatif::{ProgressBar, ProgressStyle};

use rotor_sim::{run_generation, Result, RunConfig};

fn main() -> ExitCode {
    let config = match RunConfig::from_args(std::env::args().skip(1)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("create_configs: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = run(config) {
        eprintln!("create_configs: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn run(mut config: RunConfig) -> Result<()> {
    let pb = if config.verbosity > 0 {
        let pb = ProgressBar::new(config.n_steps as u64);
        pb.set_style(
            ProgressStyle::with_template(
                "{msg} [{bar:40}] {pos}/{len} [{elapsed_precise} < {eta_precise}, {per_sec}]",
            )
            .unwrap()
            .progress_chars("=> "),
        );
        pb.set_message("steps");
        pb
    } else {
        ProgressBar::hidden()
    };

    let path = run_generation(&mut config, |_| pb.inc(1))?;
    pb.finish();

    println!(
        "wrote {} configurations to {}",
        config.n_steps,
        path.display()
    );
    Ok(())
}
