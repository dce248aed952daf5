//! CLI entry point: `simulator <dir>` loads `<dir>/config.json`, wires the
//! named model, and runs the simulation kernel for `runTime` seconds.

use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;
use std::time::Duration;

use stb_simulator::config::Config;
use stb_simulator::error::SimError;
use stb_simulator::kernel::Kernel;
use stb_simulator::modules::ModelBasic;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let Some(dir) = args.get(1) else {
        eprintln!("usage: simulator <dir>");
        return ExitCode::from(255); // exit code -1
    };

    match run(PathBuf::from(dir)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!(target: "simulator::main", "{e}");
            ExitCode::from(255)
        }
    }
}

fn run(dir: PathBuf) -> Result<(), SimError> {
    let config = Rc::new(Config::load_from_dir(&dir)?);
    let model_name = config.main_model()?;
    let run_time = config.run_time_secs()?;

    let kernel = Kernel::new();
    match model_name {
        "ModelBasic" => ModelBasic::build(&kernel, config)?,
        other => {
            return Err(SimError::ModelNotFound {
                module: "/simulator/main".to_string(),
                model: other.to_string(),
            })
        }
    }

    let start = std::time::Instant::now();
    kernel.run(Duration::from_secs_f64(run_time as f64));
    let elapsed = start.elapsed();
    log::info!(
        target: "simulator::main",
        "simulation reached virtual time {:.3}s in {:.3}s wall-clock",
        kernel.now_secs(),
        elapsed.as_secs_f64()
    );

    Ok(())
}
