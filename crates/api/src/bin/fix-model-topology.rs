//! Rewrites a layers-model `model.json` so older loaders accept its input layer.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use inference_engine::topology::{fix_file, TopologyFix};

#[derive(Parser, Debug)]
#[command(author, version, about = "Rename batch_shape to batch_input_shape in model.json")]
struct Args {
    /// Path to model.json
    model: PathBuf,
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = api::init_logging("info", false) {
        eprintln!("Failed to initialize logging: {e}");
    }

    match fix_file(&args.model) {
        Ok(TopologyFix::Renamed) => {
            println!("Updated {}", args.model.display());
            ExitCode::SUCCESS
        }
        Ok(TopologyFix::AlreadyFixed) => {
            println!("No changes needed for {}", args.model.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
