use std::process::ExitCode;

use clap::Parser;
use pixelframe::cli::{self, CliArgs};
use pixelframe::logger;

fn main() -> ExitCode {
    let args = CliArgs::parse();

    // Initialize session log (overwrites previous session log)
    logger::init("PixelFrame");
    logger::set_verbose(args.verbose);

    cli::run(args)
}
