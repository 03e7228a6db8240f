#![allow(clippy::too_many_arguments)]

use std::process::ExitCode;

use eframe::egui;
use foldfe::app::FoldApp;
use foldfe::{cli, log_err, logger};

fn main() -> ExitCode {
    // -- CLI / headless mode ---------------------------------------------
    if cli::CliArgs::is_cli_mode() {
        use clap::Parser;
        logger::init();
        let args = cli::CliArgs::parse();
        return cli::run(args);
    }

    // -- GUI mode -----------------------------------------------------

    // Initialize session log (overwrites previous session log)
    logger::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 760.0])
            .with_title("FoldFE"),
        ..Default::default()
    };

    match eframe::run_native(
        "FoldFE",
        options,
        Box::new(|cc| Box::new(FoldApp::new(cc))),
    ) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log_err!("eframe exited with error: {}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
