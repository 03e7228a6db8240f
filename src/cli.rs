// ============================================================================
// FoldFE CLI — headless fortune-teller assembly via command-line arguments
// ============================================================================
//
// Usage examples:
//   foldfe -i class_photo.png -o sheet.png
//   foldfe -i faces.png --segment white --threshold 240 --min-size 100 -o sheet.png
//   foldfe -i contact_sheet.jpg --segment grid --grid 4 -o sheet.png
//   foldfe --numbers -o classic.png
//
// No GUI is opened in CLI mode: the input image is segmented into regions,
// the regions fill the template's assignable sections in order, and the
// print-resolution page is written to the output path.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::io::{encode_and_write, load_image_sync};
use crate::ops::text::load_system_font;
use crate::segment::{find_regions, grid_regions, BackgroundRule};
use crate::selection::extract_selection;
use crate::session::SelectionStore;
use crate::template::{FortuneTemplate, TemplateMode};
use crate::{log_err, log_info, log_warn};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// FoldFE headless sheet builder.
///
/// Segment a photo into regions and compose a printable fortune teller —
/// no GUI required.
#[derive(Parser, Debug)]
#[command(
    name = "foldfe",
    about = "FoldFE headless fortune-teller sheet builder",
    long_about = "Cut faces out of a photo and fold them into a printable\n\
                  fortune-teller sheet without opening the GUI.\n\n\
                  Example:\n  \
                  foldfe -i class_photo.png --segment white --threshold 240 -o sheet.png\n  \
                  foldfe -i contact_sheet.jpg --segment grid --grid 4 -o sheet.png"
)]
pub struct CliArgs {
    /// Input photo. Required unless --numbers is set.
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Output file path for the composed page (PNG or JPEG by extension).
    #[arg(short, long, value_name = "FILE", default_value = "fortune-teller.png")]
    pub output: PathBuf,

    /// Segmentation rule: white, black, transparent, custom, grid.
    #[arg(short, long, value_name = "RULE", default_value = "white")]
    pub segment: String,

    /// Background threshold for white/black/transparent rules (0-255).
    #[arg(short, long, default_value_t = 240, value_name = "0-255")]
    pub threshold: u8,

    /// Custom background color as R,G,B (only with --segment custom).
    #[arg(long, value_name = "R,G,B")]
    pub background: Option<String>,

    /// Color distance tolerance for --segment custom.
    #[arg(long, default_value_t = 30.0, value_name = "DIST")]
    pub tolerance: f32,

    /// Minimum region size in pixels; smaller blobs are noise.
    #[arg(short, long, default_value_t = 100, value_name = "PIXELS")]
    pub min_size: u64,

    /// Grid dimension for --segment grid (n×n cells).
    #[arg(short, long, default_value_t = 4, value_name = "N")]
    pub grid: u32,

    /// Template mode: both, corners, outer, inner.
    #[arg(long, value_name = "MODE", default_value = "both")]
    pub mode: String,

    /// Render the classic numbers-and-fortunes sheet (no input needed).
    #[arg(long)]
    pub numbers: bool,

    /// Print per-step timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Returns `true` when any CLI-mode flag is present in the real process
    /// arguments.  Used by `main()` to route before creating an eframe window.
    pub fn is_cli_mode() -> bool {
        std::env::args().any(|a| a == "--input" || a == "-i" || a == "--numbers")
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run the CLI pipeline and return an OS exit code.
/// `0` = page written, `1` = any failure.
pub fn run(args: CliArgs) -> ExitCode {
    match run_inner(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            log_err!("CLI run failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_inner(args: &CliArgs) -> Result<(), String> {
    let start = Instant::now();
    let font = load_system_font();
    if font.is_none() {
        eprintln!("warning: no system font found; sections render without labels");
        log_warn!("No system font found; rendering without labels");
    }
    let mut template = FortuneTemplate::new(font);

    let mode = if args.numbers {
        TemplateMode::Numbers
    } else {
        parse_mode(&args.mode)?
    };
    template.set_mode(mode);

    if mode != TemplateMode::Numbers {
        let input = args
            .input
            .as_ref()
            .ok_or_else(|| "--input is required unless --numbers is set".to_string())?;
        let image = load_image_sync(input)?;
        if args.verbose {
            println!(
                "loaded {} ({}x{}) in {:.0}ms",
                input.display(),
                image.width(),
                image.height(),
                start.elapsed().as_secs_f64() * 1000.0
            );
        }

        // Segment, extract each region, and fill the assignable sections
        // in enumeration order.
        let regions = if args.segment.eq_ignore_ascii_case("grid") {
            grid_regions(image.width(), image.height(), args.grid)
        } else {
            let rule = parse_rule(args)?;
            find_regions(&image, rule, args.min_size).map_err(|e| e.to_string())?
        };
        log_info!("CLI segmentation produced {} regions", regions.len());

        let mut store = SelectionStore::new();
        let sections = template.available_sections();
        if args.verbose {
            println!(
                "{} regions found, {} sections to fill",
                regions.len(),
                sections.len()
            );
        }

        for (region, section) in regions.iter().zip(sections.iter()) {
            let selection = region.to_selection();
            let raster = extract_selection(&image, &selection);
            let record = store.add_region("cli", selection, raster);
            template.set_assignment(section.id, record);
        }
    }

    let page = template.render_for_print();
    encode_and_write(&page, &args.output)
        .map_err(|e| format!("Failed to write {}: {}", args.output.display(), e))?;

    if args.verbose {
        println!(
            "→ {} ({:.0}ms total)",
            args.output.display(),
            start.elapsed().as_secs_f64() * 1000.0
        );
    }
    Ok(())
}

// ============================================================================
// Argument parsing helpers
// ============================================================================

fn parse_mode(mode: &str) -> Result<TemplateMode, String> {
    match mode.to_lowercase().as_str() {
        "both" => Ok(TemplateMode::Both),
        "corners" => Ok(TemplateMode::Corners),
        "outer" => Ok(TemplateMode::Outer),
        "inner" => Ok(TemplateMode::Inner),
        "numbers" => Ok(TemplateMode::Numbers),
        other => Err(format!(
            "unknown mode '{}' (expected both, corners, outer, inner, numbers)",
            other
        )),
    }
}

fn parse_rule(args: &CliArgs) -> Result<BackgroundRule, String> {
    match args.segment.to_lowercase().as_str() {
        "white" => Ok(BackgroundRule::White {
            threshold: args.threshold,
        }),
        "black" => Ok(BackgroundRule::Black {
            threshold: args.threshold,
        }),
        "transparent" => Ok(BackgroundRule::Alpha {
            threshold: args.threshold,
        }),
        "custom" => {
            let spec = args
                .background
                .as_ref()
                .ok_or_else(|| "--segment custom requires --background R,G,B".to_string())?;
            let color = parse_rgb(spec)?;
            Ok(BackgroundRule::Custom {
                color,
                threshold: args.tolerance,
            })
        }
        other => Err(format!(
            "unknown segmentation rule '{}' (expected white, black, transparent, custom, grid)",
            other
        )),
    }
}

fn parse_rgb(spec: &str) -> Result<[u8; 3], String> {
    let parts: Vec<&str> = spec.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(format!("invalid color '{}' (expected R,G,B)", spec));
    }
    let mut rgb = [0u8; 3];
    for (slot, part) in rgb.iter_mut().zip(parts.iter()) {
        *slot = part
            .parse::<u8>()
            .map_err(|_| format!("invalid color component '{}' (expected 0-255)", part))?;
    }
    Ok(rgb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rgb_accepts_spaced_triples() {
        assert_eq!(parse_rgb("45, 58, 90").unwrap(), [45, 58, 90]);
        assert!(parse_rgb("45,58").is_err());
        assert!(parse_rgb("45,58,300").is_err());
    }

    #[test]
    fn parse_mode_is_case_insensitive() {
        assert_eq!(parse_mode("Corners").unwrap(), TemplateMode::Corners);
        assert!(parse_mode("sideways").is_err());
    }

    #[test]
    fn defaults_match_the_documented_pipeline() {
        let args = CliArgs::parse_from(["foldfe", "-i", "photo.png"]);
        assert_eq!(args.segment, "white");
        assert_eq!(args.threshold, 240);
        assert_eq!(args.min_size, 100);
        assert_eq!(args.grid, 4);
        assert!(!args.numbers);
    }
}
