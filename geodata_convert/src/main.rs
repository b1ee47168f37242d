// CLI entry point for the legacy geodata converter.
//
// Converts every tile in a range from one legacy layout to unified region
// files. See `batch.rs` for per-tile behaviour and `legacy.rs` for the two
// input layouts.
//
// Usage:
//   geoconv --input <DIR> --output <DIR> [OPTIONS]
//     --format <compact|header>   Legacy layout (default: compact)
//     --tile-x-min/--tile-x-max   Tile x range (default: 16..=26)
//     --tile-y-min/--tile-y-max   Tile y range (default: 10..=26)
//     --input-pattern <PAT>       Input name pattern, `{x}`/`{y}` placeholders
//     --output-pattern <PAT>      Output name pattern (default: {x}_{y}.geo)
//     --strict-header             Fail a tile whose header names another tile
//     --no-diagonals              Skip diagonal flag derivation
//     -v, -vv                     More logging (RUST_LOG overrides)

use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Parser;
use geodata_convert::{ConvertOptions, LegacyFormat, convert_all};
use geodata_core::config::WorldLayout;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "geoconv")]
#[command(about = "Convert legacy geodata region files to the unified format")]
struct Args {
    /// Directory holding the legacy region files
    #[arg(short, long)]
    input: PathBuf,

    /// Directory to write unified region files into (created if missing)
    #[arg(short, long)]
    output: PathBuf,

    /// Legacy file layout
    #[arg(short, long, value_enum, default_value = "compact")]
    format: LegacyFormat,

    #[arg(long, default_value = "16")]
    tile_x_min: i32,

    #[arg(long, default_value = "26")]
    tile_x_max: i32,

    #[arg(long, default_value = "10")]
    tile_y_min: i32,

    #[arg(long, default_value = "26")]
    tile_y_max: i32,

    /// Input file name pattern; defaults to the layout's usual naming
    #[arg(long)]
    input_pattern: Option<String>,

    #[arg(long, default_value = "{x}_{y}.geo")]
    output_pattern: String,

    /// Treat a header/file name tile mismatch as a conversion failure
    #[arg(long)]
    strict_header: bool,

    /// Write cardinal flags only
    #[arg(long)]
    no_diagonals: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    if args.tile_x_min > args.tile_x_max || args.tile_y_min > args.tile_y_max {
        bail!(
            "empty tile range {}..={} x {}..={}",
            args.tile_x_min,
            args.tile_x_max,
            args.tile_y_min,
            args.tile_y_max
        );
    }

    let options = ConvertOptions {
        tiles: WorldLayout {
            tile_x_min: args.tile_x_min,
            tile_x_max: args.tile_x_max,
            tile_y_min: args.tile_y_min,
            tile_y_max: args.tile_y_max,
            ..WorldLayout::default()
        },
        input_pattern: args.input_pattern,
        output_pattern: args.output_pattern,
        strict_header: args.strict_header,
        derive_diagonals: !args.no_diagonals,
        ..ConvertOptions::new(args.input, args.output, args.format)
    };

    let summary = convert_all(&options)
        .with_context(|| format!("cannot write to {}", options.output_dir.display()))?;
    println!("{summary}");
    if summary.failed > 0 {
        bail!("{} region(s) failed to convert", summary.failed);
    }
    Ok(())
}
