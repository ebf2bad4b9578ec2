// ============================================================================
// CrochetFE CLI - headless rendering of grid files via command-line arguments
// ============================================================================
//
// Usage examples:
//   crochetfe --input scarf.json --output scarf.png
//   crochetfe -i scarf.json -o scarf.jpg --resolution 4 --grid-lines
//   crochetfe -i "patterns/*.json" --output-dir renders/ --format jpeg
//   crochetfe -i blanket.json --info
//
// No GUI is opened in CLI mode.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::components::colors::Color;
use crate::io::{ExportOptions, ImageFormat, LoadedGrid, MAX_EXPORT_RESOLUTION, export_image, load_grid_file};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// CrochetFE headless pattern renderer.
///
/// Render crochet grid files to images or print a summary, no GUI required.
#[derive(Parser, Debug)]
#[command(
    name = "crochetfe",
    version,
    about = "CrochetFE headless pattern renderer",
    long_about = "Render CrochetFE grid files (.json) to PNG or JPEG without opening\n\
                  the GUI, or print a summary of their contents.\n\n\
                  Example:\n  \
                  crochetfe --input scarf.json --output scarf.png --grid-lines\n  \
                  crochetfe -i \"*.json\" --output-dir out/ --format jpeg"
)]
pub struct CliArgs {
    /// Input grid file(s). Glob patterns accepted (e.g. "*.json", "designs/*.json").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Output image path. Only valid for single-file input.
    /// For batch input use --output-dir instead.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch rendering.
    /// Files are written here with the input's stem and the target format's extension.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output format: png or jpeg.
    /// When omitted, the format is inferred from --output's extension, defaulting to png.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// Resolution multiplier; each cell is 20 × N pixels.
    #[arg(short, long, default_value_t = 1, value_name = "1-8",
          value_parser = clap::value_parser!(u32).range(1..=MAX_EXPORT_RESOLUTION as i64))]
    pub resolution: u32,

    /// Draw grid lines between cells.
    #[arg(long)]
    pub grid_lines: bool,

    /// Print size, palette and color usage instead of rendering.
    #[arg(long)]
    pub info: bool,

    /// Print per-file timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Returns `true` when any CLI-mode flag is present in the real process arguments.
    /// Used by `main()` to route before creating an eframe window.
    pub fn is_cli_mode() -> bool {
        std::env::args().any(|a| a == "--input" || a == "-i" || a.starts_with("--input="))
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch rendering.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    let format = match parse_format(args.format.as_deref(), args.output.as_deref()) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if !args.info
        && let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("error: could not create output directory '{}': {}", dir.display(), e);
        return ExitCode::FAILURE;
    }

    let options = ExportOptions {
        resolution: args.resolution,
        include_grid_lines: args.grid_lines,
    };
    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }
        let file_start = Instant::now();

        let loaded = match load_grid_file(input_path) {
            Ok(l) => l,
            Err(e) => {
                eprintln!("  error: {}", e);
                any_failure = true;
                continue;
            }
        };

        if args.info {
            print!("{}", summarize(&loaded));
            continue;
        }

        let Some(output_path) = build_output_path(input_path, args.output.as_deref(), args.output_dir.as_deref(), format)
        else {
            eprintln!("  error: cannot determine output path for '{}'.", input_path.display());
            any_failure = true;
            continue;
        };

        match export_image(&loaded.grid, &output_path, format, &options) {
            Ok(()) => {
                if args.verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Helpers
// ============================================================================

/// Human-readable report for `--info`.
fn summarize(loaded: &LoadedGrid) -> String {
    let grid = &loaded.grid;
    let mut usage: BTreeMap<Color, usize> = BTreeMap::new();
    for color in grid.cells().iter().filter(|c| !c.is_background()) {
        *usage.entry(*color).or_default() += 1;
    }

    let mut out = String::new();
    out.push_str(&format!("  name:    {}\n", loaded.name.as_deref().unwrap_or("(unnamed)")));
    out.push_str(&format!("  size:    {} rows × {} cols\n", grid.rows(), grid.cols()));
    out.push_str(&format!("  filled:  {} of {} cells\n", grid.non_background_count(), grid.cells().len()));
    let palette: Vec<String> = loaded.palette.iter().map(|c| c.to_hex()).collect();
    out.push_str(&format!("  palette: {}\n", palette.join(", ")));
    for (color, count) in usage {
        out.push_str(&format!("    {}  {}\n", color, count));
    }
    out
}

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// Pick the format from `--format`, else from the output extension.
/// Defaults to PNG when neither says.
fn parse_format(format_arg: Option<&str>, output: Option<&Path>) -> Result<ImageFormat, String> {
    if let Some(f) = format_arg {
        return match f.to_lowercase().as_str() {
            "png" => Ok(ImageFormat::Png),
            "jpeg" | "jpg" => Ok(ImageFormat::Jpeg),
            other => Err(format!("unsupported format '{}' (expected png or jpeg)", other)),
        };
    }
    Ok(output.and_then(ImageFormat::from_path).unwrap_or(ImageFormat::Png))
}

fn extension(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "png",
        ImageFormat::Jpeg => "jpg",
    }
}

/// Compute the output path for a single input file.
///
/// Priority:
/// 1. `--output` (explicit path, used for single-file input)
/// 2. `--output-dir` (batch directory, derives filename from input stem)
/// 3. Fallback: next to the input, same stem, image extension
fn build_output_path(
    input: &Path,
    output: Option<&Path>,
    output_dir: Option<&Path>,
    format: ImageFormat,
) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let ext = extension(format);
    let stem = input.file_stem()?.to_string_lossy().into_owned();

    if let Some(dir) = output_dir {
        return Some(dir.join(format!("{}.{}", stem, ext)));
    }

    let parent = input.parent().unwrap_or(Path::new("."));
    Some(parent.join(format!("{}.{}", stem, ext)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{CellPos, GridState};

    #[test]
    fn format_comes_from_flag_then_extension() {
        assert_eq!(parse_format(Some("JPG"), None), Ok(ImageFormat::Jpeg));
        assert!(parse_format(Some("gif"), None).is_err());
        assert_eq!(parse_format(None, Some(Path::new("a.jpeg"))), Ok(ImageFormat::Jpeg));
        assert_eq!(parse_format(None, Some(Path::new("a.bmp"))), Ok(ImageFormat::Png));
        assert_eq!(parse_format(None, None), Ok(ImageFormat::Png));
    }

    #[test]
    fn output_path_priority() {
        let input = Path::new("designs/scarf.json");
        assert_eq!(
            build_output_path(input, Some(Path::new("x.png")), Some(Path::new("out")), ImageFormat::Png),
            Some(PathBuf::from("x.png"))
        );
        assert_eq!(
            build_output_path(input, None, Some(Path::new("out")), ImageFormat::Jpeg),
            Some(PathBuf::from("out/scarf.jpg"))
        );
        assert_eq!(
            build_output_path(input, None, None, ImageFormat::Png),
            Some(PathBuf::from("designs/scarf.png"))
        );
    }

    #[test]
    fn args_parse_with_clap() {
        let args = CliArgs::try_parse_from(["crochetfe", "-i", "a.json", "b.json", "--resolution", "4", "--grid-lines"])
            .unwrap();
        assert_eq!(args.input, vec!["a.json", "b.json"]);
        assert_eq!(args.resolution, 4);
        assert!(args.grid_lines && !args.info);
        assert!(CliArgs::try_parse_from(["crochetfe", "-i", "a.json", "-r", "9"]).is_err());
        assert!(CliArgs::try_parse_from(["crochetfe"]).is_err());
    }

    #[test]
    fn format_flag_wins_over_output_extension() {
        let dir = std::env::temp_dir().join(format!("crochetfe_cli_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let input = dir.join("scarf.json");
        let grid = GridState::new(5, 5);
        crate::io::save_grid_file(&input, &crate::io::GridFile::from_grid("scarf", &grid, &[Color::BLACK])).unwrap();

        let output = dir.join("scarf.png");
        let args = CliArgs::try_parse_from([
            "crochetfe",
            "-i",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--format",
            "jpeg",
        ])
        .unwrap();
        run(args);
        let guessed = image::io::Reader::open(&output).unwrap().with_guessed_format().unwrap().format();
        let _ = std::fs::remove_dir_all(&dir);
        assert_eq!(guessed, Some(image::ImageFormat::Jpeg));
    }

    #[test]
    fn summary_counts_colors() {
        let mut grid = GridState::new(5, 5);
        grid.set(CellPos::new(0, 0), Color::BLACK);
        grid.set(CellPos::new(0, 1), Color::BLACK);
        let report = summarize(&LoadedGrid {
            name: Some("scarf".into()),
            grid,
            palette: vec![Color::BLACK],
        });
        assert!(report.contains("scarf"));
        assert!(report.contains("2 of 25 cells"));
        assert!(report.contains("#000000  2"));
    }
}
