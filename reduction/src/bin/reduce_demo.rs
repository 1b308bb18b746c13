//! Synthetic reduction runs from the command line.
//!
//! Renders a dithered standard-star sequence and either measures its
//! photometric zero point or registers and stacks it. Results are printed as
//! JSON so runs can be compared.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use reduction::config::JsonConfig;
use reduction::image_proc::filters::apply_filter;
use reduction::recipes::{zero_point, AcquisitionMode, ZeroPointConfig};
use reduction::registration::{
    estimate_cube_offsets, load_offsets, select_anchor_points_with_ladder, PlaneOffset,
    XcorrConfig,
};
use reduction::resampling::{shift_and_add, Kernel, StackConfig};
use reduction::shared_args::{OffsetArg, SharedReductionArgs};
use reduction::{BarProgress, Cube, Image, NoProgress, Progress};
use shared::synthetic::{SyntheticFrame, SyntheticStar};
use shared::ImageSize;

#[derive(Parser, Debug)]
#[command(
    name = "Reduction Demo",
    about = "Zero point and shift-and-add on a synthetic dithered sequence",
    long_about = None
)]
struct Cli {
    #[command(flatten)]
    shared: SharedReductionArgs,

    /// Frame width and height in pixels
    #[arg(long, default_value_t = 128)]
    size: usize,

    /// Read noise standard deviation
    #[arg(long, default_value_t = 2.0)]
    noise: f64,

    /// Dither offsets, one "dx,dy" per plane
    #[arg(
        long,
        num_args = 1..,
        allow_hyphen_values = true,
        default_values = ["0,0", "1.2,-0.3", "2.5,0.7", "-0.4,1.1", "0,2"]
    )]
    dither: Vec<OffsetArg>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Measure the photometric zero point of the sequence
    ZeroPoint {
        /// Catalogue magnitude of the standard star
        #[arg(long, default_value_t = 10.0)]
        magnitude: f64,

        /// Integration time in seconds
        #[arg(long, default_value_t = 1.0)]
        dit: f64,

        /// Acquisition mode (chop or nochop)
        #[arg(long, default_value = "chop")]
        mode: AcquisitionMode,
    },
    /// Register the planes and shift-and-add them
    Stack {
        /// Planes rejected at the low end of every pixel
        #[arg(long, default_value_t = 1)]
        rej_min: usize,

        /// Planes rejected at the high end of every pixel
        #[arg(long, default_value_t = 1)]
        rej_max: usize,

        /// Keep only the area covered by every plane
        #[arg(long, default_value_t = false)]
        intersection: bool,
    },
}

fn render_sequence(size: usize, noise: f64, dither: &[OffsetArg]) -> anyhow::Result<Cube> {
    let centre = (size as f64 / 2.0, size as f64 / 2.0 + 10.0);
    let standard = SyntheticStar::new(centre.0, centre.1, 2000.0, 2.0);
    let field = [
        SyntheticStar::new(centre.0 - 25.0, centre.1 - 30.0, 600.0, 1.8),
        SyntheticStar::new(centre.0 + 22.0, centre.1 - 18.0, 450.0, 1.8),
    ];
    let planes = dither
        .iter()
        .enumerate()
        .map(|(i, d)| {
            let data = SyntheticFrame::new(ImageSize::from_width_height(size, size))
                .with_background(100.0)
                .with_noise(noise, 7 + i as u64)
                .with_star(standard.translated(d.0, d.1))
                .with_stars(field.iter().map(|s| s.translated(d.0, d.1)))
                .render();
            Image::from_array(data)
        })
        .collect();
    Ok(Cube::from_planes(planes)?)
}

fn measure_offsets(
    cube: &Cube,
    xcorr: &XcorrConfig,
    progress: &dyn Progress,
) -> anyhow::Result<Vec<PlaneOffset>> {
    let (ex, ey) = xcorr.edge_margin();
    let (anchors, _) = select_anchor_points_with_ladder(
        cube.plane(0),
        ex,
        ey,
        xcorr.sigma,
        xcorr.min_points,
        xcorr.max_points,
    )?;
    Ok(estimate_cube_offsets(cube, cube.plane(0), None, &anchors, xcorr, progress)?)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = if cli.shared.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if cli.dither.is_empty() {
        bail!("at least one dither position is needed");
    }
    let cube = render_sequence(cli.size, cli.noise, &cli.dither)?;
    let bar;
    let progress: &dyn Progress = if cli.shared.progress {
        bar = BarProgress::new();
        &bar
    } else {
        &NoProgress
    };

    let known_offsets = match &cli.shared.offsets {
        Some(path) => Some(
            load_offsets(path)
                .with_context(|| format!("reading offsets from {}", path.display()))?,
        ),
        None => None,
    };

    match cli.command {
        Commands::ZeroPoint { magnitude, dit, mode } => {
            let mut config = match &cli.shared.config {
                Some(path) => ZeroPointConfig::from_json_file(path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => ZeroPointConfig {
                    star_radius: 10.0,
                    background_inner: 14.0,
                    background_outer: 20.0,
                    ..ZeroPointConfig::default()
                },
            };
            config.star_magnitude = magnitude;
            config.dit = dit;
            config.mode = Some(mode);
            if let Some(offsets) = &known_offsets {
                config.offsets = Some(offsets.iter().map(|o| (o.dx, o.dy)).collect());
            }

            let result = zero_point(&cube, &config, progress)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Stack {
            rej_min,
            rej_max,
            intersection,
        } => {
            let mut config = match &cli.shared.config {
                Some(path) => StackConfig::from_json_file(path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => StackConfig::default(),
            };
            config.rej_min = rej_min;
            config.rej_max = rej_max;
            config.union = !intersection;

            let offsets = match known_offsets {
                Some(o) => o,
                None => measure_offsets(&cube, &XcorrConfig::default(), progress)?,
            };
            let kernel = Kernel::generate(cli.shared.kernel.to_kind());
            let mut stacked = shift_and_add(&cube, &offsets, &kernel, &config)?;
            if let Some(filter) = cli.shared.filter {
                log::info!("applying {filter} to the stacked image");
                stacked.image = apply_filter(&stacked.image, filter.to_filter());
            }

            let (min, max) = stacked.image.min_max();
            let summary = serde_json::json!({
                "offsets": offsets,
                "width": stacked.image.width(),
                "height": stacked.image.height(),
                "origin": stacked.origin,
                "used_planes": stacked.used_planes,
                "rejection_disabled": stacked.rejection_disabled,
                "median": stacked.image.median(),
                "min": min,
                "max": max,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }
    Ok(())
}
