//! Conisub CLI - conic subdivision command-line tool.
//!
//! Usage: conisub <COMMAND> [OPTIONS] <INPUT> [OUTPUT]
//!
//! Run `conisub --help` for available commands.

mod text;

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand, ValueEnum};

use conisub::algo::conic::RootSelection;
use conisub::algo::curvature::{curvature_profile, CurvatureType};
use conisub::algo::fit::ConicFitter;
use conisub::algo::progress::CancelToken;
use conisub::algo::refine::{NormalRefiner, RefineOptions, SmoothnessPenalty};
use conisub::algo::subdivide::{ConicSubdivider, SubdivisionSettings};
use conisub::algo::Progress;
use conisub::curve::Curve;
use conisub::error::CurveError;
use conisub::geom::{orient, perp};

#[derive(Parser)]
#[command(name = "conisub")]
#[command(author, version, about = "Conic subdivision CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display curve information
    Info {
        /// Input curve file
        input: PathBuf,

        /// Curvature estimator for the statistics
        #[arg(short, long, value_enum, default_value = "circle-radius")]
        curvature: CurvatureArg,
    },

    /// Subdivide a curve
    Subdivide {
        /// Input curve file
        input: PathBuf,

        /// Output curve file
        output: PathBuf,

        /// Subdivision level
        #[arg(short, long, default_value = "3")]
        level: usize,

        #[command(flatten)]
        scheme: SchemeArgs,
    },

    /// Refine normals for smooth curvature, optionally subdividing afterwards
    Refine {
        /// Input curve file
        input: PathBuf,

        /// Output curve file
        output: PathBuf,

        /// Refinement passes over all vertices
        #[arg(short, long, default_value = "1")]
        iterations: usize,

        /// Subdivision depth used to score candidate normals
        #[arg(short, long, default_value = "4")]
        test_level: usize,

        /// Search stops below this rotation step (radians)
        #[arg(short, long, default_value = "0.001")]
        angle_limit: f64,

        /// Curvature estimator used for scoring
        #[arg(short, long, value_enum, default_value = "circle-radius")]
        curvature: CurvatureArg,

        /// Score function
        #[arg(long, value_enum, default_value = "difference")]
        penalty: PenaltyArg,

        /// Subdivide the refined curve this many levels before saving
        #[arg(short, long)]
        subdivide: Option<usize>,

        /// Use single-threaded execution (for benchmarking)
        #[arg(long)]
        sequential: bool,

        #[command(flatten)]
        scheme: SchemeArgs,
    },

    /// Fit the conic of one edge and print it
    Fit {
        /// Input curve file
        input: PathBuf,

        /// Edge index (from vertex i to its successor)
        #[arg(short, long)]
        edge: usize,

        #[command(flatten)]
        scheme: SchemeArgs,
    },
}

/// Subdivision scheme flags shared by several commands.
#[derive(clap::Args)]
struct SchemeArgs {
    /// Patch half-width (1 to 4)
    #[arg(short, long, default_value = "2")]
    patch_size: usize,

    /// Do not grow patches when a fit fails
    #[arg(long)]
    fixed_patch: bool,

    /// Do not insert inflection points
    #[arg(long)]
    no_split: bool,

    /// Place inflection points by turning angle
    #[arg(long)]
    weighted_inflections: bool,

    /// With weighted placement, favour the flatter endpoint
    #[arg(long)]
    gravitate_smaller: bool,

    /// Length-weighted normals
    #[arg(long)]
    area_weighted: bool,

    /// Circle-based automatic normals
    #[arg(long)]
    circle_normals: bool,

    /// Which ray/conic intersection to keep
    #[arg(long, value_enum, default_value = "smallest-absolute")]
    root: RootArg,

    /// Numerical tolerance
    #[arg(long, default_value = "1e-8")]
    epsilon: f64,
}

impl SchemeArgs {
    fn settings(&self) -> Result<SubdivisionSettings, CurveError> {
        let settings = SubdivisionSettings::default()
            .with_patch_size(self.patch_size)
            .with_dynamic_patch_size(!self.fixed_patch)
            .with_convexity_split(!self.no_split)
            .with_weighted_infl_point_location(self.weighted_inflections)
            .with_gravitate_smaller_angles(self.gravitate_smaller)
            .with_area_weighted_normals(self.area_weighted)
            .with_circle_normals(self.circle_normals)
            .with_root_selection(self.root.into())
            .with_epsilon(self.epsilon);
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum CurvatureArg {
    /// Inverse circumradius
    CircleRadius,
    /// Turning angle over mean edge length
    DiscreteWinding,
    /// Unit tangent change over mean edge length
    GradientArcLength,
    /// Signed area over cubed length
    AreaInflation,
}

impl From<CurvatureArg> for CurvatureType {
    fn from(arg: CurvatureArg) -> Self {
        match arg {
            CurvatureArg::CircleRadius => CurvatureType::CircleRadius,
            CurvatureArg::DiscreteWinding => CurvatureType::DiscreteWinding,
            CurvatureArg::GradientArcLength => CurvatureType::GradientArcLength,
            CurvatureArg::AreaInflation => CurvatureType::AreaInflation,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum PenaltyArg {
    /// Ratio of the larger to the smaller curvature
    Ratio,
    /// Absolute curvature difference
    Difference,
}

impl From<PenaltyArg> for SmoothnessPenalty {
    fn from(arg: PenaltyArg) -> Self {
        match arg {
            PenaltyArg::Ratio => SmoothnessPenalty::Ratio,
            PenaltyArg::Difference => SmoothnessPenalty::Difference,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum RootArg {
    /// Root closest to the edge
    SmallestAbsolute,
    /// Numerically stable root of the quadratic formula
    SignConsistent,
    /// Nearest root along the normal direction
    SmallestPositive,
}

impl From<RootArg> for RootSelection {
    fn from(arg: RootArg) -> Self {
        match arg {
            RootArg::SmallestAbsolute => RootSelection::SmallestAbsolute,
            RootArg::SignConsistent => RootSelection::SignConsistent,
            RootArg::SmallestPositive => RootSelection::SmallestPositive,
        }
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Info { input, curvature } => {
            cmd_info(&input, curvature)?;
        }

        Commands::Subdivide {
            input,
            output,
            level,
            scheme,
        } => {
            cmd_subdivide(&input, &output, level, &scheme)?;
        }

        Commands::Refine {
            input,
            output,
            iterations,
            test_level,
            angle_limit,
            curvature,
            penalty,
            subdivide,
            sequential,
            scheme,
        } => {
            let options = RefineOptions::default()
                .with_max_iterations(iterations)
                .with_test_subdiv_level(test_level)
                .with_angle_limit(angle_limit)
                .with_curvature_type(curvature.into())
                .with_penalty(penalty.into())
                .with_parallel(!sequential);
            cmd_refine(&input, &output, &options, subdivide, &scheme)?;
        }

        Commands::Fit { input, edge, scheme } => {
            cmd_fit(&input, edge, &scheme)?;
        }
    }

    Ok(())
}

/// Create a progress reporter that displays a progress bar on the terminal.
fn create_progress() -> Progress {
    // Highest percent drawn so far; the bar never moves backwards.
    let max_percent = Arc::new(AtomicUsize::new(0));

    Progress::new(move |current, total, message| {
        if total == 0 {
            return;
        }

        let raw_percent = if current >= total {
            100
        } else {
            ((current * 100) + (total / 2)) / total
        };

        let previous = max_percent.fetch_max(raw_percent, Ordering::Relaxed);
        if raw_percent <= previous && raw_percent != 100 {
            return;
        }
        let percent = raw_percent.max(previous);

        let bar_width = 30;
        let filled = (percent * bar_width) / 100;
        eprint!(
            "\r[{}{}] {:3}% {}",
            "=".repeat(filled),
            " ".repeat(bar_width - filled),
            percent,
            message
        );
        let _ = std::io::stderr().flush();

        if current >= total {
            eprintln!();
        }
    })
}

fn describe(curve: &Curve) -> String {
    format!(
        "{} vertices, {}",
        curve.len(),
        if curve.is_closed() { "closed" } else { "open" }
    )
}

fn cmd_info(input: &PathBuf, curvature: CurvatureArg) -> Result<(), Box<dyn std::error::Error>> {
    let curve = text::load(input)?;

    println!("File: {}", input.display());
    println!("Vertices: {}", curve.len());
    println!("Topology: {}", if curve.is_closed() { "Closed" } else { "Open" });
    println!(
        "Custom normals: {}",
        curve.custom_normals().iter().filter(|&&c| c).count()
    );

    if curve.is_empty() {
        return Ok(());
    }

    let length: f64 = (0..curve.num_edges())
        .map(|i| (curve.vertex(curve.next_index(i)) - curve.vertex(i)).norm())
        .sum();
    println!("Length: {:.6}", length);

    let (min, max) = curve.vertices().iter().fold(
        (curve.vertex(0), curve.vertex(0)),
        |(lo, hi), p| (lo.inf(p), hi.sup(p)),
    );
    println!(
        "Bounding box: ({:.3}, {:.3}) to ({:.3}, {:.3})",
        min.x, min.y, max.x, max.y
    );

    let mut subdivider = ConicSubdivider::default();
    subdivider.get_infl_point_curve(&curve);
    println!("Inflection edges: {}", subdivider.inflection_points().len());

    let profile = curvature_profile(&curve, curvature.into(), true);
    let interior: Vec<f64> = (0..curve.len())
        .filter(|&i| curve.is_interior(i))
        .map(|i| profile[i])
        .collect();
    if !interior.is_empty() {
        let k_min = interior.iter().cloned().fold(f64::INFINITY, f64::min);
        let k_max = interior.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let k_avg = interior.iter().sum::<f64>() / interior.len() as f64;
        println!("\nCurvature:");
        println!("  min={:.4}, max={:.4}, avg={:.4}", k_min, k_max, k_avg);
    }

    Ok(())
}

fn cmd_subdivide(
    input: &PathBuf,
    output: &PathBuf,
    level: usize,
    scheme: &SchemeArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let settings = scheme.settings()?;
    let mut curve = text::load(input)?;
    println!("Loaded: {}", describe(&curve));

    let mut subdivider = ConicSubdivider::new(settings);
    subdivider.estimate_normals(&mut curve);
    let progress = create_progress();

    println!("Applying conic subdivision ({} levels)...", level);
    let start = Instant::now();
    subdivider.subdivide_with_progress(&mut curve, level, &progress);
    let elapsed = start.elapsed();

    println!(
        "Result: {} ({} inflection points)",
        describe(&curve),
        subdivider.inflection_points().len()
    );
    text::save(&curve, output)?;
    println!("Saved: {} ({:.2?})", output.display(), elapsed);

    Ok(())
}

fn cmd_refine(
    input: &PathBuf,
    output: &PathBuf,
    options: &RefineOptions,
    subdivide: Option<usize>,
    scheme: &SchemeArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let settings = scheme.settings()?;
    options.validate()?;
    let mut curve = text::load(input)?;
    println!("Loaded: {}", describe(&curve));

    let mut subdivider = ConicSubdivider::new(settings);
    subdivider.estimate_normals(&mut curve);
    if settings.convexity_split {
        curve = subdivider.get_infl_point_curve(&curve);
    }
    let inflections = subdivider.inflection_points().clone();

    let refiner = NormalRefiner::new(settings, *options).with_inflection_points(inflections.clone());
    let mode = if options.parallel { "parallel" } else { "sequential" };
    println!(
        "Refining normals ({} iterations, test level {}, {})...",
        options.max_iterations, options.test_subdiv_level, mode
    );

    let start = Instant::now();
    refiner.refine_with_progress(&mut curve, &create_progress(), &CancelToken::new())?;

    if let Some(level) = subdivide {
        let mut subdivider = ConicSubdivider::new(settings.with_convexity_split(false))
            .with_inflection_points(inflections);
        subdivider.subdivide(&mut curve, level);
    }
    let elapsed = start.elapsed();

    println!("Result: {}", describe(&curve));
    text::save(&curve, output)?;
    println!("Saved: {} ({:.2?})", output.display(), elapsed);

    Ok(())
}

fn cmd_fit(input: &PathBuf, edge: usize, scheme: &SchemeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let settings = scheme.settings()?;
    let mut curve = text::load(input)?;
    if edge >= curve.num_edges() {
        return Err(CurveError::InvalidIndex {
            index: edge,
            len: curve.num_edges(),
        }
        .into());
    }

    let mut subdivider = ConicSubdivider::new(settings);
    subdivider.estimate_normals(&mut curve);

    let patch = subdivider.extract_patch(&curve, edge, settings.patch_size);
    let mut fitter = ConicFitter::new(settings.epsilon);
    let conic = fitter.fit_conic(&patch);

    println!("Edge {} -> {}: {} patch points", edge, curve.next_index(edge), patch.len());
    if !conic.is_valid() {
        println!("Fit failed");
        return Ok(());
    }

    let [a, b, c, d, e, f] = conic.coefficients();
    println!(
        "Conic: {:.6}x² + {:.6}y² + {:.6}xy + {:.6}x + {:.6}y + {:.6} = 0",
        a, b, c, d, e, f
    );
    println!("Kind: {:?}", conic.kind());
    println!("Stability: {:.3e}", fitter.stability());

    let next = curve.next_index(edge);
    let (left, right) = (curve.vertex(edge), curve.vertex(next));
    let reference = curve.normal(edge) + curve.normal(next);
    let direction = orient(perp(&(right - left)), &reference).normalize();
    match conic.sample_with(&nalgebra::center(&left, &right), &direction, settings.root_selection) {
        Some((point, normal)) => println!(
            "Edge point: ({:.6}, {:.6}), normal ({:.6}, {:.6})",
            point.x,
            point.y,
            normal.x,
            normal.y
        ),
        None => println!("Edge point: none (midpoint fallback)"),
    }

    Ok(())
}
