use anyhow::Context;
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use slice_registration::config::{Config, ConfigFormat};
use slice_registration::logging::{self, init_logging, LoggingConfig};
use slice_registration::slice::to_gray_image;
use slice_registration::visualization::print_summary;
use slice_registration::*;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "register")]
#[command(about = "Rigid-plus-scale registration of 2-D slices by simulated annealing")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Misalign a slice by a known transform and recover it
    Run {
        /// Fixed slice (.nii, .nii.gz or any 2-D image); a synthetic phantom is used if omitted
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Random seed for noise and the annealing chain
        #[arg(long)]
        seed: Option<u64>,

        /// Number of annealing iterations
        #[arg(short = 'n', long)]
        iterations: Option<usize>,

        /// Initial temperature
        #[arg(short, long)]
        temperature: Option<f64>,

        /// Geometric cooling rate
        #[arg(long)]
        cooling_rate: Option<f64>,

        /// True rotation, degrees
        #[arg(long, allow_hyphen_values = true)]
        angle: Option<f64>,

        /// True scale
        #[arg(long)]
        scale: Option<f64>,

        /// True row offset, pixels
        #[arg(long, allow_hyphen_values = true)]
        tx: Option<f64>,

        /// True column offset, pixels
        #[arg(long, allow_hyphen_values = true)]
        ty: Option<f64>,

        /// Standard deviation of Gaussian noise added to the moving slice
        #[arg(long)]
        noise_sigma: Option<f64>,

        /// Directory for fixed/moving/aligned PNG previews
        #[arg(long)]
        preview_dir: Option<PathBuf>,
    },

    /// Print the similarity of two same-shaped slices
    Score {
        #[arg(short, long)]
        fixed: PathBuf,

        #[arg(short, long)]
        moving: PathBuf,
    },

    /// Write the default configuration to a file
    Config {
        #[arg(short, long)]
        output: PathBuf,

        /// toml or json
        #[arg(short, long, default_value = "toml")]
        format: ConfigFormat,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(ref path) => Config::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    config.logging = if cli.quiet {
        LoggingConfig {
            log_directory: config.logging.log_directory.clone(),
            ..LoggingConfig::quiet()
        }
    } else {
        config.logging.clone().with_verbosity(cli.verbose)
    };

    let _guard = init_logging(&config.logging)?;
    logging::new_correlation_id();

    match cli.command {
        Commands::Run {
            input,
            seed,
            iterations,
            temperature,
            cooling_rate,
            angle,
            scale,
            tx,
            ty,
            noise_sigma,
            preview_dir,
        } => {
            let scenario = &mut config.scenario;
            scenario.seed = seed.unwrap_or(scenario.seed);
            scenario.angle_degrees = angle.unwrap_or(scenario.angle_degrees);
            scenario.scale = scale.unwrap_or(scenario.scale);
            scenario.tx = tx.unwrap_or(scenario.tx);
            scenario.ty = ty.unwrap_or(scenario.ty);
            scenario.noise_sigma = noise_sigma.unwrap_or(scenario.noise_sigma);

            let annealing = &mut config.annealing;
            annealing.max_iterations = iterations.unwrap_or(annealing.max_iterations);
            annealing.initial_temperature = temperature.unwrap_or(annealing.initial_temperature);
            annealing.cooling_rate = cooling_rate.unwrap_or(annealing.cooling_rate);

            handle_run(&config, input.as_deref(), preview_dir.as_deref())?;
        }
        Commands::Score { fixed, moving } => {
            handle_score(&config, &fixed, &moving)?;
        }
        Commands::Config { output, format } => {
            Config::default().save_to_file(&output, format)?;
            println!("Default configuration written to {}", output.display());
        }
    }

    Ok(())
}

fn handle_run(
    config: &Config,
    input: Option<&Path>,
    preview_dir: Option<&Path>,
) -> anyhow::Result<()> {
    if let Err(errors) = config.validate() {
        anyhow::bail!("Invalid configuration:\n  - {}", errors.join("\n  - "));
    }

    let fixed = match input {
        Some(path) => load_slice(path)
            .with_context(|| format!("Failed to load fixed slice from {}", path.display()))?,
        None => {
            let (rows, cols) = config.scenario.phantom_size;
            tracing::info!(rows = rows, cols = cols, "No input given, using synthetic phantom");
            synthetic_phantom(rows, cols)?
        }
    };
    validate_image_size(&fixed, 8)?;

    let true_params = config.scenario.true_params();
    let expected = inverse(&true_params)?;
    let mut rng = StdRng::seed_from_u64(config.scenario.seed);

    let mut moving = warp(&fixed, &true_params)?;
    if config.scenario.noise_sigma > 0.0 {
        let noise = Normal::new(0.0, config.scenario.noise_sigma)?;
        moving.mapv_inplace(|v| v + noise.sample(&mut rng));
    }

    println!(
        "Fixed: {}x{}, true transform: angle={:.2}°, scale={:.3}, tx={:.2}, ty={:.2}",
        fixed.nrows(),
        fixed.ncols(),
        true_params.angle_degrees(),
        true_params.scale,
        true_params.tx,
        true_params.ty
    );

    let metric = config.similarity.metric()?;
    let result = optimize(
        &fixed,
        &moving,
        TransformParams::identity(),
        &config.annealing,
        &metric,
        &mut rng,
        &mut TracingProgress,
    )?;

    print_summary(Some(&expected), &result);

    if let Some(dir) = preview_dir {
        std::fs::create_dir_all(dir)?;
        let aligned = warp(&moving, &result.best_params)?;
        for (name, image) in [("fixed", &fixed), ("moving", &moving), ("aligned", &aligned)] {
            let path = dir.join(format!("{}.png", name));
            to_gray_image(image)
                .save(&path)
                .with_context(|| format!("Failed to write preview {}", path.display()))?;
        }
        println!("Previews saved to {}", dir.display());
    }

    Ok(())
}

fn handle_score(config: &Config, fixed_path: &Path, moving_path: &Path) -> anyhow::Result<()> {
    let fixed = load_slice(fixed_path)
        .with_context(|| format!("Failed to load {}", fixed_path.display()))?;
    let moving = load_slice(moving_path)
        .with_context(|| format!("Failed to load {}", moving_path.display()))?;

    let metric = config.similarity.metric()?;
    let value = metric.score(&fixed, &moving)?;
    println!("{}: {:.6}", metric.name(), value);

    Ok(())
}
