use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use pmt_electronics::config::RunConfig;
use pmt_electronics::data_io;
use pmt_electronics::pipeline::Simulation;

/// Simulate PMT front-end electronics: pulse synthesis, dark-current background and digitization
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file (created with defaults if missing)
    #[arg(short, long, value_name = "FILE", default_value = "electronics.yaml")]
    config: PathBuf,

    /// Directory that relative input paths are resolved against
    #[arg(long, value_name = "DIR")]
    input_dir: Option<PathBuf>,

    /// Hit list file
    #[arg(long, value_name = "FILE")]
    hits: Option<PathBuf>,

    /// Output file for the ADC counts (numbered per event when --events > 1)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Master random seed
    #[arg(short, long)]
    seed: Option<u64>,

    /// Number of events to simulate from the same hit list
    #[arg(short = 'n', long)]
    events: Option<usize>,

    /// Mean anode current
    #[arg(long)]
    mean_current: Option<f64>,

    /// Print the effective configuration as YAML and exit
    #[arg(long)]
    print_config: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = RunConfig::from_file(&args.config)?;
    config.apply_args(
        args.input_dir,
        args.hits,
        args.output,
        args.seed,
        args.events,
        args.mean_current,
    );
    config.validate()?;

    if args.print_config {
        print!("{}", serde_yml::to_string(&config)?);
        return Ok(());
    }

    let paths = config.resolved_inputs();
    let (params, hits) = data_io::load_inputs(&paths, &config.electronics, config.run.mean_current)
        .context("Failed to load simulation inputs")?;
    let sim = Simulation::new(config.electronics.clone(), params, hits)
        .context("Inconsistent simulation inputs")?;

    let seed = config.run.seed.unwrap_or_else(|| rand::rng().random());
    log::info!("Master seed {}", seed);
    let mut rng = StdRng::seed_from_u64(seed);

    let events = config.run.events;
    for index in 0..events {
        let event = sim
            .run_event(&mut rng)
            .with_context(|| format!("Event {index} failed"))?;
        let path = data_io::event_output_path(&config.run.output, index, events);
        data_io::save_matrix(&event.matrix, &path)?;
    }

    println!(
        "Simulated {} event(s): {} channels x {} bins, seed {}",
        events, config.electronics.n_chan, config.electronics.bin_2_gen, seed
    );
    Ok(())
}
