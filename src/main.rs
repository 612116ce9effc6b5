//! Simulator entry point: CLI wiring and config-driven engine construction.

mod cli;

use std::path::Path;
use std::process;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use supply_bus_switch::config::SiteConfig;
use supply_bus_switch::io::export::export_csv;
use supply_bus_switch::sim::{Engine, RunSummary};

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let opts = match cli::parse_args() {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("error: {e}");
            cli::print_usage();
            process::exit(1);
        }
    };
    if opts.help {
        cli::print_usage();
        return;
    }

    // --config takes priority, then --preset, then the sambia default
    let loaded = if let Some(ref path) = opts.config {
        SiteConfig::from_toml_file(path)
    } else {
        SiteConfig::from_preset(opts.preset.as_deref().unwrap_or("sambia"))
    };
    let mut site = match loaded {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };

    if let Some(cycles) = opts.cycles {
        site.simulation.cycles = cycles;
    }
    if let Some(seed) = opts.seed {
        site.simulation.seed = seed;
    }

    let errors = site.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }

    let mut engine = match Engine::new(&site) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };
    let records = engine.run();

    for r in &records {
        println!("{r}");
    }
    println!("\n{}", RunSummary::from_records(&records));

    if let Some(ref path) = opts.telemetry_out {
        if let Err(e) = export_csv(&records, Path::new(path)) {
            eprintln!("error: failed to write CSV: {e}");
            process::exit(1);
        }
        eprintln!("Telemetry written to {}", path.display());
    }
}
