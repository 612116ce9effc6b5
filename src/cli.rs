use std::env;
use std::path::PathBuf;

#[derive(Debug, Default)]
pub struct CliOptions {
    pub config: Option<PathBuf>,
    pub preset: Option<String>,
    pub cycles: Option<usize>,
    pub seed: Option<u64>,
    pub telemetry_out: Option<PathBuf>,
    pub help: bool,
}

pub fn parse_args() -> Result<CliOptions, String> {
    let args: Vec<String> = env::args().skip(1).collect();
    parse_options(&args)
}

fn parse_options(args: &[String]) -> Result<CliOptions, String> {
    let mut i = 0usize;
    let mut opts = CliOptions::default();

    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --config (expected a TOML file path)")?;
                if opts.config.replace(PathBuf::from(path)).is_some() {
                    return Err("--config provided more than once".to_string());
                }
            }
            "--preset" => {
                i += 1;
                let name = args.next_or_err(i, "missing value for --preset (expected a preset name)")?;
                if opts.preset.replace(name.to_string()).is_some() {
                    return Err("--preset provided more than once".to_string());
                }
            }
            "--cycles" => {
                i += 1;
                let value = args.next_or_err(i, "missing value for --cycles (expected a count)")?;
                let cycles = value
                    .parse::<usize>()
                    .map_err(|_| format!("--cycles value \"{value}\" is not a valid count"))?;
                opts.cycles = Some(cycles);
            }
            "--seed" => {
                i += 1;
                let value = args.next_or_err(i, "missing value for --seed (expected a u64)")?;
                let seed = value
                    .parse::<u64>()
                    .map_err(|_| format!("--seed value \"{value}\" is not a valid u64"))?;
                opts.seed = Some(seed);
            }
            "--telemetry-out" => {
                i += 1;
                let path = args.next_or_err(
                    i,
                    "missing value for --telemetry-out (expected a file path)",
                )?;
                if opts.telemetry_out.replace(PathBuf::from(path)).is_some() {
                    return Err("--telemetry-out provided more than once".to_string());
                }
            }
            "--help" | "-h" => opts.help = true,
            other => return Err(format!("unknown argument: {other}")),
        }
        i += 1;
    }

    if opts.config.is_some() && opts.preset.is_some() {
        return Err(
            "arguments `--config` and `--preset` are mutually exclusive; choose one source"
                .to_string(),
        );
    }

    Ok(opts)
}

trait SliceArgExt {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String>;
}

impl SliceArgExt for [String] {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String> {
        self.get(index)
            .map(String::as_str)
            .ok_or_else(|| err.to_string())
    }
}

pub fn print_usage() {
    eprintln!("supply-bus-switch: simulate the supply bus switch controller on a site");
    eprintln!();
    eprintln!("Usage: supply-bus-switch [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <path>          Load the site from a TOML config file");
    eprintln!("  --preset <name>          Use a built-in site (sambia, two_ess, islanded)");
    eprintln!("  --cycles <n>             Override the number of controller cycles");
    eprintln!("  --seed <u64>             Override the random seed");
    eprintln!("  --telemetry-out <path>   Export cycle records to CSV");
    eprintln!("  --help                   Show this help message");
    eprintln!();
    eprintln!("If neither --config nor --preset is given, the sambia preset is used.");
    eprintln!("Log verbosity follows RUST_LOG (default: info).");
}
