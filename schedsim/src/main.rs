//! # Scheduling Simulator
//!
//! Command-line entry point: runs a scenario file and prints the report.

use schedsim::{Simulation, SimulationConfig};
use services_logger::LogLevel;
use std::env;
use std::process;

/// Parsed command line
struct CliOptions {
    config_path: String,
    quantum: Option<i64>,
    max_ticks: Option<u64>,
    log_level: Option<LogLevel>,
    json: bool,
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("schedsim");

    let options = parse_args(&args).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        print_usage(program);
        process::exit(1);
    });

    let mut config = SimulationConfig::load(&options.config_path).unwrap_or_else(|e| {
        eprintln!("Failed to load scenario: {}", e);
        process::exit(1);
    });
    if let Some(level) = options.log_level {
        config.log_level = level;
    }

    let mut simulation = Simulation::new(config).unwrap_or_else(|e| {
        eprintln!("Failed to create simulation: {}", e);
        process::exit(1);
    });
    if let Some(quantum) = options.quantum {
        simulation.set_quantum(quantum);
    }
    if let Some(max_ticks) = options.max_ticks {
        simulation.set_max_ticks(max_ticks);
    }

    let report = simulation.run_with(|tick| {
        for entry in &tick.logs {
            eprintln!("{}", entry);
        }
        for line in &tick.output {
            println!("{}", line);
        }
    });

    if options.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Failed to encode report: {}", e);
                process::exit(1);
            }
        }
    } else {
        print!("{}", report);
    }
}

fn parse_args(args: &[String]) -> Result<CliOptions, String> {
    let mut config_path = None;
    let mut options = CliOptions {
        config_path: String::new(),
        quantum: None,
        max_ticks: None,
        log_level: None,
        json: false,
    };
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --config".to_string());
                }
                config_path = Some(args[i].clone());
            }
            "--quantum" | "-q" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --quantum".to_string());
                }
                options.quantum = Some(
                    args[i]
                        .parse()
                        .map_err(|_| format!("Invalid quantum value: {}", args[i]))?,
                );
            }
            "--max-ticks" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --max-ticks".to_string());
                }
                options.max_ticks = Some(
                    args[i]
                        .parse()
                        .map_err(|_| format!("Invalid max-ticks value: {}", args[i]))?,
                );
            }
            "--log-level" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --log-level".to_string());
                }
                options.log_level = Some(match args[i].to_ascii_lowercase().as_str() {
                    "debug" => LogLevel::Debug,
                    "info" => LogLevel::Info,
                    "warn" => LogLevel::Warn,
                    "error" => LogLevel::Error,
                    other => return Err(format!("Invalid log level: {}", other)),
                });
            }
            "--json" => {
                options.json = true;
            }
            "--help" | "-h" => {
                print_usage(args.first().map(String::as_str).unwrap_or("schedsim"));
                process::exit(0);
            }
            other => {
                return Err(format!("Unknown option: {}", other));
            }
        }
        i += 1;
    }

    options.config_path = config_path.ok_or_else(|| "Missing --config".to_string())?;
    Ok(options)
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} --config <FILE> [OPTIONS]", program);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -c, --config <FILE>      Scenario file (JSON)");
    eprintln!("  -q, --quantum <N>        Realtime quantum in ticks (minimum 1)");
    eprintln!("  --max-ticks <N>          Stop after N ticks");
    eprintln!("  --log-level <LEVEL>      debug, info, warn or error");
    eprintln!("  --json                   Print the final report as JSON");
    eprintln!("  -h, --help               Show this help message");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  {} --config demos/mixed.json", program);
    eprintln!("  {} -c demos/interactive.json --quantum 3 --json", program);
}
