// src/main.rs
//! dmm-bench CLI
//! Sweeps matrix multiplication strategies and writes JSON reports

use clap::{Arg, ArgMatches, Command};
use std::path::Path;

use dmm_bench::config::BenchConfig;
use dmm_bench::report;
use dmm_bench::strategy::{self, RunStatus, Strategy};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = cli().get_matches();

    match matches.subcommand() {
        Some(("run", sub_matches)) => {
            cmd_run(sub_matches)?;
        }
        Some(("config-gen", sub_matches)) => {
            cmd_config_gen(sub_matches)?;
        }
        Some(("list", _)) => {
            cmd_list();
        }
        _ => {
            println!("dmm-bench v0.1");
            println!("Use --help for available commands");
        }
    }

    Ok(())
}

fn cli() -> Command {
    Command::new("dmm-bench")
        .version("0.1.0")
        .about("Matrix multiplication strategy benchmark")
        .subcommand(
            Command::new("run")
                .about("Run the configured strategy sweep")
                .arg(
                    Arg::new("config")
                        .short('c')
                        .long("config")
                        .value_name("FILE")
                        .help("Configuration file")
                        .default_value("config/dmm.toml"),
                )
                .arg(
                    Arg::new("strategy")
                        .short('s')
                        .long("strategy")
                        .value_name("NAME")
                        .help("Run only this strategy (repeatable)")
                        .action(clap::ArgAction::Append),
                ),
        )
        .subcommand(
            Command::new("config-gen")
                .about("Generate default configuration file")
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("FILE")
                        .help("Output file path")
                        .default_value("config/dmm.toml"),
                ),
        )
        .subcommand(Command::new("list").about("List known strategy names"))
}

fn cmd_run(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = matches.get_one::<String>("config").unwrap();

    let config = if Path::new(config_path).exists() {
        BenchConfig::from_file(config_path)?
    } else {
        println!("Configuration file not found, using defaults");
        BenchConfig::default_sweep()
    };

    let strategies: Vec<String> = match matches.get_many::<String>("strategy") {
        Some(values) => values.cloned().collect(),
        None => config.strategies.clone(),
    };

    report::ensure_dir(&config.output_dir)?;

    let mut results = Vec::new();
    for case in &config.cases {
        for name in &strategies {
            let result = strategy::run_case(name, case, &config);

            match result.status {
                RunStatus::Ok => println!(
                    "[OK] {} {}x{}·{}x{}  t={:.3}s  chk={:.3}",
                    result.strategy,
                    result.m,
                    result.n,
                    result.n,
                    result.p,
                    result.elapsed_sec,
                    result.checksum.unwrap_or(f64::NAN),
                ),
                RunStatus::Skipped => println!(
                    "[SKIP] {} {}x{}·{}x{}  {}",
                    result.strategy, result.m, result.n, result.n, result.p, result.notes
                ),
                _ => println!(
                    "[FAIL] {} {}x{}·{}x{}  {}",
                    result.strategy, result.m, result.n, result.n, result.p, result.notes
                ),
            }

            results.push(result);
        }
    }

    let report_path = report::save_json(&config.output_dir, &config, &results)?;
    println!("✓ Report saved to {}", report_path.display());

    Ok(())
}

fn cmd_config_gen(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let output_path = matches.get_one::<String>("output").unwrap();

    println!("Generating default configuration: {}", output_path);

    let config = BenchConfig::default_sweep();

    if let Some(parent) = Path::new(output_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    config.save_to_file(output_path)?;

    println!("✓ Configuration saved to {}", output_path);
    println!("  Use 'dmm-bench run -c {}' to start a sweep", output_path);

    Ok(())
}

fn cmd_list() {
    println!("Known strategies:");
    for strategy in Strategy::all() {
        println!("  {}", strategy.name());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_builds() {
        let _app = cli();
    }
}
