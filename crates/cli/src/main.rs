// FILE: crates/cli/src/main.rs

use anyhow::Result;
use clap::{value_parser, Arg, ArgMatches, Command};
use std::path::PathBuf;
use std::time::Duration;
use storystream_config::{Config, ConfigManager};

mod book;
mod commands;
mod simulator;

fn book_arg() -> Arg {
    Arg::new("book")
        .short('b')
        .long("book")
        .value_name("FILE")
        .help("Book description (TOML)")
        .value_parser(value_parser!(PathBuf))
        .required(true)
}

fn build_cli() -> Command {
    Command::new("storystream")
        .version("0.1.0")
        .author("StoryStream Team")
        .about("Audiobook playback position and chapter engine")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .help("Config file (defaults to the platform config directory)")
                .value_parser(value_parser!(PathBuf))
                .global(true),
        )
        .subcommand(
            Command::new("locate")
                .about("Show the chapter and track at a book position")
                .arg(book_arg())
                .arg(
                    Arg::new("position")
                        .short('p')
                        .long("position")
                        .value_name("MS")
                        .help("Book-absolute position in milliseconds")
                        .value_parser(value_parser!(i64))
                        .allow_negative_numbers(true)
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("simulate")
                .about("Play a book against a simulated engine and report chapter changes")
                .arg(book_arg())
                .arg(
                    Arg::new("seconds")
                        .short('s')
                        .long("seconds")
                        .value_name("N")
                        .help("Simulated seconds of playback")
                        .value_parser(value_parser!(u64))
                        .default_value("30"),
                )
                .arg(
                    Arg::new("start")
                        .long("start")
                        .value_name("MS")
                        .help("Book-absolute start position")
                        .value_parser(value_parser!(i64)),
                )
                .arg(
                    Arg::new("speed")
                        .long("speed")
                        .value_name("X")
                        .help("Playback speed (0.5 - 3.0)")
                        .value_parser(value_parser!(f32)),
                )
                .arg(
                    Arg::new("tick-ms")
                        .long("tick-ms")
                        .value_name("MS")
                        .help("Wall-clock milliseconds per simulated second")
                        .value_parser(value_parser!(u64))
                        .default_value("1000"),
                )
                .arg(
                    Arg::new("flaky")
                        .long("flaky")
                        .value_name("N")
                        .help("Fail the first N stream lookups")
                        .value_parser(value_parser!(u32))
                        .default_value("0"),
                ),
        )
        .subcommand(Command::new("config").about("Print the effective configuration"))
}

fn simulate_options(matches: &ArgMatches) -> Result<commands::SimulateOptions> {
    let book_path = matches
        .get_one::<PathBuf>("book")
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("Book file is required"))?;
    let tick_ms = matches.get_one::<u64>("tick-ms").copied().unwrap_or(1_000);

    Ok(commands::SimulateOptions {
        book_path,
        seconds: matches.get_one::<u64>("seconds").copied().unwrap_or(30),
        start_ms: matches.get_one::<i64>("start").copied(),
        speed: matches.get_one::<f32>("speed").copied(),
        tick: Duration::from_millis(tick_ms.max(1)),
        resolver_failures: matches.get_one::<u32>("flaky").copied().unwrap_or(0),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_cli().get_matches();

    let manager = match matches.get_one::<PathBuf>("config") {
        Some(path) => ConfigManager::with_file(path.clone()),
        None => ConfigManager::new()?,
    };
    let (config, load_error) = match manager.load_with_env_overrides() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    let level = config.app.effective_log_level();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level.as_filter()))
        .init();
    if let Some(e) = load_error {
        log::warn!("Failed to load config: {}, using defaults", e);
    }

    match matches.subcommand() {
        Some(("locate", sub_matches)) => {
            let book = sub_matches
                .get_one::<PathBuf>("book")
                .ok_or_else(|| anyhow::anyhow!("Book file is required"))?;
            let position = sub_matches
                .get_one::<i64>("position")
                .copied()
                .ok_or_else(|| anyhow::anyhow!("Position is required"))?;
            commands::run_locate(&config, book, position)
        }
        Some(("simulate", sub_matches)) => {
            let options = simulate_options(sub_matches)?;
            commands::run_simulate(&config, &options).await
        }
        Some(("config", _)) => commands::run_show_config(&manager, &config),
        _ => {
            build_cli().print_help()?;
            Ok(())
        }
    }
}
