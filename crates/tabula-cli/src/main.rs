// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod logging;
mod runtime;

use anyhow::{Context, Result};
use config::Config;
use runtime::FetchRuntime;
use std::env;
use std::path::PathBuf;
use tabula_app::AppState;
use tabula_fetch::{Fetcher, UsersClient, UsersSource};
use tracing::info;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `tabula --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;
    let settings = config.engine_settings().with_context(|| {
        format!(
            "invalid [table] config in {}",
            options.config_path.display()
        )
    })?;

    let level = logging::parse_level(options.log_level.as_deref().unwrap_or(config.log_level()))?;
    let log_file = config.log_file()?;

    let fetcher = if options.offline || config.offline() {
        Fetcher::offline()
    } else {
        let client = UsersClient::new(config.users_url(), config.fetch_timeout()?).with_context(
            || {
                format!(
                    "invalid [fetch] config in {}; fix users_url/timeout values",
                    options.config_path.display()
                )
            },
        )?;
        Fetcher::new(UsersSource::Http(client))
    };
    if options.check_only {
        return Ok(());
    }

    logging::init_logging(level, &log_file)?;
    info!(
        config = %options.config_path.display(),
        offline = fetcher.is_offline(),
        debounce_ms = settings.debounce_delay.as_millis() as u64,
        "starting"
    );

    let mut state = AppState::new(settings);
    let mut runtime = FetchRuntime::new(fetcher);
    tabula_tui::run_app(&mut state, &mut runtime)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_example: bool,
    offline: bool,
    check_only: bool,
    log_level: Option<String>,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_example: false,
        offline: false,
        check_only: false,
        log_level: None,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--log-level" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--log-level requires a level"))?;
                options.log_level = Some(value.as_ref().to_owned());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--offline" => {
                options.offline = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow::anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("tabula: interactive tables in the terminal");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-example-config   Print a config template");
    println!("  --offline                Serve bundled users instead of the network");
    println!("  --log-level <level>      Override [log].level (trace, debug, info, warn, error)");
    println!("  --check                  Validate config and startup dependencies");
    println!("  --help                   Show this help");
}
