//! keel CLI - a self-hosting C/C++ build driver

use anyhow::{Context, Result};
use clap::Parser;
use tracing::Level;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};
use keel::builder::BuildContext;
use keel::util::config::{load_config_for, Config};

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    // Parse CLI
    let cli = Cli::parse();

    if let Commands::Completions(args) = &cli.command {
        commands::completions::execute(args)?;
        return Ok(0);
    }

    let cwd = std::env::current_dir().context("failed to read the current directory")?;

    // Config warnings are printed before the configured filter exists
    let early = tracing_subscriber::fmt()
        .with_max_level(Level::WARN)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    let config = tracing::subscriber::with_default(early, || load_config_for(&cwd));

    init_logging(&cli, &config);

    let ctx = BuildContext::from_config(&config, cli.flags.clone())?.with_working_dir(&cwd);
    tracing::debug!("{:?}", ctx);

    if !ctx.flags.no_init_script {
        if let Some(script) = &config.driver.init_script {
            let code = commands::run_init_script(&ctx, script)?;
            if code != 0 {
                return Ok(code);
            }
        }
    }

    // Execute command
    match cli.command {
        Commands::Build(args) => commands::build::execute(&ctx, args),
        Commands::Driver(args) => commands::driver::execute(&ctx, &config, args),
        Commands::Run(args) => commands::run::execute(&ctx, &config, args),
        Commands::Toolchain => commands::toolchain::execute(&ctx),
        Commands::Clean(args) => commands::clean::execute(&ctx, args),
        Commands::Completions(_) => Ok(0),
    }
}

fn init_logging(cli: &Cli, config: &Config) {
    let filter = if cli.flags.verbose {
        EnvFilter::new("keel=debug")
    } else {
        EnvFilter::try_from_env("KEEL_LOG")
            .unwrap_or_else(|_| EnvFilter::new(format!("keel={}", config.log.level())))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}
