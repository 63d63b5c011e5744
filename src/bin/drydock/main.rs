//! Drydock CLI - build, sign and ship native Android apps

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use drydock::ops::ResolutionError;
use drydock::util::GlobalContext;

mod cli;
mod commands;
mod progress;

use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();
    let color = !cli.no_color;

    if let Err(e) = run(cli) {
        if let Some(resolution) = e.downcast_ref::<ResolutionError>() {
            eprintln!("{:?}", miette::Report::new(resolution.clone()));
        } else if color {
            eprintln!("\x1b[1;31merror\x1b[0m: {:#}", e);
        } else {
            eprintln!("error: {:#}", e);
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("drydock=debug")
    } else {
        EnvFilter::new("drydock=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let mut ctx = GlobalContext::new()?;
    ctx.set_verbose(cli.verbose);
    ctx.set_color(!cli.no_color);

    // Execute command
    match cli.command {
        Commands::Init(args) => commands::init::execute(args, &ctx),
        Commands::Build(args) => commands::build::execute(args, &ctx, false),
        Commands::Deploy(args) => commands::build::execute(args, &ctx, true),
        Commands::Resolve(args) => commands::resolve::execute(args, &ctx),
        Commands::Toolchain(args) => commands::toolchain::execute(args, &ctx),
        Commands::Clean(args) => commands::clean::execute(args, &ctx),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
