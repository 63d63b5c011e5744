//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

/// Drydock - build variant resolution and release pipeline for native Android apps
#[derive(Parser)]
#[command(name = "drydock")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a Drydock.toml in an existing project
    Init(InitArgs),

    /// Compile, package and sign a variant
    Build(BuildArgs),

    /// Build a variant and upload it to a release channel
    Deploy(BuildArgs),

    /// Show the resolved settings of a variant and where each came from
    Resolve(ResolveArgs),

    /// Show the native toolchain chain of a variant
    Toolchain(ResolveArgs),

    /// Remove build outputs
    Clean(CleanArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Variant selection and per-invocation properties.
#[derive(Args, Clone)]
pub struct VariantArgs {
    /// Variant to use (`debug`, `release` or a [variant.<name>] section)
    #[arg(long, default_value = "debug")]
    pub variant: String,

    /// Shorthand for `--variant release`
    #[arg(short, long, conflicts_with = "variant")]
    pub release: bool,

    /// Set a property (`key=value`), overriding every other source
    #[arg(short = 'P', long = "property", value_name = "KEY=VALUE")]
    pub properties: Vec<String>,

    /// Read `key=value` properties from a file
    #[arg(long, env = "DRYDOCK_PROPERTIES_FILE", value_name = "PATH")]
    pub properties_file: Option<PathBuf>,

    /// Debug keystore to sign debug builds with
    #[arg(long, env = "DRYDOCK_DEBUG_KEYSTORE", value_name = "PATH")]
    pub debug_keystore: Option<PathBuf>,
}

impl VariantArgs {
    pub fn variant(&self) -> String {
        if self.release {
            "release".to_string()
        } else {
            self.variant.clone()
        }
    }
}

#[derive(Args)]
pub struct BuildArgs {
    #[command(flatten)]
    pub variant: VariantArgs,

    /// Kill any stage process running longer than this many seconds
    #[arg(long, env = "DRYDOCK_STAGE_TIMEOUT", value_name = "SECS")]
    pub stage_timeout: Option<u64>,

    /// Output format
    #[arg(long, value_enum, default_value_t = MessageFormat::Human)]
    pub message_format: MessageFormat,
}

#[derive(Args)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub variant: VariantArgs,

    /// Also resolve deployment settings
    #[arg(long)]
    pub deploy: bool,
}

#[derive(Args)]
pub struct InitArgs {
    /// Project name (defaults to directory name)
    #[arg(long)]
    pub name: Option<String>,

    /// Application id (defaults to com.example.<name>)
    #[arg(long)]
    pub application_id: Option<String>,

    /// Directory to initialize (defaults to current directory)
    pub path: Option<PathBuf>,
}

#[derive(Args)]
pub struct CleanArgs {
    /// Only remove the outputs of this variant
    #[arg(long)]
    pub variant: Option<String>,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MessageFormat {
    /// Progress spinners and plain messages
    Human,
    /// One JSON event per line on stdout
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_release_shorthand() {
        let cli = Cli::parse_from(["drydock", "build", "--release", "-P", "version_code=7"]);
        let Commands::Build(args) = cli.command else {
            panic!("expected build");
        };
        assert_eq!(args.variant.variant(), "release");
        assert_eq!(args.variant.properties, vec!["version_code=7".to_string()]);
    }
}
