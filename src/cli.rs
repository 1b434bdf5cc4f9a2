use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "safe-update",
    about = "Safe Update - review and apply npm dependency updates that have aged past a safety buffer",
    version,
    author
)]
pub struct Cli {
    /// Path to the project directory (defaults to current directory)
    #[arg(short, long, default_value = ".", global = true)]
    pub path: String,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command that consults the registry.
#[derive(Args, Debug, Clone)]
pub struct RegistryArgs {
    /// Only consider versions published at least this many days ago
    #[arg(
        short,
        long = "buffer-days",
        value_name = "DAYS",
        default_value_t = 7,
        env = "SAFE_UPDATE_BUFFER_DAYS"
    )]
    pub buffer_days: u32,

    /// npm registry base URL
    #[arg(
        long,
        value_name = "URL",
        default_value = crate::registry::npm::DEFAULT_REGISTRY,
        env = "NPM_CONFIG_REGISTRY"
    )]
    pub registry: String,

    /// Filter dependencies by name using glob syntax (e.g. "*eslint*")
    #[arg(long, value_name = "GLOB")]
    pub filter: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Select, install and verify safe dependency updates
    Update {
        #[command(flatten)]
        registry: RegistryArgs,

        /// Accept every safe update without prompting; flagged packages are declined
        #[arg(short, long)]
        yes: bool,

        /// Don't remove node_modules and reinstall after updating
        #[arg(long)]
        skip_reinstall: bool,

        /// Don't run lint, typecheck, test and build scripts after updating
        #[arg(long)]
        skip_checks: bool,

        /// Print the run result as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Show which updates pass the safety buffer without applying them
    Check {
        #[command(flatten)]
        registry: RegistryArgs,

        /// Print the grouped updates as JSON
        #[arg(long)]
        json: bool,
    },

    /// List all dependencies declared in package.json
    List,
}
