use crate::agents::OutputTarget;
use crate::cli::{Cli, Commands, RegistryArgs};
use crate::pipeline::PipelineOptions;
use crate::registry::npm::DEFAULT_REGISTRY;
use std::path::PathBuf;

pub const DEFAULT_BUFFER_DAYS: u32 = 7;

/// Settings for one invocation, resolved from flags and their env fallbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub project_path: PathBuf,
    pub buffer_days: u32,
    pub registry_url: String,
    pub filter: Option<String>,
    /// Select every safe update and decline flagged packages without prompting.
    pub assume_yes: bool,
    pub reinstall: bool,
    pub verify: bool,
    pub json: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            project_path: PathBuf::from("."),
            buffer_days: DEFAULT_BUFFER_DAYS,
            registry_url: DEFAULT_REGISTRY.to_string(),
            filter: None,
            assume_yes: false,
            reinstall: true,
            verify: true,
            json: false,
        }
    }
}

impl RunConfig {
    pub fn from_cli(cli: &Cli) -> Self {
        let base = Self {
            project_path: PathBuf::from(&cli.path),
            ..Self::default()
        };

        match &cli.command {
            Commands::Update {
                registry,
                yes,
                skip_reinstall,
                skip_checks,
                json,
            } => Self {
                assume_yes: *yes,
                reinstall: !skip_reinstall,
                verify: !skip_checks,
                json: *json,
                ..base.with_registry(registry)
            },
            Commands::Check { registry, json } => Self {
                json: *json,
                ..base.with_registry(registry)
            },
            Commands::List => base,
        }
    }

    fn with_registry(self, args: &RegistryArgs) -> Self {
        Self {
            buffer_days: args.buffer_days,
            registry_url: args.registry.clone(),
            filter: args.filter.clone(),
            ..self
        }
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            reinstall: self.reinstall,
            verify: self.verify,
            show_progress: !self.json,
            quiet: self.json,
        }
    }

    /// Stream for prompts and package-manager output. JSON runs reserve stdout
    /// for the report.
    pub fn tool_output(&self) -> OutputTarget {
        if self.json {
            OutputTarget::Stderr
        } else {
            OutputTarget::Stdout
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn update_flags_map_to_pipeline_options() {
        let cli = Cli::try_parse_from([
            "safe-update",
            "--path",
            "web",
            "update",
            "--yes",
            "--skip-checks",
            "--buffer-days",
            "14",
            "--filter",
            "eslint*",
        ])
        .unwrap();
        let config = RunConfig::from_cli(&cli);

        assert_eq!(config.project_path, PathBuf::from("web"));
        assert_eq!(config.buffer_days, 14);
        assert_eq!(config.filter.as_deref(), Some("eslint*"));
        assert!(config.assume_yes);

        let options = config.pipeline_options();
        assert!(options.reinstall);
        assert!(!options.verify);
        assert!(!options.quiet);
        assert_eq!(config.tool_output(), OutputTarget::Stdout);
    }

    #[test]
    fn json_output_silences_progress() {
        let cli = Cli::try_parse_from(["safe-update", "check", "--json"]).unwrap();
        let config = RunConfig::from_cli(&cli);
        assert!(config.json);
        let options = config.pipeline_options();
        assert!(options.quiet);
        assert!(!options.show_progress);
    }

    #[test]
    fn json_update_sends_tool_output_to_stderr() {
        let cli = Cli::try_parse_from(["safe-update", "update", "--yes", "--json"]).unwrap();
        let config = RunConfig::from_cli(&cli);
        assert!(config.json);
        assert_eq!(config.tool_output(), OutputTarget::Stderr);
        assert!(config.pipeline_options().quiet);
    }

    #[test]
    fn list_uses_defaults() {
        let cli = Cli::try_parse_from(["safe-update", "list"]).unwrap();
        let config = RunConfig::from_cli(&cli);
        assert_eq!(config.registry_url, DEFAULT_REGISTRY);
        assert!(!config.assume_yes);
    }
}
