//! Command line options for the `argrun` binary.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::process::{CommandSpec, ControllerConfig, TerminationMode};
use crate::profile::{self, Defaults, ProfileError};

/// Run a command, watch its output live and answer its prompts.
///
/// Lines typed on the terminal are sent to the command's input. Ctrl+C stops
/// the command (interrupt first, forced kill after the grace period).
#[derive(Debug, Parser)]
#[command(name = "argrun", version)]
pub struct Cli {
    /// Run the named profile; the remaining arguments fill its placeholders
    #[arg(long, short)]
    pub profile: Option<String>,

    /// JSON file mapping profile names to profiles
    #[arg(long, default_value = "profiles.json")]
    pub profiles: PathBuf,

    /// Program used by profiles that do not set their own
    #[arg(long, default_value = "yt-dlp")]
    pub software_path: String,

    /// Folder appended as the output location for default-mode profiles
    #[arg(long)]
    pub output_folder: Option<String>,

    /// Seconds to wait after the interrupt before killing the process group
    #[arg(long, default_value_t = 5)]
    pub grace_secs: u64,

    /// Kill the process tree immediately instead of interrupting first
    #[arg(long)]
    pub force_only: bool,

    /// Disable coloured output
    #[arg(long)]
    pub no_color: bool,

    /// Program and arguments, or the profile arguments with --profile
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

impl Cli {
    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            grace_period: Duration::from_secs(self.grace_secs),
            termination: if self.force_only {
                TerminationMode::ForcedTree
            } else {
                TerminationMode::Auto
            },
            ..ControllerConfig::default()
        }
    }

    pub fn defaults(&self) -> Defaults {
        let mut defaults = Defaults {
            software_path: self.software_path.clone(),
            ..Defaults::default()
        };
        if let Some(folder) = &self.output_folder {
            defaults.output_folder = folder.clone();
            defaults.use_custom_output = true;
        }
        defaults
    }

    /// Resolves the command to run. An empty command yields an empty program,
    /// which the controller reports as a configuration error.
    pub fn command_spec(&self) -> Result<CommandSpec, ProfileError> {
        match &self.profile {
            Some(name) => {
                let profiles = profile::load_profiles(&self.profiles)?;
                profile::resolve_named(&profiles, name, &self.defaults(), &self.command)
            }
            None => {
                let (program, args) = self.command.split_first().map_or(("", &[][..]), |(p, a)| (p.as_str(), a));
                Ok(CommandSpec::new(program, args.iter().cloned()))
            }
        }
    }
}
