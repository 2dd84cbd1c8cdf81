//! Resolution of named command profiles into a [`CommandSpec`].
//!
//! A profile holds an argument template with positional placeholders (`{}`,
//! `{0}`, `{1}`, ...). The user's arguments are substituted into the template,
//! the result is split into tokens using POSIX shell word rules, and output
//! location arguments are appended according to the profile's export mode.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::process::CommandSpec;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile '{0}' not found")]
    NotFound(String),

    #[error("invalid profile name '{0}': use letters, digits and dashes only")]
    InvalidName(String),

    #[error("missing argument for placeholder {{{index}}}")]
    MissingArgument { index: usize },

    #[error("invalid placeholder '{{{0}}}'")]
    InvalidPlaceholder(String),

    #[error("unbalanced brace in template")]
    UnbalancedBrace,

    #[error("template is not valid shell syntax: {0}")]
    Quoting(#[from] shell_words::ParseError),

    #[error("software path is not defined in settings or in profile")]
    NoProgram,

    #[error("failed to read profiles: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse profiles: {0}")]
    Json(#[from] serde_json::Error),
}

/// Where a profile sends downloaded files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportMode {
    /// Use the global output folder, when one is enabled.
    #[default]
    Default,
    /// Use the profile's own `export_path`.
    Custom,
    /// Never append output arguments.
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub command_template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program_path: Option<String>,
    #[serde(default)]
    pub export_mode: ExportMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_flag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_path: Option<String>,
}

/// Global fallbacks applied to every profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub software_path: String,
    pub output_flag: String,
    pub output_folder: String,
    pub use_custom_output: bool,
    pub filename_template: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            software_path: "yt-dlp".to_string(),
            output_flag: "--output".to_string(),
            output_folder: String::new(),
            use_custom_output: false,
            filename_template: "%(title)s.%(ext)s".to_string(),
        }
    }
}

impl Profile {
    pub fn new(command_template: impl Into<String>) -> Self {
        Self {
            command_template: command_template.into(),
            program_path: None,
            export_mode: ExportMode::Default,
            output_flag: None,
            export_path: None,
        }
    }

    /// Builds the command for this profile with `user_args` filling the template.
    pub fn resolve(&self, defaults: &Defaults, user_args: &[String]) -> Result<CommandSpec, ProfileError> {
        let expanded = substitute(&self.command_template, user_args)?;
        let mut args = shell_words::split(&expanded)?;

        let program = self
            .program_path
            .as_deref()
            .filter(|path| !path.trim().is_empty())
            .unwrap_or(defaults.software_path.as_str());
        if program.trim().is_empty() {
            return Err(ProfileError::NoProgram);
        }

        let folder = match self.export_mode {
            ExportMode::Default if defaults.use_custom_output => defaults.output_folder.as_str(),
            ExportMode::Custom => self.export_path.as_deref().unwrap_or_default(),
            ExportMode::Default | ExportMode::None => "",
        };
        if !folder.is_empty() {
            let flag = self
                .output_flag
                .as_deref()
                .filter(|flag| !flag.is_empty())
                .unwrap_or(defaults.output_flag.as_str());
            args.push(flag.to_string());
            args.push(format!("{}/{}", folder.trim_end_matches('/'), defaults.filename_template));
        }

        debug!("Resolved profile template '{}' to {:?}", self.command_template, args);
        Ok(CommandSpec::new(program, args))
    }
}

/// Checks that a profile shortname is usable on the command line.
pub fn validate_name(name: &str) -> Result<(), ProfileError> {
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        Ok(())
    } else {
        Err(ProfileError::InvalidName(name.to_string()))
    }
}

/// Reads a JSON map of shortname to profile.
pub fn load_profiles(path: impl AsRef<Path>) -> Result<BTreeMap<String, Profile>, ProfileError> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Looks up `name` in `profiles` and resolves it.
pub fn resolve_named(
    profiles: &BTreeMap<String, Profile>,
    name: &str,
    defaults: &Defaults,
    user_args: &[String],
) -> Result<CommandSpec, ProfileError> {
    validate_name(name)?;
    let profile = profiles
        .get(name)
        .ok_or_else(|| ProfileError::NotFound(name.to_string()))?;
    profile.resolve(defaults, user_args)
}

/// Replaces `{}` / `{N}` placeholders with `args`; `{{` and `}}` are literal braces.
fn substitute(template: &str, args: &[String]) -> Result<String, ProfileError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    let mut next_auto = 0;

    while let Some(ch) = chars.next() {
        match ch {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '{' => {
                let mut field = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) => field.push(c),
                        None => return Err(ProfileError::UnbalancedBrace),
                    }
                }
                let index = if field.is_empty() {
                    next_auto += 1;
                    next_auto - 1
                } else {
                    field
                        .parse::<usize>()
                        .map_err(|_| ProfileError::InvalidPlaceholder(field.clone()))?
                };
                let arg = args.get(index).ok_or(ProfileError::MissingArgument { index })?;
                out.push_str(arg);
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => return Err(ProfileError::UnbalancedBrace),
            _ => out.push(ch),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_resolve_substitutes_and_splits() {
        let profile = Profile::new("-f best \"{}\" --sleep {1}");
        let spec = profile
            .resolve(&Defaults::default(), &args(&["https://example.com/a b", "3"]))
            .unwrap();

        assert_eq!(spec.program(), "yt-dlp");
        assert_eq!(spec.args(), &args(&["-f", "best", "https://example.com/a b", "--sleep", "3"])[..]);
    }

    #[test]
    fn test_missing_argument() {
        let profile = Profile::new("{} {}");
        let err = profile.resolve(&Defaults::default(), &args(&["one"])).unwrap_err();
        assert!(matches!(err, ProfileError::MissingArgument { index: 1 }));
    }

    #[test]
    fn test_escaped_braces_and_bad_placeholders() {
        assert_eq!(substitute("{{x}} {}", &args(&["y"])).unwrap(), "{x} y");
        assert!(matches!(substitute("{name}", &[]), Err(ProfileError::InvalidPlaceholder(_))));
        assert!(matches!(substitute("{0", &args(&["a"])), Err(ProfileError::UnbalancedBrace)));
        assert!(matches!(substitute("a}", &[]), Err(ProfileError::UnbalancedBrace)));
    }

    #[test]
    fn test_unbalanced_quotes_rejected() {
        let profile = Profile::new("\"{}");
        let err = profile.resolve(&Defaults::default(), &args(&["x"])).unwrap_err();
        assert!(matches!(err, ProfileError::Quoting(_)));
    }

    #[test]
    fn test_profile_program_overrides_default() {
        let mut profile = Profile::new("--version");
        profile.program_path = Some("/opt/bin/tool".to_string());
        let spec = profile.resolve(&Defaults::default(), &[]).unwrap();
        assert_eq!(spec.program(), "/opt/bin/tool");
    }

    #[test]
    fn test_no_program_anywhere() {
        let defaults = Defaults {
            software_path: String::new(),
            ..Defaults::default()
        };
        let err = Profile::new("x").resolve(&defaults, &[]).unwrap_err();
        assert!(matches!(err, ProfileError::NoProgram));
    }

    #[test]
    fn test_export_modes() {
        let defaults = Defaults {
            output_folder: "/downloads/".to_string(),
            use_custom_output: true,
            ..Defaults::default()
        };

        let spec = Profile::new("{}").resolve(&defaults, &args(&["url"])).unwrap();
        assert_eq!(spec.args(), &args(&["url", "--output", "/downloads/%(title)s.%(ext)s"])[..]);

        let mut custom = Profile::new("{}");
        custom.export_mode = ExportMode::Custom;
        custom.export_path = Some("/music".to_string());
        custom.output_flag = Some("-o".to_string());
        let spec = custom.resolve(&defaults, &args(&["url"])).unwrap();
        assert_eq!(spec.args(), &args(&["url", "-o", "/music/%(title)s.%(ext)s"])[..]);

        let mut none = Profile::new("{}");
        none.export_mode = ExportMode::None;
        let spec = none.resolve(&defaults, &args(&["url"])).unwrap();
        assert_eq!(spec.args(), &args(&["url"])[..]);
    }

    #[test]
    fn test_default_mode_without_custom_output_appends_nothing() {
        let defaults = Defaults {
            output_folder: "/downloads".to_string(),
            ..Defaults::default()
        };
        let spec = Profile::new("{}").resolve(&defaults, &args(&["url"])).unwrap();
        assert_eq!(spec.args(), &args(&["url"])[..]);
    }

    #[test]
    fn test_resolve_named_validates_and_looks_up() {
        let profiles: BTreeMap<String, Profile> = serde_json::from_str(
            r#"{"audio": {"command_template": "-x {}", "export_mode": "none"}}"#,
        )
        .unwrap();
        let defaults = Defaults::default();

        let spec = resolve_named(&profiles, "audio", &defaults, &args(&["url"])).unwrap();
        assert_eq!(spec.args(), &args(&["-x", "url"])[..]);

        assert!(matches!(
            resolve_named(&profiles, "video", &defaults, &[]),
            Err(ProfileError::NotFound(_))
        ));
        assert!(matches!(
            resolve_named(&profiles, "bad name", &defaults, &[]),
            Err(ProfileError::InvalidName(_))
        ));
    }
}
