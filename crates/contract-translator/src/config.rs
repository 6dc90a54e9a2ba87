// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

use anyhow::Context;
use clap::{Args, ValueEnum};
use model_to_ir::TranslationOptions;
use serde::Deserialize;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "translator.toml";

/// General options
#[derive(Args, Default)]
#[clap(next_help_heading = "General Options")]
pub struct GeneralConfig {
    /// Display detailed translation progress
    #[clap(name = "verbose", long, short = 'v', global = true)]
    pub verbose: bool,

    /// What to print for a successful translation
    #[clap(name = "format", long, short = 'f', global = true, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Write the output to a file instead of stdout
    #[clap(name = "output", long, short = 'o', global = true)]
    pub output: Option<PathBuf>,

    /// Configuration file (default: `translator.toml` next to the program, if present)
    #[clap(name = "config", long, short = 'c', global = true)]
    pub config: Option<PathBuf>,
}

/// Translation options; explicit flags override the configuration file
#[derive(Args, Default)]
#[clap(next_help_heading = "Translation Options")]
pub struct TranslationConfig {
    /// Only verify these members (`Class`, `Class.method` or `function`); repeatable
    #[clap(name = "select", long, short = 's', global = true)]
    pub select: Vec<String>,

    /// Translate module-level statements into a `main` method
    #[clap(name = "main-method", long, global = true)]
    pub main_method: bool,

    /// Don't generate behavioral subtyping checks for overrides
    #[clap(name = "no-override-checks", long, global = true)]
    pub no_override_checks: bool,

    /// Don't re-verify inherited methods for subclasses
    #[clap(name = "no-inherit-checks", long, global = true)]
    pub no_inherit_checks: bool,

    /// Interface declarations of backend-native classes (JSON)
    #[clap(name = "interface", long, short = 'i', global = true)]
    pub interface: Option<PathBuf>,
}

#[derive(ValueEnum, Default, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// The rendered IR program
    #[default]
    Text,
    /// One line per emitted declaration
    Summary,
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Summary => write!(f, "summary"),
        }
    }
}

/// Contents of `translator.toml`
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub select: Vec<String>,
    pub main_method: Option<bool>,
    pub check_overrides: Option<bool>,
    pub check_inheritance: Option<bool>,
    /// Relative to the configuration file
    pub interface: Option<PathBuf>,
}

impl FileConfig {
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// The explicitly given file, else `translator.toml` beside `program`
    pub fn load(explicit: Option<&Path>, program: &Path) -> anyhow::Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let default = program.parent().unwrap_or(Path::new(".")).join(CONFIG_FILE);
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };
        let text = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        let mut config = Self::parse(&text).with_context(|| format!("parsing {}", path.display()))?;
        if let (Some(interface), Some(dir)) = (&config.interface, path.parent()) {
            config.interface = Some(dir.join(interface));
        }
        Ok(config)
    }
}

impl TranslationConfig {
    pub fn options(&self, file: &FileConfig) -> TranslationOptions {
        let defaults = TranslationOptions::default();
        TranslationOptions {
            select: if self.select.is_empty() {
                file.select.clone()
            } else {
                self.select.clone()
            },
            main_method: self.main_method || file.main_method.unwrap_or(defaults.main_method),
            check_overrides: !self.no_override_checks
                && file.check_overrides.unwrap_or(defaults.check_overrides),
            check_inheritance: !self.no_inherit_checks
                && file.check_inheritance.unwrap_or(defaults.check_inheritance),
        }
    }

    pub fn interface_path(&self, file: &FileConfig) -> Option<PathBuf> {
        self.interface.clone().or_else(|| file.interface.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_file() {
        let file = FileConfig::parse(
            r#"
            select = ["Dog.speak"]
            main_method = true
            check_overrides = false
            "#,
        )
        .unwrap();
        let flags = TranslationConfig {
            select: vec!["Animal".to_string()],
            ..Default::default()
        };
        let options = flags.options(&file);
        assert_eq!(options.select, vec!["Animal".to_string()]);
        assert!(options.main_method);
        assert!(!options.check_overrides);
        assert!(options.check_inheritance);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(FileConfig::parse("selected = []").is_err());
    }
}
