//! Output formatting for different formats.

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use posture::RunEvent;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

/// Available output formats.
#[derive(Debug, Clone, Copy, Default, ValueEnum, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output with colors
    #[default]
    Pretty,
    /// JSON output
    Json,
    /// YAML output
    Yaml,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            _ => anyhow::bail!(
                "Unknown output format: {s}\n\
                 Valid formats: pretty, json, yaml"
            ),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pretty => write!(f, "pretty"),
            Self::Json => write!(f, "json"),
            Self::Yaml => write!(f, "yaml"),
        }
    }
}

impl OutputFormat {
    /// Print `value` as JSON or YAML. Returns false for `Pretty`, which the
    /// caller renders itself.
    pub fn emit<T: Serialize>(self, value: &T) -> Result<bool> {
        match self {
            Self::Json => println!("{}", serde_json::to_string_pretty(value)?),
            Self::Yaml => print!("{}", serde_yaml::to_string(value)?),
            Self::Pretty => return Ok(false),
        }
        Ok(true)
    }
}

/// One spinner per running probe, finished with a coloured verdict line.
pub struct CheckProgress {
    multi: MultiProgress,
    bars: HashMap<String, ProgressBar>,
    style: ProgressStyle,
}

impl CheckProgress {
    /// Spinners on stderr, hidden when stderr is not a terminal
    pub fn new(no_color: bool) -> Self {
        let target = if console::Term::stderr().features().is_attended() {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        };
        let style = if no_color {
            ProgressStyle::with_template("{spinner} {msg}")
        } else {
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
        }
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "✓"]);

        Self {
            multi: MultiProgress::with_draw_target(target),
            bars: HashMap::new(),
            style,
        }
    }

    /// Apply one scheduler event
    pub fn apply(&mut self, event: &RunEvent) {
        match event {
            RunEvent::Started { uuid, name } => {
                let bar = self.multi.add(ProgressBar::new_spinner());
                bar.set_style(self.style.clone());
                bar.set_message(name.clone());
                bar.enable_steady_tick(Duration::from_millis(80));
                self.bars.insert(uuid.clone(), bar);
            }
            RunEvent::Passed { uuid, detail } => {
                self.finish(uuid, format!("{} {detail}", "PASS".green().bold()));
            }
            RunEvent::Failed { uuid, detail } => {
                self.finish(uuid, format!("{} {detail}", "FAIL".red().bold()));
            }
            RunEvent::Skipped { uuid } => {
                let name = self.bars.get(uuid).map(|b| b.message()).unwrap_or_default();
                self.finish(uuid, format!("{} {}", "SKIP".dimmed(), name.dimmed()));
            }
            RunEvent::Errored { uuid, error } => {
                self.finish(uuid, format!("{} {error}", "ERR ".yellow().bold()));
            }
        }
    }

    fn finish(&mut self, uuid: &str, line: String) {
        if let Some(bar) = self.bars.remove(uuid) {
            bar.finish_with_message(line);
        }
    }

    /// Stop spinners of probes that never finished
    pub fn abandon(&mut self) {
        for (_, bar) in self.bars.drain() {
            let line = format!("{} {}", "TIME".red().bold(), bar.message());
            bar.abandon_with_message(line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_formats() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("yml".parse::<OutputFormat>().unwrap(), OutputFormat::Yaml);
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Pretty);
        assert!("csv".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn progress_tracks_and_clears_bars() {
        let mut progress = CheckProgress::new(true);
        progress.apply(&RunEvent::Started {
            uuid: "a".into(),
            name: "Firewall is on".into(),
        });
        progress.apply(&RunEvent::Started {
            uuid: "b".into(),
            name: "SecureBoot is enabled".into(),
        });
        assert_eq!(progress.bars.len(), 2);

        progress.apply(&RunEvent::Failed {
            uuid: "a".into(),
            detail: "Firewall is not configured".into(),
        });
        assert_eq!(progress.bars.len(), 1);

        progress.abandon();
        assert!(progress.bars.is_empty());
    }
}
