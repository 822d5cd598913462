//! `posture config` - CLI configuration management.

use anyhow::Result;
use colored::Colorize;

use super::Context;
use crate::cli::args::{ConfigArgs, ConfigCommands};
use crate::config::Config;
use crate::output::OutputFormat;

pub async fn execute(ctx: Context, args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommands::Show => show_config(&ctx),
        ConfigCommands::Set { key, value } => set_config(&ctx, &key, &value),
        ConfigCommands::Path => show_path(),
    }
}

fn show_config(ctx: &Context) -> Result<()> {
    let config = &ctx.config;
    if ctx.output_format.emit(config)? {
        return Ok(());
    }

    println!("{}", "Current Configuration:".bold());
    println!();
    println!("  {} {}", "run_timeout_secs:".bold(), config.run_timeout_secs);
    println!("  {} {}", "helper_socket:".bold(), config.socket().display());
    println!(
        "  {} {}",
        "helper_calls_per_second:".bold(),
        config.helper_calls_per_second
    );
    println!(
        "  {} {}",
        "output_format:".bold(),
        config.output_format.unwrap_or(OutputFormat::Pretty)
    );
    println!("  {} {} recorded", "checks:".bold(), config.checks.len());

    Ok(())
}

fn set_config(ctx: &Context, key: &str, value: &str) -> Result<()> {
    let mut config = ctx.config.clone();
    config.set(key, value)?;
    config.save()?;
    println!("{} {} set to {}.", "Success:".green().bold(), key, value.cyan());
    Ok(())
}

fn show_path() -> Result<()> {
    println!("{}", Config::path()?.display());
    Ok(())
}
