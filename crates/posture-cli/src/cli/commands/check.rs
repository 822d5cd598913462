//! `posture check` - Run the check catalogue.

use anyhow::Result;
use colored::Colorize;
use posture::{
    HelperClient, PostureError, PostureReport, Registry, ReportState, RunEvent, RunReport,
    Scheduler, Verdict,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::Context;
use crate::cli::args::CheckArgs;
use crate::output::{CheckProgress, OutputFormat};

pub async fn execute(ctx: Context, args: CheckArgs) -> Result<()> {
    let registry = ctx.registry()?;

    if args.schema {
        let schema = registry.schema();
        if !ctx.output_format.emit(&schema)? {
            print_schema(&registry);
        }
        return Ok(());
    }

    let timeout = args
        .timeout
        .map_or_else(|| ctx.config.run_timeout(), Duration::from_secs);
    let store = ctx.store()?;
    let delegator = Arc::new(HelperClient::with_config(ctx.config.helper()));

    let (tx, mut rx) = mpsc::unbounded_channel::<RunEvent>();
    let pretty = ctx.output_format == OutputFormat::Pretty;
    let no_color = ctx.no_color;
    let progress = tokio::spawn(async move {
        let mut board = pretty.then(|| CheckProgress::new(no_color));
        while let Some(event) = rx.recv().await {
            if let Some(board) = board.as_mut() {
                board.apply(&event);
            }
        }
        if let Some(mut board) = board {
            board.abandon();
        }
    });

    let result = Scheduler::builder(&registry, store)
        .timeout(timeout)
        .delegator(delegator)
        .events(tx)
        .build()
        .run()
        .await;
    // The scheduler dropped its sender, so the progress task drains and ends.
    let _ = progress.await;

    save_ledger(&ctx, &registry);

    let run = match result {
        Ok(run) => run,
        Err(e @ PostureError::RunTimedOut { .. }) => {
            return Err(anyhow::Error::new(e).context("check run did not finish"));
        }
        Err(e) => return Err(e.into()),
    };
    info!(
        probes = run.verdicts.len(),
        failures = run.failures(),
        "check run finished"
    );

    if args.report {
        let report = PostureReport::build(&registry, &run);
        if !ctx.output_format.emit(&report)? {
            print_report(&report);
        }
    } else if !ctx.output_format.emit(&run.summary())? {
        print_summary(&registry, &run);
    }

    Ok(())
}

fn save_ledger(ctx: &Context, registry: &Registry) {
    let mut config = ctx.config.clone();
    config.checks = registry.ledger().snapshot();
    if let Err(e) = config.save() {
        warn!(error = %e, "failed to save check statuses to config");
    }
}

fn print_schema(registry: &Registry) {
    for claim in registry.claims() {
        println!("{}", claim.title().bold());
        for probe in claim.probes() {
            let meta = probe.meta();
            println!("  {} {}", meta.name.cyan(), meta.uuid.dimmed());
            println!("    {} {}", "pass:".green(), meta.passed_message);
            println!("    {} {}", "fail:".red(), meta.failed_message);
        }
        println!();
    }
}

fn print_summary(registry: &Registry, run: &RunReport) {
    println!();
    for claim in registry.claims() {
        println!("{}", claim.title().bold());
        for probe in claim.probes() {
            let meta = probe.meta();
            let line = match run.verdict(&meta.uuid) {
                Some(Verdict::Passed) => format!("{} {}", "✓".green(), meta.name),
                Some(Verdict::Failed) => format!("{} {}", "✗".red(), meta.name),
                Some(Verdict::Skipped) => format!("{} {}", "-".dimmed(), meta.name.dimmed()),
                Some(Verdict::Errored(e)) => format!("{} {} ({})", "!".yellow(), meta.name, e.dimmed()),
                None => format!("{} {}", "?".dimmed(), meta.name),
            };
            println!("  {line}");
        }
    }

    println!();
    let failures = run.failures();
    let summary = format!(
        "{} checks in {:.1}s, {} failing",
        run.verdicts.len(),
        run.elapsed.as_secs_f64(),
        failures
    );
    if failures == 0 {
        println!("{}", summary.green());
    } else {
        println!("{}", summary.yellow());
    }
}

fn print_report(report: &PostureReport) {
    println!("{}", "Posture Report:".bold());
    println!();
    println!("  {} {}", "node:".bold(), report.node_id);
    println!("  {} {}", "passed:".bold(), report.passed_count.to_string().green());
    println!("  {} {}", "failed:".bold(), report.failed_count.to_string().red());
    println!("  {} {}", "disabled:".bold(), report.disabled_count.to_string().dimmed());
    println!("  {} {}", "fingerprint:".bold(), report.significant_change);
    println!("  {} {}", "last check:".bold(), report.last_check.to_rfc3339());
    println!();
    for (uuid, state) in &report.state {
        let state = match state {
            ReportState::Pass => "pass".green(),
            ReportState::Fail => "fail".red(),
            ReportState::Off => "off".dimmed(),
        };
        println!("  {state:<6} {uuid}");
    }
}
