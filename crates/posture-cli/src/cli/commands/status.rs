//! `posture status` - Show the last recorded results without running checks.

use anyhow::Result;
use colored::Colorize;
use posture::{LastState, Registry};
use serde::Serialize;
use std::collections::BTreeMap;

use super::Context;

/// One claim's recorded probes, in catalogue order.
#[derive(Debug, Serialize)]
struct ClaimStatus<'a> {
    title: &'a str,
    checks: Vec<CheckLine<'a>>,
}

#[derive(Debug, Serialize)]
struct CheckLine<'a> {
    uuid: &'a str,
    name: &'a str,
    passed: bool,
    details: &'a str,
}

fn group<'a>(registry: &'a Registry, states: &'a BTreeMap<String, LastState>) -> Vec<ClaimStatus<'a>> {
    registry
        .claims()
        .iter()
        .map(|claim| ClaimStatus {
            title: claim.title(),
            checks: claim
                .probes()
                .iter()
                .filter_map(|probe| {
                    let meta = probe.meta();
                    states.get(&meta.uuid).map(|state| CheckLine {
                        uuid: &meta.uuid,
                        name: &meta.name,
                        passed: state.state,
                        details: &state.details,
                    })
                })
                .collect(),
        })
        .filter(|claim| !claim.checks.is_empty())
        .collect()
}

pub async fn execute(ctx: Context) -> Result<()> {
    let registry = ctx.registry()?;
    let states = ctx.store()?.get_all()?;
    let claims = group(&registry, &states);

    if ctx.output_format.emit(&claims)? {
        return Ok(());
    }

    if claims.is_empty() {
        println!("{}", "No checks recorded yet. Run `posture check` first.".dimmed());
        return Ok(());
    }

    for claim in &claims {
        println!("{}", claim.title.bold());
        for check in &claim.checks {
            let mark = if check.passed { "✓".green() } else { "✗".red() };
            println!("  {mark} {}", check.name);
            println!("    {}", check.details.dimmed());
        }
        println!();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use posture::{Probe, ProbeHandle};

    struct Named(&'static str);

    #[async_trait::async_trait]
    impl Probe for Named {
        fn uuid(&self) -> &str {
            self.0
        }
        fn name(&self) -> &str {
            self.0
        }
        fn passed_message(&self) -> &str {
            "ok"
        }
        fn failed_message(&self) -> &str {
            "not ok"
        }
        async fn is_runnable(&self) -> bool {
            true
        }
        async fn run(&mut self) -> posture::Result<()> {
            Ok(())
        }
        fn passed(&self) -> bool {
            true
        }
        fn status(&self) -> String {
            String::new()
        }
    }

    #[test]
    fn groups_recorded_checks_by_claim() {
        let mut registry = Registry::new();
        registry.register("Access", ProbeHandle::new(Named("a"))).unwrap();
        registry.register("Access", ProbeHandle::new(Named("b"))).unwrap();
        registry.register("Integrity", ProbeHandle::new(Named("c"))).unwrap();

        let mut states = BTreeMap::new();
        states.insert("b".to_string(), LastState::new("b", false, "port 22 open"));

        let claims = group(&registry, &states);
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].title, "Access");
        assert_eq!(claims[0].checks.len(), 1);
        assert_eq!(claims[0].checks[0].details, "port 22 open");
        assert!(!claims[0].checks[0].passed);
    }
}
