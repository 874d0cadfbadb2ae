/*!
 * CCD Affinity Daemon - Main Entry Point
 *
 * Samples the process table, applies monitored process rules and the default
 * CCD as processes start, and logs the rule status when matched processes
 * change. Runs until Ctrl+C.
 */

use std::sync::Arc;
use tracing::{error, info, warn};

use ccd_affinity::{
    init_tracing, system_process_table, AffinitySetter, CcdRegistry, DaemonConfig, DaemonResult,
    Debouncer, JsonRuleStore, ProcessSampler, RuleEngine, TomlConfigStore,
};

#[tokio::main]
async fn main() -> miette::Result<()> {
    // Initialize structured tracing
    init_tracing();

    run().await?;
    Ok(())
}

async fn run() -> DaemonResult<()> {
    info!("CCD affinity daemon starting...");

    let config = DaemonConfig::from_env()?;
    info!(
        config_dir = %config.config_dir.display(),
        sample_interval_ms = config.sample_interval.as_millis() as u64,
        auto_apply = config.auto_apply,
        "Configuration loaded"
    );

    info!("Loading CCD groups and monitored process rules...");
    let registry = Arc::new(CcdRegistry::load(Arc::new(TomlConfigStore::new(
        config.config_file(),
    )))?);
    let rule_store = Arc::new(JsonRuleStore::new(config.rules_file()));

    let table = system_process_table()?;
    let setter = AffinitySetter::new(Arc::clone(&table));
    let engine = RuleEngine::new(setter, registry, rule_store)?;
    engine.set_auto_apply(config.auto_apply);

    info!("Initializing process sampler...");
    let sampler = ProcessSampler::new(table, config.sample_interval);
    let subscription = engine.attach(sampler.as_ref());

    // Coalesce bursts of matched-process events into one status refresh
    let status_engine = Arc::downgrade(&engine);
    let debouncer = Arc::new(Debouncer::new(
        move || {
            let Some(engine) = status_engine.upgrade() else {
                return;
            };
            for row in engine.status() {
                info!(
                    process = %row.display_name,
                    ccd = %row.ccd_name,
                    affinity = %row.affinity,
                    "rule status"
                );
            }
        },
        config.debounce_delay,
        config.max_staleness,
    ));
    let refresh = Arc::clone(&debouncer);
    let status_subscription = engine.events().subscribe_all(move |_, _| {
        refresh.trigger();
    });

    engine.rule_applied().subscribe(|outcome| {
        if !outcome.success {
            warn!(
                process = %outcome.process_name,
                ccd = %outcome.ccd_name,
                message = %outcome.message,
                "rule not applied"
            );
        }
    });

    if engine.auto_apply_enabled() {
        info!("Applying all rules at startup...");
        match engine.apply_all_rules_now() {
            Ok(report) => info!(
                rules = report.applied.len(),
                dangling = report.dangling.len(),
                "Startup rule application complete"
            ),
            Err(e) => error!(error = %e, "Startup rule application failed"),
        }
    }

    sampler.start()?;
    debouncer.flush();

    info!("Daemon ready - press Ctrl+C to exit");
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }

    info!("Shutting down...");
    sampler.stop().await;
    engine.detach(sampler.as_ref(), subscription);
    engine.events().unsubscribe_all(status_subscription);
    info!("Daemon stopped");
    Ok(())
}
