//! Providers command

use crate::app::OutputFormat;
use anyhow::Result;
use transferkit_core::{Config, ProviderOrchestrator};

pub async fn run(config: &Config, format: OutputFormat) -> Result<()> {
    let orchestrator = ProviderOrchestrator::from_config(config)?;
    let statuses = orchestrator.availability().await;

    match format {
        OutputFormat::Json => {
            let items: Vec<serde_json::Value> = orchestrator
                .adapters()
                .iter()
                .zip(&statuses)
                .map(|(adapter, (name, available))| {
                    serde_json::json!({
                        "name": name,
                        "model": adapter.model_name(),
                        "degraded": adapter.is_degraded(),
                        "available": available,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
        OutputFormat::Cli => {
            println!("{:<3} {:<20} {:<32} STATUS", "#", "PROVIDER", "MODEL");
            for (idx, (adapter, (name, available))) in
                orchestrator.adapters().iter().zip(&statuses).enumerate()
            {
                let status = match (*available, adapter.is_degraded()) {
                    (_, true) => "fallback",
                    (true, false) => "available",
                    (false, false) => "unavailable",
                };
                println!(
                    "{:<3} {:<20} {:<32} {}",
                    idx + 1,
                    name,
                    adapter.model_name(),
                    status
                );
            }
        }
    }

    Ok(())
}
