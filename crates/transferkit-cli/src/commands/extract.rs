//! Extract commands

use crate::app::{ExtractAllArgs, ExtractArgs, OutputFormat};
use crate::output;
use anyhow::Result;
use std::sync::Arc;
use transferkit_core::{
    Config, ContentLocator, Database, ExtractionPipeline, RecordingTelemetrySink,
    ResolveRequest, TelemetrySink, TracingTelemetrySink,
};

/// Telemetry destination: recorded for `--trace-events`, traced otherwise
fn telemetry(trace_events: bool) -> (Arc<dyn TelemetrySink>, Option<Arc<RecordingTelemetrySink>>) {
    if trace_events {
        let recorder = Arc::new(RecordingTelemetrySink::new());
        let sink: Arc<dyn TelemetrySink> = recorder.clone();
        (sink, Some(recorder))
    } else {
        let sink: Arc<dyn TelemetrySink> = Arc::new(TracingTelemetrySink);
        (sink, None)
    }
}

pub async fn run(args: ExtractArgs, db: Database, config: &Config, format: OutputFormat) -> Result<()> {
    let locator =
        ContentLocator::from_parts(args.content_id, args.chunk_id, args.chunk_index, args.page)?;
    let scope = args.scope.to_scope()?;
    let request = ResolveRequest::new(locator, scope).with_context(args.context.to_context());

    let (sink, recorder) = telemetry(args.trace_events);
    let pipeline = ExtractionPipeline::from_database(Arc::new(db), config, sink)?;
    let resolution = pipeline.resolve(&request).await?;

    match format {
        OutputFormat::Json => {
            let mut value = serde_json::to_value(&resolution)?;
            value["locator"] = serde_json::to_value(&request.locator)?;
            if let Some(recorder) = &recorder {
                value["events"] = serde_json::to_value(recorder.events())?;
            }
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Cli => {
            print!("{}", output::format_resolution(&request.locator, &resolution));
            if let Some(recorder) = &recorder {
                print!("{}", output::format_events(&recorder.events()));
            }
        }
    }

    Ok(())
}

pub async fn run_all(
    args: ExtractAllArgs,
    db: Database,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let scope = args.scope.to_scope()?;
    let context = args.context.to_context();

    let (sink, recorder) = telemetry(args.trace_events);
    let pipeline = ExtractionPipeline::from_database(Arc::new(db), config, sink)?;
    let outcomes = pipeline
        .resolve_content(&args.content_id, &scope, &context)
        .await?;

    let failed = outcomes.iter().filter(|o| o.outcome.is_err()).count();

    match format {
        OutputFormat::Json => {
            let items: Vec<serde_json::Value> = outcomes
                .iter()
                .map(|o| match &o.outcome {
                    Ok(resolution) => serde_json::json!({
                        "locator": o.locator,
                        "resolution": resolution,
                    }),
                    Err(e) => serde_json::json!({
                        "locator": o.locator,
                        "error": e.to_string(),
                    }),
                })
                .collect();
            let mut value = serde_json::json!({ "results": items });
            if let Some(recorder) = &recorder {
                value["events"] = serde_json::to_value(recorder.events())?;
            }
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Cli => {
            for o in &outcomes {
                match &o.outcome {
                    Ok(resolution) => print!("{}", output::format_resolution(&o.locator, resolution)),
                    Err(e) => println!("{}: error: {}", o.locator, e),
                }
                println!();
            }
            println!(
                "Resolved {} of {} sections",
                outcomes.len() - failed,
                outcomes.len()
            );
            if let Some(recorder) = &recorder {
                print!("{}", output::format_events(&recorder.events()));
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} section(s) failed to resolve", failed);
    }
    Ok(())
}
