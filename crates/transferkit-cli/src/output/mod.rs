//! Terminal formatting

use transferkit_core::{ContentLocator, ExtractionResult, Resolution, StoredMetadata, TelemetryEvent};

fn list_or_dash(values: &[String]) -> String {
    if values.is_empty() {
        "-".to_string()
    } else {
        values.join(", ")
    }
}

fn format_result(result: &ExtractionResult) -> String {
    let mut output = String::new();
    let principle = if result.concept.principle.is_empty() {
        "-"
    } else {
        &result.concept.principle
    };
    output.push_str(&format!("  Principle: {}\n", principle));
    output.push_str(&format!("  Keywords:  {}\n", list_or_dash(&result.concept.keywords)));
    output.push_str(&format!("  Tier 2:    {}\n", list_or_dash(&result.tier2)));
    output.push_str(&format!("  Analogies: {}\n", list_or_dash(&result.analogies)));
    output.push_str(&format!("  Domains:   {}\n", list_or_dash(&result.domains)));
    output
}

pub fn format_resolution(locator: &ContentLocator, resolution: &Resolution) -> String {
    let mut output = format!(
        "{} [{}] llm={} cache_hits={}\n",
        locator, resolution.channel, resolution.used_llm_count, resolution.cache_hit_count
    );
    output.push_str(&format_result(&resolution.result));
    output
}

pub fn format_stored(row: &StoredMetadata) -> String {
    let mut output = format!(
        "{} ({}) version={} updated={}\n",
        row.locator,
        row.scope.partition_key(),
        row.version,
        row.updated_at.format("%Y-%m-%d %H:%M:%S")
    );
    output.push_str(&format_result(&row.result));
    output
}

pub fn format_events(events: &[TelemetryEvent]) -> String {
    let mut output = String::new();
    if events.is_empty() {
        return output;
    }
    output.push_str("Events:\n");
    for event in events {
        output.push_str(&format!(
            "  {} {}#{}",
            event.event_type.as_str(),
            event.content_id,
            event.section_ref
        ));
        if let Some(hit) = event.cache_hit {
            output.push_str(&format!(" cache_hit={}", hit));
        }
        if let Some(tokens) = event.tokens_used {
            output.push_str(&format!(" tokens={}", tokens));
        }
        if let Some(reason) = &event.reason {
            output.push_str(&format!(" reason=\"{}\"", reason));
        }
        output.push('\n');
    }
    output
}
