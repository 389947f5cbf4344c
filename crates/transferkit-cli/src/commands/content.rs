//! Content command

use crate::app::{ContentAction, ContentArgs, OutputFormat};
use anyhow::Result;
use transferkit_core::{ContentDocument, Database};

pub async fn run(args: ContentArgs, db: &Database, format: OutputFormat) -> Result<()> {
    match args.action {
        ContentAction::Import { file } => {
            let doc = ContentDocument::from_file(&file)?;
            let info = db.import_content(&doc)?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&info)?),
                OutputFormat::Cli => println!(
                    "Imported content '{}' ({} chunks)",
                    info.id, info.chunk_count
                ),
            }
        }
        ContentAction::List => {
            let contents = db.list_contents()?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&contents)?),
                OutputFormat::Cli => {
                    if contents.is_empty() {
                        println!("No content imported.");
                    }
                    for item in contents {
                        println!(
                            "{:<24} {:>4} chunks  {}",
                            item.id,
                            item.chunk_count,
                            item.title.as_deref().unwrap_or("-")
                        );
                    }
                }
            }
        }
    }
    Ok(())
}
