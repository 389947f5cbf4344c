//! Show command

use crate::app::{OutputFormat, ShowArgs};
use crate::output;
use anyhow::Result;
use transferkit_core::{Database, TransferError};

pub async fn run(args: ShowArgs, db: &Database, format: OutputFormat) -> Result<()> {
    let scope = args.scope.to_scope()?;
    let rows = db.list_metadata(&args.content_id, &scope)?;

    if rows.is_empty() && !db.content_exists(&args.content_id)? {
        return Err(TransferError::ContentNotFound(args.content_id).into());
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Cli => {
            if rows.is_empty() {
                println!(
                    "No metadata stored for '{}' in scope {}.",
                    args.content_id,
                    scope.partition_key()
                );
                println!("Run 'transferkit extract-all {}' to generate it.", args.content_id);
            }
            for row in &rows {
                print!("{}", output::format_stored(row));
                println!();
            }
        }
    }

    Ok(())
}
