use anyhow::{Result, bail};
use logflow_cli::pipeline::store_layout;
use logflow_config::Config;
use logflow_core::{RecordKey, TenantId};

use crate::cli::RecordsCommands;

pub async fn handle(cmd: RecordsCommands, config: &Config) -> Result<()> {
    let store = logflow_storage::connect(&config.store.url, store_layout(config)).await?;

    match cmd {
        RecordsCommands::Show { tenant, log_id } => {
            let key = RecordKey::new(TenantId::new(tenant), log_id);
            let Some(record) = store.get_record(&key).await? else {
                bail!("No record at {}", store.layout().record_path(&key));
            };

            println!("{}", store.layout().record_path(&key));
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        RecordsCommands::List { tenant } => {
            let tenant = TenantId::new(tenant);
            let records = store.list_records(&tenant).await?;

            if records.is_empty() {
                println!("No records for tenant {}", tenant);
                return Ok(());
            }

            println!("{:<40} {:>8} {:>10}  PROCESSED AT", "LOG ID", "CHARS", "TIME (s)");
            for (log_id, record) in records {
                println!(
                    "{:<40} {:>8} {:>10.2}  {}",
                    log_id, record.char_count, record.processing_time, record.processed_at
                );
            }
        }
        RecordsCommands::DeadLetters => {
            let letters = store.list_dead_letters().await?;

            if letters.is_empty() {
                println!("No dead letters");
                return Ok(());
            }

            for letter in letters {
                println!(
                    "{}  message {}  {}",
                    letter.id,
                    letter.message_id.as_deref().unwrap_or("-"),
                    letter.reason
                );
                println!("  {}", letter.payload);
            }
        }
    }

    Ok(())
}
