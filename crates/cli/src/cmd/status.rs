//! Implementation of the `byoa status` command.

use anyhow::{Context, Result};

use byoa_lib::records::{JsonRecordStore, RecordStore};

use crate::output::{OutputFormat, print_info, print_json, print_stat};

/// Lists the locally recorded deployments, most recent first.
pub fn cmd_status(format: OutputFormat) -> Result<()> {
  let store = JsonRecordStore::default_store();
  let records = store
    .load()
    .with_context(|| format!("Failed to load deployment records: {}", store.path().display()))?;

  if format.is_json() {
    return print_json(&records);
  }

  if records.is_empty() {
    print_info("No deployments recorded");
    return Ok(());
  }

  let mut entries: Vec<_> = records.iter().collect();
  entries.sort_by(|a, b| b.1.timestamp.cmp(&a.1.timestamp));

  for (name, record) in entries {
    println!("{} ({})", name, record.environment);
    print_stat("Account", &record.account_id);
    print_stat("Region", &record.region);
    if !record.endpoint.is_empty() {
      print_stat("Endpoint", &record.endpoint);
    }
    print_stat("Deployed", &record.timestamp.to_rfc3339());
  }
  Ok(())
}
