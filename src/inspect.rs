//! Persistent-store inspection.

use std::path::PathBuf;
use std::sync::Arc;

use pagehands_vfs::{DomainStore, FileKvStore};

use crate::CliError;

pub(crate) async fn run(data_dir: PathBuf, export: bool) -> Result<(), CliError> {
    let store = DomainStore::new(Arc::new(FileKvStore::open(&data_dir)?));

    if export {
        let bundle = store.export_bundle().await?;
        println!("{}", serde_json::to_string_pretty(&bundle).unwrap_or_default());
        return Ok(());
    }

    let mut domains = store.domains().await?;
    domains.sort();
    if domains.is_empty() {
        println!("no domains stored under {}", data_dir.display());
        return Ok(());
    }

    for domain in domains {
        println!("{domain}");
        let state = store.load(&domain).await?;
        for (url_path, entry) in &state.paths {
            println!("  {url_path}");
            for (name, file) in &entry.scripts {
                println!(
                    "    scripts/{name}  v{}  {}",
                    file.version,
                    if file.is_enabled() { "enabled" } else { "disabled" }
                );
            }
            for (name, file) in &entry.styles {
                println!(
                    "    styles/{name}  v{}  {}",
                    file.version,
                    if file.is_enabled() { "enabled" } else { "disabled" }
                );
            }
            if !entry.edit_records.is_empty() {
                println!("    {} recorded edits", entry.edit_records.len());
            }
        }
    }
    Ok(())
}
