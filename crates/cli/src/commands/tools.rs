//! `provost tools` — List the available administrative tools.

use std::sync::Arc;

use provost_tools::CampusDirectory;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let directory = Arc::new(CampusDirectory::new());
    let registry = provost_tools::default_registry(directory)?;

    println!("Available tools ({}):", registry.len());
    println!();
    for entry in registry.catalog() {
        println!("  {:<18} {}", entry.name, entry.description);
    }
    println!();

    Ok(())
}
