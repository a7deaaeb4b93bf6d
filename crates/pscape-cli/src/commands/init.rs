use std::fs;
use std::path::PathBuf;

use pscape_core::SimConfig;

pub fn run(name: &str) -> Result<(), String> {
    let mut path = PathBuf::from(name);
    if !matches!(path.extension().and_then(|e| e.to_str()), Some("yaml" | "yml")) {
        path = PathBuf::from(format!("{name}.yaml"));
    }
    if path.exists() {
        return Err(format!("'{}' already exists", path.display()));
    }

    let body = SimConfig::default()
        .to_yaml()
        .map_err(|e| format!("cannot render template: {e}"))?;
    let content = format!(
        "# PastoralScape parameters\n\
         #\n\
         # Every section is optional; missing values take the defaults shown here.\n\
         # Village paths list (row, col) waypoints; each loop starts and ends at\n\
         # its village.\n\
         \n\
         {body}"
    );
    fs::write(&path, content).map_err(|e| format!("cannot write {}: {e}", path.display()))?;

    println!("Created parameter file {}", path.display());
    println!();
    println!("Get started:");
    println!("  pscape check --params {}   # Validate and show the calendar", path.display());
    println!("  pscape run --params {}     # Run and summarize", path.display());

    Ok(())
}
