use std::path::Path;

use colored::Colorize;
use comfy_table::{ContentArrangement, Table};
use pscape_sim::{EventKind, Simulation};

pub fn run(params: Option<&Path>) -> Result<(), String> {
    let config = super::load_config(params)?;
    let model = config.model.clone();
    let diseases = config.disease_names().join(", ");

    let mut sim = Simulation::new(config).map_err(|e| format!("invalid parameters: {e}"))?;
    sim.init()
        .map_err(|e| format!("cannot set up the run: {e}"))?;

    println!("  {}", "All checks passed.".green());
    println!(
        "  {} to {}, step {} days, seed {}",
        model.start_date, model.end_date, model.time_delta_days, model.seed
    );
    println!(
        "  {} households, {} animals, {} villages, diseases: {}",
        sim.population().households.len(),
        sim.population().live_animals(),
        sim.world().villages().len(),
        if diseases.is_empty() { "none".to_owned() } else { diseases }
    );
    println!();

    println!("  {}", "Scheduled Events".bold().underline());
    println!();
    let counts = sim.queue().counts_by_kind();
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Event", "Scheduled"]);
    for kind in EventKind::ALL {
        let n = counts.get(&kind).copied().unwrap_or(0);
        table.add_row(vec![kind.to_string(), n.to_string()]);
    }
    println!("{table}");

    Ok(())
}
