use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use colored::Colorize;
use comfy_table::{ContentArrangement, Table};
use serde::Serialize;

use pscape_core::Position;
use pscape_sim::Simulation;

/// What one seeded run produced.
#[derive(Debug, Serialize)]
struct RunSummary {
    seed: u64,
    animals_start: usize,
    animals_end: usize,
    births: usize,
    deaths: BTreeMap<String, usize>,
    distance_km: f64,
    mean_herd_size: Option<f64>,
    /// Cell with the most recorded occupants, and that total.
    busiest_cell: Option<(Position, usize)>,
    herd_records: usize,
    vaccination_rates: BTreeMap<String, f64>,
    events: BTreeMap<String, usize>,
}

fn summarize(sim: &Simulation) -> Result<RunSummary, String> {
    let tracker = sim
        .tracker()
        .ok_or("simulation finished without its default recorder")?;
    Ok(RunSummary {
        seed: sim.config().model.seed,
        animals_start: tracker.total_animals - tracker.births,
        animals_end: sim.population().live_animals(),
        births: tracker.births,
        deaths: tracker
            .deaths
            .iter()
            .map(|(cause, days)| (cause.clone(), days.len()))
            .collect(),
        distance_km: tracker.total_distance_km,
        mean_herd_size: tracker.final_mean_herd_size(),
        busiest_cell: tracker.busiest_cell(),
        herd_records: tracker.herds.len(),
        vaccination_rates: tracker
            .decision_rates()
            .into_iter()
            .map(|(disease, rate)| (disease.to_owned(), rate))
            .collect(),
        events: sim
            .dispatched()
            .iter()
            .map(|(kind, n)| (kind.to_string(), *n))
            .collect(),
    })
}

pub fn run(
    params: Option<&Path>,
    seed: Option<u64>,
    seeds: u32,
    max_records: Option<usize>,
    json: bool,
) -> Result<(), String> {
    let mut base = super::load_config(params)?;
    if let Some(max) = max_records {
        base = base.with_max_records(max);
    }
    let first = seed.unwrap_or(base.model.seed);

    let mut summaries = Vec::new();
    for i in 0..seeds.max(1) {
        let config = base.clone().with_seed(first.wrapping_add(u64::from(i)));
        let mut sim = Simulation::new(config).map_err(|e| format!("invalid parameters: {e}"))?;
        sim.run().map_err(|e| format!("simulation error: {e}"))?;
        summaries.push(summarize(&sim)?);
    }

    if json {
        let out = serde_json::to_string_pretty(&summaries)
            .map_err(|e| format!("cannot serialize results: {e}"))?;
        println!("{out}");
        return Ok(());
    }

    println!(
        "  {} {}",
        "Simulation".bold(),
        format!(
            "({} to {}, {} run{})",
            base.model.start_date,
            base.model.end_date,
            summaries.len(),
            if summaries.len() == 1 { "" } else { "s" }
        )
        .dimmed()
    );
    println!();
    print_results(&summaries);
    println!();
    print_events(&summaries);
    Ok(())
}

fn print_results(summaries: &[RunSummary]) {
    println!("  {}", "Results".bold().underline());
    println!();

    let causes: BTreeSet<&str> = summaries
        .iter()
        .flat_map(|s| s.deaths.keys().map(String::as_str))
        .collect();

    let mut header = vec![
        "Seed".to_owned(),
        "Animals".to_owned(),
        "Births".to_owned(),
    ];
    header.extend(causes.iter().map(|c| format!("Deaths ({c})")));
    header.extend([
        "Distance (km)".to_owned(),
        "Mean herd".to_owned(),
        "Busiest cell".to_owned(),
    ]);

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(header);
    for s in summaries {
        let mut row = vec![
            s.seed.to_string(),
            format!("{} -> {}", s.animals_start, s.animals_end),
            s.births.to_string(),
        ];
        row.extend(
            causes
                .iter()
                .map(|c| s.deaths.get(*c).copied().unwrap_or(0).to_string()),
        );
        row.push(format!("{:.1}", s.distance_km));
        row.push(
            s.mean_herd_size
                .map(|m| format!("{m:.1}"))
                .unwrap_or_else(|| "--".to_owned()),
        );
        row.push(
            s.busiest_cell
                .map(|(position, total)| format!("{position} x{total}"))
                .unwrap_or_else(|| "--".to_owned()),
        );
        table.add_row(row);
    }
    println!("{table}");
}

fn print_events(summaries: &[RunSummary]) {
    println!("  {}", "Dispatched Events".bold().underline());
    println!();

    let kinds: BTreeSet<&str> = summaries
        .iter()
        .flat_map(|s| s.events.keys().map(String::as_str))
        .collect();

    let mut header = vec!["Event".to_owned()];
    header.extend(summaries.iter().map(|s| format!("seed {}", s.seed)));

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(header);
    for kind in kinds {
        let mut row = vec![kind.to_owned()];
        row.extend(
            summaries
                .iter()
                .map(|s| s.events.get(kind).copied().unwrap_or(0).to_string()),
        );
        table.add_row(row);
    }
    println!("{table}");
}
