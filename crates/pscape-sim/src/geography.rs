use std::collections::{BTreeMap, HashMap};
use std::f64::consts::PI;
use std::fmt;

use pscape_core::CellId;
use pscape_core::config::GeographyParams;

use crate::error::SimResult;

/// Monthly observations for one cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellGeography {
    /// Vegetation index for the month.
    pub vegetation_index: f64,
    /// Precipitation for the month.
    pub precipitation: f64,
    /// Share of the cell covered by surface water.
    pub water_intersect: f64,
}

/// All cell observations for one month.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonthlyGeography {
    /// Records keyed by cell id.
    pub cells: BTreeMap<CellId, CellGeography>,
}

/// Source of time-varying geographic data.
pub trait GeographyProvider: fmt::Debug {
    /// Load every month from `start` through `end` inclusive.
    fn load(&mut self, start_year: i32, start_month: u32, end_year: i32, end_month: u32) -> SimResult<()>;

    /// Records for one month, if loaded.
    fn month(&self, year: i32, month: u32) -> Option<&MonthlyGeography>;

    /// Mean vegetation index over every loaded month.
    fn mean_vegetation_alltime(&self, cell: CellId) -> Option<f64>;

    /// Forage capacity index for a month, if the provider has one.
    fn capacity_index(&self, year: i32, month: u32, cell: CellId) -> Option<f64>;

    /// Long-run mean capacity index used to normalise monthly values.
    fn mean_capacity_index(&self, cell: CellId) -> Option<f64>;
}

/// Synthetic geography: every cell follows the same seasonal cycle, scaled
/// by an optional per-cell factor.
///
/// A zero amplitude gives uniform, constant data.
#[derive(Debug, Clone)]
pub struct StaticGeography {
    cells: Vec<CellId>,
    params: GeographyParams,
    cell_scale: HashMap<CellId, f64>,
    months: BTreeMap<(i32, u32), MonthlyGeography>,
    mean_vegetation: HashMap<CellId, f64>,
}

impl StaticGeography {
    /// Synthetic data for `cells`; nothing is generated until `load`.
    pub fn new(cells: Vec<CellId>, params: GeographyParams) -> Self {
        Self {
            cells,
            params,
            cell_scale: HashMap::new(),
            months: BTreeMap::new(),
            mean_vegetation: HashMap::new(),
        }
    }

    /// Multiply one cell's vegetation and capacity by `factor`.
    pub fn with_cell_scale(mut self, cell: CellId, factor: f64) -> Self {
        self.cell_scale.insert(cell, factor);
        self
    }

    fn scale(&self, cell: CellId) -> f64 {
        self.cell_scale.get(&cell).copied().unwrap_or(1.0)
    }

    /// Seasonal multiplier for a month, peaking at `peak_month`.
    fn season(&self, month: u32) -> f64 {
        let phase = 2.0 * PI * (f64::from(month) - f64::from(self.params.peak_month)) / 12.0;
        1.0 + self.params.seasonal_amplitude * phase.cos()
    }

    fn generate(&self, month: u32) -> MonthlyGeography {
        let season = self.season(month);
        let cells = self
            .cells
            .iter()
            .map(|&cell| {
                let record = CellGeography {
                    vegetation_index: self.params.vegetation_index * season * self.scale(cell),
                    precipitation: self.params.precipitation * season,
                    water_intersect: 0.0,
                };
                (cell, record)
            })
            .collect();
        MonthlyGeography { cells }
    }
}

impl GeographyProvider for StaticGeography {
    fn load(&mut self, start_year: i32, start_month: u32, end_year: i32, end_month: u32) -> SimResult<()> {
        let (mut year, mut month) = (start_year, start_month);
        let mut totals: HashMap<CellId, f64> = HashMap::new();
        let mut n_months = 0usize;
        while (year, month) <= (end_year, end_month) {
            let data = self.generate(month);
            for (cell, record) in &data.cells {
                *totals.entry(*cell).or_insert(0.0) += record.vegetation_index;
            }
            self.months.insert((year, month), data);
            n_months += 1;
            if month == 12 {
                year += 1;
                month = 1;
            } else {
                month += 1;
            }
        }
        if n_months > 0 {
            self.mean_vegetation = totals
                .into_iter()
                .map(|(cell, total)| (cell, total / n_months as f64))
                .collect();
        }
        Ok(())
    }

    fn month(&self, year: i32, month: u32) -> Option<&MonthlyGeography> {
        self.months.get(&(year, month))
    }

    fn mean_vegetation_alltime(&self, cell: CellId) -> Option<f64> {
        self.mean_vegetation.get(&cell).copied()
    }

    fn capacity_index(&self, year: i32, month: u32, cell: CellId) -> Option<f64> {
        self.months.get(&(year, month))?;
        Some(self.params.capacity_index * self.season(month) * self.scale(cell))
    }

    fn mean_capacity_index(&self, cell: CellId) -> Option<f64> {
        self.cells.contains(&cell).then_some(self.params.capacity_index)
    }
}
