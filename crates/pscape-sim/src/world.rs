use std::collections::{BTreeSet, HashMap};

use chrono::{Datelike, NaiveDate};
use pscape_core::{CellId, ConfigError, CyclicPath, HerdId, HerdsmanId, HouseholdId, LatLon, Population, Position};
use rand::Rng;
use rand::rngs::StdRng;
use tracing::{debug, warn};

use crate::context::SimContext;
use crate::demography::feed_herd;
use crate::disease::Disease;
use crate::error::{SimError, SimResult};
use crate::geography::GeographyProvider;

/// Area of one cell in square metres.
pub const CELL_AREA_M2: f64 = 1e6;

/// What occupies a cell besides its residents.
#[derive(Debug, Clone, PartialEq)]
pub enum Terrain {
    /// Plain grazing land.
    Open,
    /// A home village with the grazing loops that start there.
    Village {
        /// Grazing loops, each starting at this cell.
        paths: Vec<CyclicPath>,
        /// Households living here.
        households: Vec<HouseholdId>,
    },
}

impl Terrain {
    /// Whether this is a village.
    pub fn is_village(&self) -> bool {
        matches!(self, Self::Village { .. })
    }

    /// Whether this is a village with at least one loop.
    pub fn has_paths(&self) -> bool {
        matches!(self, Self::Village { paths, .. } if !paths.is_empty())
    }

    /// A uniformly chosen path, or `None` if there are none.
    pub fn random_path(&self, rng: &mut StdRng) -> Option<&CyclicPath> {
        match self {
            Self::Village { paths, .. } if !paths.is_empty() => paths.get(rng.random_range(0..paths.len())),
            _ => None,
        }
    }
}

/// One grid cell.
#[derive(Debug, Clone)]
pub struct Cell {
    /// External cell id.
    pub id: CellId,
    /// Grid index.
    pub position: Position,
    /// Centre of the cell.
    pub coords: LatLon,
    /// Village or open land.
    pub terrain: Terrain,
    residents: Vec<HerdsmanId>,
    /// Vegetation index for the current month.
    pub vegetation_index: f64,
    /// Mean vegetation index over the loaded period.
    pub vegetation_index_alltime: f64,
    /// Precipitation for the current month.
    pub precipitation: f64,
    /// Share of the cell covered by surface water.
    pub water_intersect: f64,
    /// Forage capacity relative to the cell's long-run mean.
    pub vegetation_capacity: f64,
}

impl Cell {
    fn new(id: CellId, position: Position, coords: LatLon) -> Self {
        Self {
            id,
            position,
            coords,
            terrain: Terrain::Open,
            residents: Vec::new(),
            vegetation_index: 0.0,
            vegetation_index_alltime: 0.0,
            precipitation: 0.0,
            water_intersect: 0.0,
            vegetation_capacity: 1.0,
        }
    }

    /// Herdsmen currently in the cell.
    pub fn residents(&self) -> &[HerdsmanId] {
        &self.residents
    }

    /// Forage obtained by `n_animals` eating `eat` m^2 per day for `dt` days.
    pub fn forage(&self, n_animals: usize, eat: f64, dt: f64) -> f64 {
        let required = n_animals as f64 * eat * dt;
        if required <= 0.0 {
            return 0.0;
        }
        let available = (CELL_AREA_M2 * self.vegetation_capacity / required).min(1.0);
        required * available
    }
}

/// Bisection index along one grid axis.
#[derive(Debug, Clone)]
struct Axis {
    /// `(coordinate, grid index)` sorted by coordinate.
    centres: Vec<(f64, usize)>,
    /// Midpoints between consecutive centres.
    boundaries: Vec<f64>,
}

impl Axis {
    fn new(values: impl IntoIterator<Item = f64>) -> Self {
        let mut centres: Vec<(f64, usize)> = values.into_iter().enumerate().map(|(i, v)| (v, i)).collect();
        centres.sort_by(|a, b| a.0.total_cmp(&b.0));
        let boundaries = centres.windows(2).map(|w| (w[0].0 + w[1].0) / 2.0).collect();
        Self { centres, boundaries }
    }

    fn locate(&self, value: f64) -> usize {
        let k = self.boundaries.partition_point(|b| *b <= value);
        self.centres[k].1
    }
}

/// The spatial grid: cells, who lives where, and the geography they carry.
#[derive(Debug, Clone)]
pub struct WorldGrid {
    height: usize,
    width: usize,
    cells: Vec<Cell>,
    by_id: HashMap<CellId, Position>,
    positions: HashMap<HerdsmanId, Position>,
    live_cells: Option<BTreeSet<Position>>,
    first_dim_lat: bool,
    rows: Axis,
    cols: Axis,
    neighbor_cache: HashMap<(Position, usize), Vec<(Position, f64)>>,
    mean_vegetation: f64,
}

impl WorldGrid {
    /// Build a grid from cell ids and centres in row-major order.
    ///
    /// The grid must be aligned with latitude/longitude lines. Which grid
    /// dimension runs along latitude is detected from the centres.
    pub fn new(height: usize, width: usize, cells: Vec<(CellId, LatLon)>) -> SimResult<Self> {
        if height == 0 || width == 0 || cells.len() != height * width {
            return Err(ConfigError::invalid(
                "world",
                format!("{} cells do not fill a {height}x{width} grid", cells.len()),
            )
            .into());
        }
        let cells: Vec<Cell> = cells
            .into_iter()
            .enumerate()
            .map(|(i, (id, coords))| Cell::new(id, Position::new(i / width, i % width), coords))
            .collect();

        let at = |row: usize, col: usize| cells[row * width + col].coords;
        let origin = at(0, 0);
        let first_dim_lat = if height > 1 {
            let next = at(1, 0);
            (next.lat - origin.lat).abs() >= (next.lon - origin.lon).abs()
        } else if width > 1 {
            let next = at(0, 1);
            (next.lon - origin.lon).abs() >= (next.lat - origin.lat).abs()
        } else {
            true
        };
        let along = |c: LatLon, lat: bool| if lat { c.lat } else { c.lon };
        let rows = Axis::new((0..height).map(|r| along(at(r, 0), first_dim_lat)));
        let cols = Axis::new((0..width).map(|c| along(at(0, c), !first_dim_lat)));

        let by_id = cells.iter().map(|c| (c.id, c.position)).collect();
        Ok(Self {
            height,
            width,
            cells,
            by_id,
            positions: HashMap::new(),
            live_cells: None,
            first_dim_lat,
            rows,
            cols,
            neighbor_cache: HashMap::new(),
            mean_vegetation: 0.0,
        })
    }

    /// A regular grid: latitude grows with the row, longitude with the
    /// column, and cell ids count row-major from zero.
    pub fn regular(height: usize, width: usize, origin: LatLon, cell_degrees: f64) -> SimResult<Self> {
        let cells = (0..height * width)
            .map(|i| {
                let (row, col) = (i / width, i % width);
                let coords = LatLon::new(
                    origin.lat + row as f64 * cell_degrees,
                    origin.lon + col as f64 * cell_degrees,
                );
                (CellId(i as u32), coords)
            })
            .collect();
        Self::new(height, width, cells)
    }

    /// Rows.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Columns.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Whether the row index runs along latitude.
    pub fn first_dim_lat(&self) -> bool {
        self.first_dim_lat
    }

    /// Mean vegetation index over all cells for the last refreshed month.
    pub fn mean_vegetation(&self) -> f64 {
        self.mean_vegetation
    }

    fn index(&self, position: Position) -> SimResult<usize> {
        if position.row < self.height && position.col < self.width {
            Ok(position.row * self.width + position.col)
        } else {
            Err(SimError::UnknownCell(position))
        }
    }

    /// The cell at `position`.
    pub fn cell(&self, position: Position) -> SimResult<&Cell> {
        let idx = self.index(position)?;
        Ok(&self.cells[idx])
    }

    /// The cell at `position`, mutably.
    pub fn cell_mut(&mut self, position: Position) -> SimResult<&mut Cell> {
        let idx = self.index(position)?;
        Ok(&mut self.cells[idx])
    }

    /// Grid position of a cell id.
    pub fn position_of_cell(&self, id: CellId) -> SimResult<Position> {
        self.by_id.get(&id).copied().ok_or(SimError::UnknownCellId(id))
    }

    /// The cell with external id `id`.
    pub fn cell_by_id(&self, id: CellId) -> SimResult<&Cell> {
        self.cell(self.position_of_cell(id)?)
    }

    /// All cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter()
    }

    /// Turn a cell into a village, keeping its position and identity.
    pub fn set_village(&mut self, position: Position, paths: Vec<CyclicPath>) -> SimResult<()> {
        self.cell_mut(position)?.terrain = Terrain::Village {
            paths,
            households: Vec::new(),
        };
        Ok(())
    }

    /// Register a household as living in a village cell.
    pub fn add_household(&mut self, position: Position, household: HouseholdId) -> SimResult<()> {
        match &mut self.cell_mut(position)?.terrain {
            Terrain::Village { households, .. } => {
                households.push(household);
                Ok(())
            }
            Terrain::Open => Err(ConfigError::invalid(
                "world.villages",
                format!("household placed at {position}, which is not a village"),
            )
            .into()),
        }
    }

    /// Positions of all village cells, row-major.
    pub fn villages(&self) -> Vec<Position> {
        self.cells
            .iter()
            .filter(|c| c.terrain.is_village())
            .map(|c| c.position)
            .collect()
    }

    /// Where an agent currently is.
    pub fn position_of(&self, agent: HerdsmanId) -> SimResult<Position> {
        self.positions
            .get(&agent)
            .copied()
            .ok_or(SimError::UnplacedAgent(agent))
    }

    /// Put an agent into a cell for the first time.
    pub fn place_agent(&mut self, agent: HerdsmanId, position: Position) -> SimResult<()> {
        self.cell_mut(position)?.residents.push(agent);
        self.positions.insert(agent, position);
        if let Some(live) = &mut self.live_cells {
            live.insert(position);
        }
        Ok(())
    }

    fn detach(&mut self, agent: HerdsmanId) -> SimResult<Position> {
        let from = self.position_of(agent)?;
        let cell = self.cell_mut(from)?;
        let slot = cell
            .residents
            .iter()
            .position(|r| *r == agent)
            .ok_or(SimError::ResidencyMismatch {
                agent,
                position: from,
            })?;
        cell.residents.remove(slot);
        let now_empty = cell.residents.is_empty();
        if let Some(live) = self.live_cells.as_mut().filter(|_| now_empty) {
            live.remove(&from);
        }
        Ok(from)
    }

    /// Move an agent from its recorded cell to `to`.
    pub fn move_agent(&mut self, agent: HerdsmanId, to: Position) -> SimResult<()> {
        self.index(to)?;
        self.detach(agent)?;
        self.cell_mut(to)?.residents.push(agent);
        self.positions.insert(agent, to);
        if let Some(live) = &mut self.live_cells {
            live.insert(to);
        }
        Ok(())
    }

    /// Take an agent out of the world entirely.
    pub fn remove_agent(&mut self, agent: HerdsmanId) -> SimResult<()> {
        self.detach(agent)?;
        self.positions.remove(&agent);
        Ok(())
    }

    /// The cell whose centre is nearest to `coords`, by bisection on each
    /// axis.
    pub fn nearest_cell(&self, coords: LatLon) -> Position {
        let (first, second) = if self.first_dim_lat {
            (coords.lat, coords.lon)
        } else {
            (coords.lon, coords.lat)
        };
        Position::new(self.rows.locate(first), self.cols.locate(second))
    }

    /// Cells within `radius` (grid units) of `position`, excluding itself,
    /// with their distances. Results are cached per position and radius.
    pub fn neighborhood(&mut self, position: Position, radius: usize) -> &[(Position, f64)] {
        let (height, width) = (self.height, self.width);
        self.neighbor_cache
            .entry((position, radius))
            .or_insert_with(|| {
                let rows = position.row.saturating_sub(radius)..=(position.row + radius).min(height - 1);
                let mut out = Vec::new();
                for row in rows {
                    let cols = position.col.saturating_sub(radius)..=(position.col + radius).min(width - 1);
                    for col in cols {
                        let other = Position::new(row, col);
                        if other == position {
                            continue;
                        }
                        let d = position.grid_distance(other);
                        if d <= radius as f64 {
                            out.push((other, d));
                        }
                    }
                }
                out
            })
    }

    /// Occupied cells in row-major order, building the index by a full scan
    /// on first use.
    pub fn live_cells(&mut self) -> &BTreeSet<Position> {
        let cells = &self.cells;
        self.live_cells.get_or_insert_with(|| {
            cells
                .iter()
                .filter(|c| !c.residents.is_empty())
                .map(|c| c.position)
                .collect()
        })
    }

    /// Apply a month of geography to every cell.
    pub fn refresh_geography(&mut self, date: NaiveDate, provider: &dyn GeographyProvider) -> SimResult<()> {
        let (year, month) = (date.year(), date.month());
        let data = provider
            .month(year, month)
            .ok_or(SimError::MissingGeography { year, month })?;

        let mut total = 0.0;
        for (&id, record) in &data.cells {
            let Some(&position) = self.by_id.get(&id) else {
                warn!(%id, "geography for a cell outside the grid");
                continue;
            };
            let cell = self.cell_mut(position)?;
            cell.vegetation_index = record.vegetation_index;
            cell.precipitation = record.precipitation;
            cell.water_intersect = record.water_intersect;
            total += record.vegetation_index;
        }
        self.mean_vegetation = total / self.cells.len() as f64;

        for cell in &mut self.cells {
            let Some(capacity) = provider.capacity_index(year, month, cell.id) else {
                continue;
            };
            match provider.mean_capacity_index(cell.id) {
                Some(mean) if mean > 0.0 => cell.vegetation_capacity = capacity / mean,
                _ => warn!(cell = %cell.id, "no mean capacity index; capacity unchanged"),
            }
        }
        debug!(%date, mean_vegetation = self.mean_vegetation, "geography refreshed");
        Ok(())
    }

    /// Copy the all-time mean vegetation index onto each cell.
    pub fn distribute_alltime_vegetation(&mut self, provider: &dyn GeographyProvider) {
        for cell in &mut self.cells {
            if let Some(mean) = provider.mean_vegetation_alltime(cell.id) {
                cell.vegetation_index_alltime = mean;
            }
        }
    }

    /// Integrate feeding and disease over every occupied cell since the last
    /// world step, then mark the step on the clock.
    pub fn advance(
        &mut self,
        population: &mut Population,
        diseases: &[Disease],
        ctx: &mut SimContext<'_>,
    ) -> SimResult<()> {
        let elapsed = ctx.clock.elapsed_since_last_step().num_days();
        if elapsed == 0 {
            return Err(SimError::RepeatedWorldStep(ctx.now()));
        }
        let dt = elapsed as f64;
        let eat = ctx.config.livestock.eat;

        let live: Vec<Position> = self.live_cells().iter().copied().collect();
        let mut stepped = 0usize;
        for position in live {
            let cell = self.cell(position)?;
            let herds = cell
                .residents
                .iter()
                .map(|&h| population.herdsman(h).map(|h| h.herd))
                .collect::<Result<Vec<HerdId>, _>>()?;
            let n_animals: usize = herds
                .iter()
                .map(|&h| population.herd(h).map(|h| h.size()))
                .sum::<Result<usize, _>>()?;
            if n_animals == 0 {
                continue;
            }

            let food = cell.forage(n_animals, eat, dt);
            for &herd in &herds {
                let share = population.herd(herd)?.size() as f64 / n_animals as f64 * food;
                feed_herd(population, herd, share, dt, &ctx.config.livestock)?;
            }
            for disease in diseases {
                disease.step(&herds, population, dt, ctx)?;
            }
            stepped += 1;
        }

        ctx.clock.mark_world_step();
        debug!(date = %ctx.now(), dt, cells = stepped, "world step");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geography::StaticGeography;
    use crate::testing::Harness;
    use chrono::TimeDelta;
    use pscape_core::config::GeographyParams;
    use pscape_core::{DiseaseId, Sex, SimConfig, Sirv};
    use proptest::prelude::*;
    use rand::SeedableRng;

    fn grid(h: usize, w: usize) -> WorldGrid {
        WorldGrid::regular(h, w, LatLon::new(10.0, 13.0), 0.01).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn scanned_live(world: &WorldGrid) -> BTreeSet<Position> {
        world
            .cells()
            .filter(|c| !c.residents().is_empty())
            .map(|c| c.position)
            .collect()
    }

    #[test]
    fn construction_rejects_wrong_cell_count() {
        assert!(WorldGrid::new(2, 2, vec![(CellId(0), LatLon::new(0.0, 0.0))]).is_err());
    }

    #[test]
    fn axis_orientation_is_detected() {
        assert!(grid(3, 3).first_dim_lat());
        // Rows run along longitude here.
        let cells = (0..4)
            .map(|i| {
                let (r, c) = (i / 2, i % 2);
                (CellId(i as u32), LatLon::new(c as f64, r as f64))
            })
            .collect();
        let w = WorldGrid::new(2, 2, cells).unwrap();
        assert!(!w.first_dim_lat());
        assert_eq!(w.nearest_cell(LatLon::new(0.9, 0.1)), Position::new(0, 1));
    }

    #[test]
    fn nearest_cell_on_single_cell_grid() {
        let w = grid(1, 1);
        assert_eq!(w.nearest_cell(LatLon::new(-50.0, 170.0)), Position::new(0, 0));
    }

    #[test]
    fn nearest_cell_clamps_outside_points() {
        let w = grid(4, 5);
        assert_eq!(w.nearest_cell(LatLon::new(0.0, 0.0)), Position::new(0, 0));
        assert_eq!(w.nearest_cell(LatLon::new(90.0, 90.0)), Position::new(3, 4));
        assert_eq!(w.nearest_cell(LatLon::new(10.021, 13.029)), Position::new(2, 3));
    }

    #[test]
    fn cell_lookup_by_id_and_bounds() {
        let w = grid(3, 4);
        assert_eq!(w.cell_by_id(CellId(6)).unwrap().position, Position::new(1, 2));
        assert!(matches!(w.cell(Position::new(3, 0)), Err(SimError::UnknownCell(_))));
        assert!(matches!(w.cell_by_id(CellId(99)), Err(SimError::UnknownCellId(_))));
    }

    #[test]
    fn village_keeps_identity() {
        let mut w = grid(3, 3);
        let p = Position::new(1, 1);
        let path = CyclicPath::new(vec![CellId(4), CellId(5)]).unwrap();
        w.set_village(p, vec![path]).unwrap();
        w.add_household(p, HouseholdId(0)).unwrap();
        let cell = w.cell(p).unwrap();
        assert_eq!(cell.id, CellId(4));
        assert!(cell.terrain.has_paths());
        assert_eq!(w.villages(), vec![p]);
        assert!(w.add_household(Position::new(0, 0), HouseholdId(1)).is_err());
    }

    #[test]
    fn random_path_on_open_terrain_is_none() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(Terrain::Open.random_path(&mut rng).is_none());
        let village = Terrain::Village {
            paths: Vec::new(),
            households: Vec::new(),
        };
        assert!(!village.has_paths());
        assert!(village.random_path(&mut rng).is_none());
    }

    #[test]
    fn move_updates_residency_and_live_index() {
        let mut w = grid(3, 3);
        let a = HerdsmanId(0);
        w.place_agent(a, Position::new(0, 0)).unwrap();
        assert_eq!(w.live_cells().len(), 1);

        w.move_agent(a, Position::new(2, 2)).unwrap();
        assert_eq!(w.position_of(a).unwrap(), Position::new(2, 2));
        assert!(w.cell(Position::new(0, 0)).unwrap().residents().is_empty());
        assert_eq!(
            w.live_cells().iter().copied().collect::<Vec<_>>(),
            vec![Position::new(2, 2)]
        );

        w.remove_agent(a).unwrap();
        assert!(w.live_cells().is_empty());
        assert!(matches!(w.position_of(a), Err(SimError::UnplacedAgent(_))));
    }

    #[test]
    fn moving_unplaced_agent_fails() {
        let mut w = grid(2, 2);
        assert!(matches!(
            w.move_agent(HerdsmanId(3), Position::new(0, 0)),
            Err(SimError::UnplacedAgent(_))
        ));
        w.place_agent(HerdsmanId(0), Position::new(0, 0)).unwrap();
        assert!(matches!(
            w.move_agent(HerdsmanId(0), Position::new(5, 5)),
            Err(SimError::UnknownCell(_))
        ));
        assert_eq!(w.position_of(HerdsmanId(0)).unwrap(), Position::new(0, 0));
    }

    #[test]
    fn residency_mismatch_is_detected() {
        let mut w = grid(2, 2);
        let a = HerdsmanId(0);
        w.place_agent(a, Position::new(0, 0)).unwrap();
        w.cell_mut(Position::new(0, 0)).unwrap().residents.clear();
        assert!(matches!(
            w.move_agent(a, Position::new(1, 1)),
            Err(SimError::ResidencyMismatch { .. })
        ));
    }

    #[test]
    fn neighborhood_is_inclusive_and_excludes_centre() {
        let mut w = grid(5, 5);
        let n = w.neighborhood(Position::new(2, 2), 1).to_vec();
        let cells: BTreeSet<_> = n.iter().map(|(p, _)| *p).collect();
        assert_eq!(cells.len(), 4);
        assert!(cells.contains(&Position::new(3, 2)));
        assert!(cells.contains(&Position::new(2, 1)));

        let corner = w.neighborhood(Position::new(0, 0), 2).to_vec();
        assert!(corner.iter().all(|(p, d)| *d <= 2.0 && *p != Position::new(0, 0)));
        assert!(corner.iter().any(|(p, _)| *p == Position::new(2, 0)));
    }

    #[test]
    fn neighborhood_is_stable_across_mutations() {
        let mut w = grid(6, 6);
        let first = w.neighborhood(Position::new(3, 3), 2).to_vec();
        w.place_agent(HerdsmanId(0), Position::new(3, 4)).unwrap();
        w.set_village(Position::new(2, 2), Vec::new()).unwrap();
        assert_eq!(w.neighborhood(Position::new(3, 3), 2), first.as_slice());
    }

    #[test]
    fn forage_caps_at_cell_capacity() {
        let mut w = grid(1, 1);
        let cell = w.cell_mut(Position::new(0, 0)).unwrap();
        cell.vegetation_capacity = 0.5;
        // Plenty of forage: everything required is obtained.
        assert!((cell.forage(10, 40.0, 7.0) - 2800.0).abs() < 1e-9);
        // 1e6 * 0.5 available against 1e7 required.
        assert!((cell.forage(1000, 100.0, 100.0) - 5e5).abs() < 1e-6);
        assert_eq!(cell.forage(0, 40.0, 7.0), 0.0);
    }

    #[test]
    fn refresh_geography_sets_capacity_ratio() {
        let mut w = grid(2, 2);
        let ids: Vec<_> = w.cells().map(|c| c.id).collect();
        let params = GeographyParams {
            vegetation_index: 0.4,
            precipitation: 5.0,
            capacity_index: 2.0,
            seasonal_amplitude: 0.0,
            peak_month: 1,
        };
        let mut geo = StaticGeography::new(ids, params).with_cell_scale(CellId(3), 0.5);
        geo.load(2000, 1, 2000, 2).unwrap();

        w.refresh_geography(date(2000, 2, 1), &geo).unwrap();
        assert!((w.cell_by_id(CellId(0)).unwrap().vegetation_capacity - 1.0).abs() < 1e-12);
        assert!((w.cell_by_id(CellId(3)).unwrap().vegetation_capacity - 0.5).abs() < 1e-12);
        assert!((w.mean_vegetation() - (0.4 * 3.0 + 0.2) / 4.0).abs() < 1e-12);

        w.distribute_alltime_vegetation(&geo);
        assert!((w.cell_by_id(CellId(1)).unwrap().vegetation_index_alltime - 0.4).abs() < 1e-12);

        assert!(matches!(
            w.refresh_geography(date(2001, 1, 1), &geo),
            Err(SimError::MissingGeography { year: 2001, month: 1 })
        ));
    }

    #[test]
    fn advance_feeds_and_marks_step() {
        let mut h = Harness::new();
        let mut w = grid(2, 2);
        let mut pop = Population::new();
        let hh = pop.add_household(Position::new(0, 0));
        let hm = pop.add_herdsman(hh, Position::new(0, 0)).unwrap();
        let herd = pop.herdsman(hm).unwrap().herd;
        let a = pop.add_animal(herd, Sex::Female, date(1998, 1, 1), 0.5).unwrap();
        pop.animal_mut(a).unwrap().set_disease_state(DiseaseId(0), Sirv::Susceptible);
        pop.animal_mut(a).unwrap().set_disease_state(DiseaseId(1), Sirv::Susceptible);
        w.place_agent(hm, Position::new(0, 0)).unwrap();

        let diseases = Disease::from_config(&SimConfig::default());
        w.advance(&mut pop, &diseases, &mut h.ctx()).unwrap();
        // Fully fed for the nominal 7-day step.
        assert!((pop.animal(a).unwrap().health - 0.57).abs() < 1e-9);
        assert_eq!(h.clock.last_world_step(), Some(date(2000, 1, 1)));

        let err = w.advance(&mut pop, &diseases, &mut h.ctx()).unwrap_err();
        assert!(matches!(err, SimError::RepeatedWorldStep(_)));

        h.clock.advance(date(2000, 1, 3)).unwrap();
        w.advance(&mut pop, &diseases, &mut h.ctx()).unwrap();
        assert!((pop.animal(a).unwrap().health - 0.59).abs() < 1e-9);
        assert_eq!(h.clock.now() - TimeDelta::days(2), date(2000, 1, 1));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn live_index_matches_residents(
            moves in prop::collection::vec((0u32..6, 0usize..8, 0usize..8, any::<bool>()), 1..120)
        ) {
            let mut w = grid(8, 8);
            for agent in 0..6 {
                w.place_agent(HerdsmanId(agent), Position::new(0, agent as usize)).unwrap();
            }
            let mut placed = [true; 6];
            // Build the index up front so moves maintain it incrementally.
            w.live_cells();
            for (agent, row, col, remove) in moves {
                let id = HerdsmanId(agent);
                let slot = agent as usize;
                if remove && placed[slot] {
                    w.remove_agent(id).unwrap();
                    placed[slot] = false;
                } else if placed[slot] {
                    w.move_agent(id, Position::new(row, col)).unwrap();
                } else {
                    w.place_agent(id, Position::new(row, col)).unwrap();
                    placed[slot] = true;
                }
                let expected = scanned_live(&w);
                prop_assert_eq!(w.live_cells(), &expected);
            }
        }

        #[test]
        fn nearest_cell_matches_brute_force(
            height in 1usize..=50,
            width in 1usize..=50,
            lat0 in -60.0f64..60.0,
            lon0 in -170.0f64..170.0,
            deg in 0.001f64..0.5,
            seed in any::<u64>(),
        ) {
            let w = WorldGrid::regular(height, width, LatLon::new(lat0, lon0), deg).unwrap();
            let mut rng = StdRng::seed_from_u64(seed);
            for _ in 0..1000 {
                let lat = lat0 + rng.random_range(-1.0..(height as f64 + 1.0)) * deg;
                let lon = lon0 + rng.random_range(-1.0..(width as f64 + 1.0)) * deg;
                let p = LatLon::new(lat, lon);
                let brute = w
                    .cells()
                    .min_by(|a, b| {
                        let da = (a.coords.lat - lat).powi(2) + (a.coords.lon - lon).powi(2);
                        let db = (b.coords.lat - lat).powi(2) + (b.coords.lon - lon).powi(2);
                        da.total_cmp(&db)
                    })
                    .map(|c| c.position)
                    .unwrap();
                prop_assert_eq!(w.nearest_cell(p), brute, "point {:?}", p);
            }
        }
    }
}
