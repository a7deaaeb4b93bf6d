//! Run parameters.
//!
//! A parameter file is YAML mirroring [`SimConfig`]. Every section has
//! defaults, so a file only needs to list what it changes.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Complete configuration for one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Run window, step, and seed.
    #[serde(default)]
    pub model: ModelParams,
    /// Livestock biology.
    #[serde(default)]
    pub livestock: LivestockParams,
    /// Diseases keyed by name. Sorted order defines the disease ids.
    #[serde(default = "default_diseases")]
    pub diseases: BTreeMap<String, DiseaseParams>,
    /// Herdsman and household behaviour.
    #[serde(default)]
    pub agents: AgentParams,
    /// Initial population.
    #[serde(default)]
    pub setup: SetupParams,
    /// Synthetic grid and villages.
    #[serde(default)]
    pub world: WorldParams,
    /// Synthetic geography.
    #[serde(default)]
    pub geography: GeographyParams,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            model: ModelParams::default(),
            livestock: LivestockParams::default(),
            diseases: default_diseases(),
            agents: AgentParams::default(),
            setup: SetupParams::default(),
            world: WorldParams::default(),
            geography: GeographyParams::default(),
        }
    }
}

/// Simulation window, step size, and seed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParams {
    /// First simulated day.
    pub start_date: NaiveDate,
    /// Last simulated day, inclusive.
    pub end_date: NaiveDate,
    /// Days between periodic world/agent steps.
    pub time_delta_days: i64,
    /// Reference duration (days) the disease probabilities are expressed in.
    pub disease_timefactor: f64,
    /// Seed of the run's random stream.
    pub seed: u64,
    /// Decisions are still taken and recorded, but never acted on.
    pub disable_vaccination: bool,
    /// Cap on each per-observation series the recorder keeps (occupancy,
    /// herd snapshots); the oldest entries go first. 0 keeps everything.
    pub max_records: usize,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            start_date: ymd(2000, 1, 1),
            end_date: ymd(2002, 1, 1),
            time_delta_days: 7,
            disease_timefactor: 7.0,
            seed: 42,
            disable_vaccination: false,
            max_records: 0,
        }
    }
}

/// Livestock biology. Durations are in days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LivestockParams {
    /// Forage area (m^2) one animal consumes per day.
    pub eat: f64,
    /// Health of newborn and initial animals.
    pub initial_health: f64,
    /// Health gained per day when fully fed.
    pub health_fed: f64,
    /// Health lost per day when fully starved.
    pub health_starve: f64,
    /// Days from conception to birth.
    pub gestation_period: f64,
    /// Days a mother nurses before she can breed again.
    pub nursing_period: f64,
    /// Age in days at which a female becomes fertile.
    pub maturity: f64,
    /// Probability that a newborn is male.
    pub bull_probability: f64,
    /// Mean lifespan in days.
    pub death_mu: f64,
    /// Standard deviation of the lifespan.
    pub death_sigma: f64,
    /// Day of year at which breeding peaks.
    pub breed_date_mu: f64,
    /// Spread (days) of the breeding season around its peak.
    pub breed_date_sigma: f64,
    /// Scale of the per-day breeding probability.
    pub breed_pscale: f64,
    /// Females below this health do not breed.
    pub min_breed_health: f64,
}

impl Default for LivestockParams {
    fn default() -> Self {
        Self {
            eat: 40.0,
            initial_health: 0.8,
            health_fed: 0.01,
            health_starve: 0.02,
            gestation_period: 283.0,
            nursing_period: 180.0,
            maturity: 730.0,
            bull_probability: 0.5,
            death_mu: 3650.0,
            death_sigma: 365.0,
            breed_date_mu: 120.0,
            breed_date_sigma: 45.0,
            breed_pscale: 0.05,
            min_breed_health: 0.4,
        }
    }
}

/// How spontaneous environmental infections are sampled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum InfectionModel {
    /// Seasonal: `exp(constant + cos * cos(2 pi d / m) + sin * sin(2 pi d / m))`.
    Harmonic {
        /// Intercept.
        constant: f64,
        /// Cosine coefficient.
        cos: f64,
        /// Sine coefficient.
        sin: f64,
        /// Period in days.
        m: f64,
    },
    /// Fixed probability per sampling event.
    Uniform {
        /// The probability.
        p: f64,
    },
}

/// Normal distribution (days) of how long a vaccination lasts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WearoffParams {
    /// Mean protection in days.
    pub mu: f64,
    /// Standard deviation of the protection in days.
    pub sigma: f64,
}

/// SIRV transition rates for one disease, per `disease_timefactor` days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseaseParams {
    /// S -> I at full infection pressure.
    pub p_si: f64,
    /// I -> R.
    pub p_ir: f64,
    /// I -> death.
    pub p_id: f64,
    /// R -> S.
    pub p_rs: f64,
    /// Negative disables V -> S through the compartment step.
    pub p_vs: f64,
    /// Spontaneous environmental infection model.
    pub infection: InfectionModel,
    /// Vaccine wear-off; `None` means vaccination is permanent.
    #[serde(default)]
    pub wearoff: Option<WearoffParams>,
}

/// Herdsman and household behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentParams {
    /// Herdsmen leave when their cell's vegetation capacity drops below this.
    pub move_veg_threshold: f64,
    /// Annual vaccination campaigns as `(month, day)`.
    pub vaccination_schedule: Vec<(u32, u32)>,
    /// Probability a household decides to vaccinate, per disease.
    pub prob_vaccinate: BTreeMap<String, f64>,
}

impl Default for AgentParams {
    fn default() -> Self {
        Self {
            move_veg_threshold: 0.8,
            vaccination_schedule: vec![(3, 1)],
            prob_vaccinate: BTreeMap::from([("cbpp".to_owned(), 0.5), ("rvf".to_owned(), 0.5)]),
        }
    }
}

/// Initial population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupParams {
    /// Households, one herdsman each.
    pub n_households: usize,
    /// Animals spread over the herds.
    pub n_animals: usize,
    /// Share of initial animals that are male.
    pub pct_bull: f64,
    /// Youngest age (days) of an initial animal.
    pub min_age: f64,
    /// Shortest remaining lifespan (days) of an initial animal.
    pub min_remain: f64,
    /// Share of initial animals vaccinated before the run, per disease.
    pub pct_vaccinated: BTreeMap<String, f64>,
}

impl Default for SetupParams {
    fn default() -> Self {
        Self {
            n_households: 10,
            n_animals: 500,
            pct_bull: 0.3,
            min_age: 30.0,
            min_remain: 180.0,
            pct_vaccinated: BTreeMap::from([("cbpp".to_owned(), 0.2), ("rvf".to_owned(), 0.2)]),
        }
    }
}

/// A village on the synthetic grid, with its grazing loops as cell indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VillageParams {
    /// Grid row of the village cell.
    pub row: usize,
    /// Grid column of the village cell.
    pub col: usize,
    /// Waypoints of each loop, `(row, col)`. Every loop starts and ends at
    /// the village, so the village cell itself is left out.
    #[serde(default)]
    pub paths: Vec<Vec<(usize, usize)>>,
}

/// Synthetic axis-aligned grid used when no GIS data is supplied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldParams {
    /// Cells per row.
    pub width: usize,
    /// Rows.
    pub height: usize,
    /// Latitude of the centre of cell (0, 0).
    pub origin_lat: f64,
    /// Longitude of the centre of cell (0, 0).
    pub origin_lon: f64,
    /// Cell edge length in degrees.
    pub cell_degrees: f64,
    /// Home villages. At least one is required.
    pub villages: Vec<VillageParams>,
}

impl Default for WorldParams {
    fn default() -> Self {
        Self {
            width: 20,
            height: 20,
            origin_lat: 10.0,
            origin_lon: 13.0,
            cell_degrees: 0.01,
            villages: vec![
                VillageParams {
                    row: 5,
                    col: 5,
                    paths: vec![vec![(5, 12), (12, 12), (12, 5)]],
                },
                VillageParams {
                    row: 14,
                    col: 14,
                    paths: vec![vec![(8, 16), (16, 8)]],
                },
            ],
        }
    }
}

/// Synthetic seasonal geography.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeographyParams {
    /// Mean vegetation index.
    pub vegetation_index: f64,
    /// Mean monthly precipitation.
    pub precipitation: f64,
    /// Mean capacity index; monthly values oscillate around it.
    pub capacity_index: f64,
    /// Relative amplitude of the seasonal capacity cycle.
    pub seasonal_amplitude: f64,
    /// Month (1-12) of peak capacity.
    pub peak_month: u32,
}

impl Default for GeographyParams {
    fn default() -> Self {
        Self {
            vegetation_index: 0.4,
            precipitation: 50.0,
            capacity_index: 0.5,
            seasonal_amplitude: 0.4,
            peak_month: 8,
        }
    }
}

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

fn default_diseases() -> BTreeMap<String, DiseaseParams> {
    BTreeMap::from([
        (
            "cbpp".to_owned(),
            DiseaseParams {
                p_si: 0.2,
                p_ir: 0.1,
                p_id: 0.02,
                p_rs: 0.01,
                p_vs: -1.0,
                infection: InfectionModel::Uniform { p: 0.05 },
                wearoff: Some(WearoffParams {
                    mu: 365.0,
                    sigma: 30.0,
                }),
            },
        ),
        (
            "rvf".to_owned(),
            DiseaseParams {
                p_si: 0.3,
                p_ir: 0.2,
                p_id: 0.05,
                p_rs: 0.0,
                p_vs: -1.0,
                infection: InfectionModel::Harmonic {
                    constant: -4.0,
                    cos: -1.0,
                    sin: 0.5,
                    m: 365.0,
                },
                wearoff: None,
            },
        ),
    ])
}

impl SimConfig {
    /// Load and validate a YAML parameter file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate YAML parameters.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize back to YAML (used for template files).
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yml::to_string(self)?)
    }

    /// Replace the seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.model.seed = seed;
        self
    }

    /// Replace the simulated window.
    pub fn with_window(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.model.start_date = start;
        self.model.end_date = end;
        self
    }

    /// Cap the recorded per-observation series.
    pub fn with_max_records(mut self, max_records: usize) -> Self {
        self.model.max_records = max_records;
        self
    }

    /// Replace the periodic step length.
    pub fn with_step_days(mut self, days: i64) -> Self {
        self.model.time_delta_days = days;
        self
    }

    /// Replace the initial household and animal counts.
    pub fn with_population(mut self, households: usize, animals: usize) -> Self {
        self.setup.n_households = households;
        self.setup.n_animals = animals;
        self
    }

    /// Disease names in id order.
    pub fn disease_names(&self) -> Vec<&str> {
        self.diseases.keys().map(String::as_str).collect()
    }

    /// Reject configurations the engine cannot run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let m = &self.model;
        if m.end_date < m.start_date {
            return Err(ConfigError::invalid(
                "model.end_date",
                format!("{} is before start_date {}", m.end_date, m.start_date),
            ));
        }
        if m.time_delta_days <= 0 {
            return Err(ConfigError::invalid(
                "model.time_delta_days",
                "must be at least 1",
            ));
        }
        if m.disease_timefactor <= 0.0 {
            return Err(ConfigError::invalid(
                "model.disease_timefactor",
                "must be positive",
            ));
        }

        let l = &self.livestock;
        check_probability("livestock.bull_probability", l.bull_probability)?;
        check_probability("livestock.initial_health", l.initial_health)?;
        if l.breed_date_sigma <= 0.0 {
            return Err(ConfigError::invalid(
                "livestock.breed_date_sigma",
                "must be positive",
            ));
        }
        for (field, days) in [
            ("livestock.gestation_period", l.gestation_period),
            ("livestock.nursing_period", l.nursing_period),
            ("livestock.maturity", l.maturity),
            ("livestock.death_mu", l.death_mu),
            ("livestock.death_sigma", l.death_sigma),
            ("setup.min_age", self.setup.min_age),
            ("setup.min_remain", self.setup.min_remain),
        ] {
            check_duration(field, days)?;
        }

        for (name, d) in &self.diseases {
            for (rate, value) in [("p_si", d.p_si), ("p_ir", d.p_ir), ("p_id", d.p_id), ("p_rs", d.p_rs)] {
                if value < 0.0 {
                    return Err(ConfigError::invalid(
                        format!("diseases.{name}.{rate}"),
                        "must not be negative",
                    ));
                }
            }
            if matches!(d.infection, InfectionModel::Harmonic { m, .. } if m <= 0.0) {
                return Err(ConfigError::invalid(
                    format!("diseases.{name}.infection.m"),
                    "period must be positive",
                ));
            }
            if let Some(w) = d.wearoff {
                check_duration(&format!("diseases.{name}.wearoff.mu"), w.mu)?;
                check_duration(&format!("diseases.{name}.wearoff.sigma"), w.sigma)?;
            }
        }

        for (month, day) in &self.agents.vaccination_schedule {
            if !(1..=12).contains(month) || !(1..=31).contains(day) {
                return Err(ConfigError::invalid(
                    "agents.vaccination_schedule",
                    format!("({month}, {day}) is not a calendar day"),
                ));
            }
        }

        check_probability("setup.pct_bull", self.setup.pct_bull)?;
        for (name, pct) in &self.setup.pct_vaccinated {
            check_probability(&format!("setup.pct_vaccinated.{name}"), *pct)?;
        }
        for (name, p) in &self.agents.prob_vaccinate {
            check_probability(&format!("agents.prob_vaccinate.{name}"), *p)?;
        }

        let w = &self.world;
        if w.width == 0 || w.height == 0 {
            return Err(ConfigError::invalid("world", "grid must have at least one cell"));
        }
        if w.villages.is_empty() {
            return Err(ConfigError::invalid("world.villages", "at least one village is required"));
        }
        for v in &w.villages {
            let home = (v.row, v.col);
            let cells = std::iter::once(&home).chain(v.paths.iter().flatten());
            for (row, col) in cells {
                if *row >= w.height || *col >= w.width {
                    return Err(ConfigError::invalid(
                        "world.villages",
                        format!("cell ({row}, {col}) is outside the {}x{} grid", w.height, w.width),
                    ));
                }
            }
        }
        if !(1..=12).contains(&self.geography.peak_month) {
            return Err(ConfigError::invalid("geography.peak_month", "must be 1-12"));
        }
        Ok(())
    }
}

/// Longest duration, in days, any sampled life-cycle or vaccine period may
/// have: a century.
pub const MAX_DURATION_DAYS: f64 = 36_525.0;

fn check_duration(field: &str, days: f64) -> Result<(), ConfigError> {
    if (0.0..=MAX_DURATION_DAYS).contains(&days) {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            field,
            format!("{days} days is not within 0..={MAX_DURATION_DAYS}"),
        ))
    }
}

fn check_probability(field: &str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("{value} is not within 0..=1")))
    }
}
