//! TOML-based site configuration and preset definitions.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use chrono::TimeDelta;
use serde::Deserialize;
use thiserror::Error;

use crate::balancing::{BalancingSettings, DEFAULT_MIN_SOC};
use crate::control::{BusSwitchSettings, DEFAULT_INDICATION_HOLD_OFF_SECS};
use crate::error::ControllerError;
use crate::ess::battery::DEFAULT_LOW_SOC_THRESHOLD;
use crate::ess::{EssId, GridMode};
use crate::points::{ContactorPort, PointAddress};
use crate::topology::{Bus, TopologyCatalog};

/// PLC load-enable channels of the Sambia site, in write order.
pub const DEFAULT_LOADS: &[&str] = &[
    "PivotOn",
    "OfficeOn",
    "TraineeCenterOn",
    "Borehole1On",
    "Borehole2On",
    "Borehole3On",
    "Clima1On",
    "Clima2On",
    "WaterlevelBorehole1On",
    "WaterlevelBorehole2On",
    "WaterlevelBorehole3On",
];

/// Longest accepted indication hold-off (one day).
pub const MAX_INDICATION_HOLD_OFF_SECS: i64 = 86_400;

/// Smallest and largest number of ESS units one controller may switch.
pub const MIN_ESS: usize = 2;
pub const MAX_ESS: usize = 4;

/// Top-level site configuration parsed from TOML.
///
/// Load from TOML with [`SiteConfig::from_toml_file`] or start from one of
/// the [`SiteConfig::PRESETS`].
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// Bus switch controller parameters.
    #[serde(default)]
    pub controller: ControllerConfig,
    /// Contactors connecting each ESS to supply bus 1. Order defines the
    /// ESS order used for tie-breaking.
    #[serde(default)]
    pub bus1: Vec<BusMapping>,
    /// Contactors connecting each ESS to supply bus 2.
    #[serde(default)]
    pub bus2: Vec<BusMapping>,
    /// Optional grid-meter balancing of one ESS.
    #[serde(default)]
    pub balancing: Option<BalancingConfig>,
    /// Simulator parameters; ignored by a field deployment.
    #[serde(default)]
    pub simulation: SimulationConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControllerConfig {
    pub id: String,
    /// Component carrying the load-enable outputs.
    pub plc_id: String,
    /// Indication output for bus 1, as `component/channel`.
    pub bus1_indication: String,
    pub bus2_indication: String,
    /// SoC (percent) at or below which a unit is `Low`.
    pub low_soc_threshold: u8,
    /// Minimum seconds between two indication writes.
    pub indication_hold_off_secs: i64,
    /// Fail the cycle instead of ranking around an unreadable SoC.
    pub require_all_soc: bool,
    /// Load-enable channels on `plc_id`, in write order.
    pub loads: Vec<String>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            id: "ctrlSupplyBusSwitch0".to_string(),
            plc_id: "plc0".to_string(),
            bus1_indication: "io1/SupplyBus1On".to_string(),
            bus2_indication: "io1/SupplyBus2On".to_string(),
            low_soc_threshold: DEFAULT_LOW_SOC_THRESHOLD,
            indication_hold_off_secs: DEFAULT_INDICATION_HOLD_OFF_SECS,
            require_all_soc: false,
            loads: DEFAULT_LOADS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// One ESS-to-bus contactor.
///
/// Accepts both `switch_address` (TOML) and `switchAddress` (the JSON
/// mapping format of the field installations).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BusMapping {
    pub ess: String,
    #[serde(alias = "switchAddress")]
    pub switch_address: String,
}

impl BusMapping {
    pub fn new(ess: &str, switch_address: &str) -> Self {
        Self {
            ess: ess.to_string(),
            switch_address: switch_address.to_string(),
        }
    }

    /// Parses a JSON array such as
    /// `[{"ess":"ess1","switchAddress":"io0/DigitalOutput1"}]`.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the string is not such an array.
    pub fn from_json_str(s: &str) -> Result<Vec<Self>, ConfigError> {
        serde_json::from_str(s).map_err(|e| ConfigError::new("bus_mapping", e.to_string()))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BalancingConfig {
    pub id: String,
    pub ess: String,
    /// Grid meter component.
    pub meter: String,
    pub min_soc: u8,
}

impl Default for BalancingConfig {
    fn default() -> Self {
        Self {
            id: "ctrlBalancing0".to_string(),
            ess: "ess1".to_string(),
            meter: "meter0".to_string(),
            min_soc: DEFAULT_MIN_SOC,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Number of controller cycles to run (must be > 0).
    pub cycles: usize,
    /// Simulated seconds between cycles (must be > 0).
    pub cycle_period_secs: i64,
    /// Master random seed.
    pub seed: u64,
    /// Initial SoC per ESS in percent; unlisted units start at 50.
    pub initial_soc: BTreeMap<String, f64>,
    /// `"on_grid"`, `"off_grid"` or `"undefined"` per ESS; unlisted units
    /// are on-grid.
    pub grid_mode: BTreeMap<String, String>,
    /// Cycle from which every unit reports off-grid.
    pub outage_cycle: Option<usize>,
    /// Standard deviation of the per-cycle SoC noise (percent points).
    pub soc_drift_std: f64,
    /// SoC lost per cycle by a unit carrying a bus (percent points).
    pub connected_soc_drain: f64,
    /// SoC regained per cycle by an idle unit (percent points).
    pub idle_soc_recovery: f64,
    /// Site consumption shared by the connected units (W).
    pub site_load_w: i64,
    /// Discharge limit of a unit with charge left (W).
    pub max_discharge_w: i64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            cycles: 20,
            cycle_period_secs: 1,
            seed: 42,
            initial_soc: BTreeMap::new(),
            grid_mode: BTreeMap::new(),
            outage_cycle: None,
            soc_drift_std: 0.2,
            connected_soc_drain: 0.5,
            idle_soc_recovery: 0.1,
            site_load_w: 4_000,
            max_discharge_w: 5_000,
        }
    }
}

impl SimulationConfig {
    pub const DEFAULT_INITIAL_SOC: f64 = 50.0;

    pub fn initial_soc_of(&self, ess: &str) -> f64 {
        self.initial_soc
            .get(ess)
            .copied()
            .unwrap_or(Self::DEFAULT_INITIAL_SOC)
    }

    /// Configured grid mode of `ess`; unknown names read as `Undefined`.
    pub fn grid_mode_of(&self, ess: &str) -> GridMode {
        self.grid_mode
            .get(ess)
            .map_or(GridMode::OnGrid, |s| parse_grid_mode(s).unwrap_or(GridMode::Undefined))
    }
}

fn parse_grid_mode(s: &str) -> Option<GridMode> {
    match s {
        "on_grid" => Some(GridMode::OnGrid),
        "off_grid" => Some(GridMode::OffGrid),
        "undefined" => Some(GridMode::Undefined),
        _ => None,
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"simulation.cycles"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<ConfigError> for ControllerError {
    fn from(err: ConfigError) -> Self {
        ControllerError::configuration(format!("{}: {}", err.field, err.message))
    }
}

fn mappings(ess_count: usize) -> (Vec<BusMapping>, Vec<BusMapping>) {
    (1..=ess_count)
        .map(|i| {
            (
                BusMapping::new(&format!("ess{i}"), &format!("io0/DigitalOutput{}", i * 2 - 1)),
                BusMapping::new(&format!("ess{i}"), &format!("io0/DigitalOutput{}", i * 2)),
            )
        })
        .unzip()
}

fn soc_map(values: &[(&str, f64)]) -> BTreeMap<String, f64> {
    values.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

impl SiteConfig {
    /// The four-unit Sambia installation, on-grid, with meter balancing.
    pub fn sambia() -> Self {
        let (bus1, bus2) = mappings(4);
        Self {
            controller: ControllerConfig::default(),
            bus1,
            bus2,
            balancing: Some(BalancingConfig::default()),
            simulation: SimulationConfig {
                initial_soc: soc_map(&[
                    ("ess1", 80.0),
                    ("ess2", 65.0),
                    ("ess3", 50.0),
                    ("ess4", 35.0),
                ]),
                ..SimulationConfig::default()
            },
        }
    }

    /// Minimal two-unit site without balancing.
    pub fn two_ess() -> Self {
        let (bus1, bus2) = mappings(2);
        Self {
            controller: ControllerConfig::default(),
            bus1,
            bus2,
            balancing: None,
            simulation: SimulationConfig {
                initial_soc: soc_map(&[("ess1", 40.0), ("ess2", 70.0)]),
                ..SimulationConfig::default()
            },
        }
    }

    /// Three units off-grid, one of the two fullest already low.
    pub fn islanded() -> Self {
        let (bus1, bus2) = mappings(3);
        Self {
            controller: ControllerConfig::default(),
            bus1,
            bus2,
            balancing: None,
            simulation: SimulationConfig {
                initial_soc: soc_map(&[("ess1", 90.0), ("ess2", 4.5), ("ess3", 3.0)]),
                grid_mode: ["ess1", "ess2", "ess3"]
                    .iter()
                    .map(|id| (id.to_string(), "off_grid".to_string()))
                    .collect(),
                soc_drift_std: 0.0,
                idle_soc_recovery: 0.0,
                ..SimulationConfig::default()
            },
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["sambia", "two_ess", "islanded"];

    /// Loads a site from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "sambia" => Ok(Self::sambia()),
            "two_ess" => Ok(Self::two_ess()),
            "islanded" => Ok(Self::islanded()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a site from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("config", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a site from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// ESS ids in bus 1 order.
    pub fn ess_ids(&self) -> Vec<EssId> {
        self.bus1.iter().map(|m| EssId::from(m.ess.as_str())).collect()
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        self.validate_controller(&mut errors);
        self.validate_buses(&mut errors);
        self.validate_balancing(&mut errors);
        self.validate_simulation(&mut errors);
        errors
    }

    fn validate_controller(&self, errors: &mut Vec<ConfigError>) {
        let c = &self.controller;
        if c.id.is_empty() {
            errors.push(ConfigError::new("controller.id", "must not be empty"));
        }
        for (field, value) in [
            ("controller.bus1_indication", &c.bus1_indication),
            ("controller.bus2_indication", &c.bus2_indication),
        ] {
            if let Err(e) = value.parse::<PointAddress>() {
                errors.push(ConfigError::new(field, e.to_string()));
            }
        }
        if c.bus1_indication == c.bus2_indication {
            errors.push(ConfigError::new(
                "controller.bus2_indication",
                "must differ from controller.bus1_indication",
            ));
        }
        for (i, load) in c.loads.iter().enumerate() {
            if let Err(e) = PointAddress::new(&c.plc_id, load) {
                errors.push(ConfigError::new(format!("controller.loads[{i}]"), e.to_string()));
            }
        }
        if c.low_soc_threshold > 100 {
            errors.push(ConfigError::new(
                "controller.low_soc_threshold",
                "must be in [0, 100]",
            ));
        }
        if !(0..=MAX_INDICATION_HOLD_OFF_SECS).contains(&c.indication_hold_off_secs) {
            errors.push(ConfigError::new(
                "controller.indication_hold_off_secs",
                format!("must be in [0, {MAX_INDICATION_HOLD_OFF_SECS}]"),
            ));
        }
    }

    fn validate_buses(&self, errors: &mut Vec<ConfigError>) {
        let mut ids = Vec::with_capacity(2);
        for (field, list) in [("bus1", &self.bus1), ("bus2", &self.bus2)] {
            if !(MIN_ESS..=MAX_ESS).contains(&list.len()) {
                errors.push(ConfigError::new(
                    field,
                    format!("must list {MIN_ESS} to {MAX_ESS} ESS, got {}", list.len()),
                ));
            }
            let mut seen = BTreeSet::new();
            for (i, mapping) in list.iter().enumerate() {
                if mapping.ess.is_empty() {
                    errors.push(ConfigError::new(format!("{field}[{i}].ess"), "must not be empty"));
                } else if !seen.insert(mapping.ess.as_str()) {
                    errors.push(ConfigError::new(
                        format!("{field}[{i}].ess"),
                        format!("\"{}\" listed more than once", mapping.ess),
                    ));
                }
                if let Err(e) = mapping.switch_address.parse::<PointAddress>() {
                    errors.push(ConfigError::new(
                        format!("{field}[{i}].switch_address"),
                        e.to_string(),
                    ));
                }
            }
            ids.push(seen);
        }
        if let [bus1, bus2] = ids.as_slice() {
            if bus1 != bus2 {
                errors.push(ConfigError::new(
                    "bus2",
                    "must list exactly the ESS of bus1",
                ));
            }
        }

        let mut addresses = BTreeSet::new();
        for mapping in self.bus1.iter().chain(&self.bus2) {
            if !addresses.insert(mapping.switch_address.as_str()) {
                errors.push(ConfigError::new(
                    "bus2",
                    format!("switch address {} used twice", mapping.switch_address),
                ));
            }
        }
    }

    fn validate_balancing(&self, errors: &mut Vec<ConfigError>) {
        let Some(b) = &self.balancing else {
            return;
        };
        if b.id.is_empty() {
            errors.push(ConfigError::new("balancing.id", "must not be empty"));
        }
        if b.meter.is_empty() || b.meter.contains('/') {
            errors.push(ConfigError::new("balancing.meter", "must be a component id"));
        }
        if !self.bus1.iter().any(|m| m.ess == b.ess) {
            errors.push(ConfigError::new(
                "balancing.ess",
                format!("\"{}\" is not a switched ESS", b.ess),
            ));
        }
        if b.min_soc > 100 {
            errors.push(ConfigError::new("balancing.min_soc", "must be in [0, 100]"));
        }
    }

    fn validate_simulation(&self, errors: &mut Vec<ConfigError>) {
        let s = &self.simulation;
        if s.cycles == 0 {
            errors.push(ConfigError::new("simulation.cycles", "must be > 0"));
        }
        if s.cycle_period_secs <= 0 {
            errors.push(ConfigError::new("simulation.cycle_period_secs", "must be > 0"));
        }
        let known = |ess: &str| self.bus1.iter().any(|m| m.ess == ess);
        for (ess, soc) in &s.initial_soc {
            if !known(ess.as_str()) {
                errors.push(ConfigError::new(
                    format!("simulation.initial_soc.{ess}"),
                    "unknown ESS",
                ));
            }
            if !(0.0..=100.0).contains(soc) {
                errors.push(ConfigError::new(
                    format!("simulation.initial_soc.{ess}"),
                    "must be in [0.0, 100.0]",
                ));
            }
        }
        for (ess, mode) in &s.grid_mode {
            if !known(ess.as_str()) {
                errors.push(ConfigError::new(
                    format!("simulation.grid_mode.{ess}"),
                    "unknown ESS",
                ));
            }
            if parse_grid_mode(mode).is_none() {
                errors.push(ConfigError::new(
                    format!("simulation.grid_mode.{ess}"),
                    format!("must be \"on_grid\", \"off_grid\" or \"undefined\", got \"{mode}\""),
                ));
            }
        }
        for (field, value) in [
            ("simulation.soc_drift_std", s.soc_drift_std),
            ("simulation.connected_soc_drain", s.connected_soc_drain),
            ("simulation.idle_soc_recovery", s.idle_soc_recovery),
        ] {
            if !value.is_finite() || value < 0.0 {
                errors.push(ConfigError::new(field, "must be a finite value >= 0"));
            }
        }
        if s.site_load_w < 0 {
            errors.push(ConfigError::new("simulation.site_load_w", "must be >= 0"));
        }
        if s.max_discharge_w < 0 {
            errors.push(ConfigError::new("simulation.max_discharge_w", "must be >= 0"));
        }
    }
}

fn parse_address(field: &str, value: &str) -> Result<PointAddress, ConfigError> {
    value
        .parse()
        .map_err(|e: ControllerError| ConfigError::new(field, e.to_string()))
}

impl TryFrom<&SiteConfig> for BusSwitchSettings {
    type Error = ControllerError;

    /// Builds validated controller settings.
    ///
    /// Runs [`SiteConfig::validate`] first; the first violation is returned
    /// as a `Configuration` error.
    fn try_from(cfg: &SiteConfig) -> Result<Self, ControllerError> {
        if let Some(err) = cfg.validate().into_iter().next() {
            return Err(err.into());
        }
        let c = &cfg.controller;

        let mut contactors = Vec::with_capacity(cfg.bus1.len() + cfg.bus2.len());
        for (bus, list, field) in [(Bus::Bus1, &cfg.bus1, "bus1"), (Bus::Bus2, &cfg.bus2, "bus2")] {
            for mapping in list {
                let address = parse_address(field, &mapping.switch_address)?;
                contactors.push(ContactorPort::new(EssId::from(mapping.ess.as_str()), bus, address));
            }
        }
        let catalog = TopologyCatalog::new(cfg.ess_ids(), contactors)?;

        let loads = c
            .loads
            .iter()
            .map(|load| PointAddress::new(&c.plc_id, load))
            .collect::<Result<Vec<_>, _>>()?;
        let indication_hold_off = TimeDelta::try_seconds(c.indication_hold_off_secs)
            .ok_or_else(|| {
                ControllerError::configuration("controller.indication_hold_off_secs is out of range")
            })?;

        Ok(Self {
            id: c.id.clone(),
            catalog,
            bus1_indication: parse_address("controller.bus1_indication", &c.bus1_indication)?,
            bus2_indication: parse_address("controller.bus2_indication", &c.bus2_indication)?,
            loads,
            low_soc_threshold: c.low_soc_threshold,
            indication_hold_off,
            require_all_soc: c.require_all_soc,
        })
    }
}

impl SiteConfig {
    /// Balancing settings, if a `[balancing]` section is present.
    pub fn balancing_settings(&self) -> Option<BalancingSettings> {
        self.balancing.as_ref().map(|b| BalancingSettings {
            id: b.id.clone(),
            ess: EssId::from(b.ess.as_str()),
            meter: b.meter.clone(),
            min_soc: b.min_soc,
        })
    }
}
