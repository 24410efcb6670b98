use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Closed set of consumption categories the calculator understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EmissionCategory {
    #[serde(rename = "electricity")]
    Electricity,
    #[serde(rename = "transport-car")]
    TransportCar,
    #[serde(rename = "transport-bus")]
    TransportBus,
    #[serde(rename = "transport-train")]
    TransportTrain,
    #[serde(rename = "transport-bike")]
    TransportBike,
    #[serde(rename = "transport-electric_car")]
    TransportElectricCar,
    #[serde(rename = "water")]
    Water,
}

impl EmissionCategory {
    pub const ALL: [EmissionCategory; 7] = [
        EmissionCategory::Electricity,
        EmissionCategory::TransportCar,
        EmissionCategory::TransportBus,
        EmissionCategory::TransportTrain,
        EmissionCategory::TransportBike,
        EmissionCategory::TransportElectricCar,
        EmissionCategory::Water,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EmissionCategory::Electricity => "electricity",
            EmissionCategory::TransportCar => "transport-car",
            EmissionCategory::TransportBus => "transport-bus",
            EmissionCategory::TransportTrain => "transport-train",
            EmissionCategory::TransportBike => "transport-bike",
            EmissionCategory::TransportElectricCar => "transport-electric_car",
            EmissionCategory::Water => "water",
        }
    }

    /// Unit the input magnitude is expressed in.
    pub fn unit(self) -> ConsumptionUnit {
        match self {
            EmissionCategory::Electricity => ConsumptionUnit::KilowattHour,
            EmissionCategory::Water => ConsumptionUnit::Liter,
            _ => ConsumptionUnit::Kilometer,
        }
    }

    /// Resolve the two-field API form (`category = "transport"` plus a
    /// `vehicle_type`) as well as the flat `transport-<vehicle>` names.
    pub fn resolve(
        category: &str,
        vehicle_type: Option<&str>,
    ) -> Result<EmissionCategory, ConfigurationError> {
        let category = category.trim();
        if category.eq_ignore_ascii_case("transport") {
            let vehicle = vehicle_type.map(str::trim).unwrap_or("car");
            return format!("transport-{vehicle}").parse();
        }
        category.parse()
    }
}

impl fmt::Display for EmissionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmissionCategory {
    type Err = ConfigurationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        EmissionCategory::ALL
            .into_iter()
            .find(|category| category.as_str() == normalized)
            .ok_or_else(|| ConfigurationError::UnknownCategory(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumptionUnit {
    KilowattHour,
    Kilometer,
    Liter,
}

impl ConsumptionUnit {
    pub fn label(self) -> &'static str {
        match self {
            ConsumptionUnit::KilowattHour => "kWh",
            ConsumptionUnit::Kilometer => "km",
            ConsumptionUnit::Liter => "liters",
        }
    }
}

/// Accepted range for a category's input magnitude.
///
/// The lower bound is always zero; whether zero itself is accepted differs by
/// category (a zero-length trip is recorded, zero kWh is not).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueBounds {
    pub allow_zero: bool,
    pub max: f64,
}

impl ValueBounds {
    pub const ELECTRICITY: ValueBounds = ValueBounds {
        allow_zero: false,
        max: 99_999.0,
    };
    pub const TRANSPORT: ValueBounds = ValueBounds {
        allow_zero: true,
        max: 10_000.0,
    };
    pub const WATER: ValueBounds = ValueBounds {
        allow_zero: false,
        max: 100_000.0,
    };
}

impl Default for ValueBounds {
    fn default() -> Self {
        Self::ELECTRICITY
    }
}

/// Factor, bounds, and unit for a single category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorEntry {
    /// kg CO2e per unit of consumption.
    pub factor: f64,
    pub bounds: ValueBounds,
    pub unit: ConsumptionUnit,
}

/// Static mapping from category to per-unit emission factor.
#[derive(Debug, Clone, PartialEq)]
pub struct EmissionFactorTable {
    entries: BTreeMap<EmissionCategory, FactorEntry>,
}

impl EmissionFactorTable {
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn standard() -> Self {
        let mut entries = BTreeMap::new();
        for (category, factor, bounds) in [
            (EmissionCategory::Electricity, 0.37, ValueBounds::ELECTRICITY),
            (EmissionCategory::TransportCar, 0.21, ValueBounds::TRANSPORT),
            (EmissionCategory::TransportBus, 0.089, ValueBounds::TRANSPORT),
            (EmissionCategory::TransportTrain, 0.041, ValueBounds::TRANSPORT),
            (EmissionCategory::TransportBike, 0.0, ValueBounds::TRANSPORT),
            (
                EmissionCategory::TransportElectricCar,
                0.05,
                ValueBounds::TRANSPORT,
            ),
            (EmissionCategory::Water, 0.0015, ValueBounds::WATER),
        ] {
            entries.insert(
                category,
                FactorEntry {
                    factor,
                    bounds,
                    unit: category.unit(),
                },
            );
        }
        Self { entries }
    }

    /// Add or replace an entry, refusing factors that are negative or not finite.
    pub fn with_entry(
        mut self,
        category: EmissionCategory,
        entry: FactorEntry,
    ) -> Result<Self, ConfigurationError> {
        if !entry.factor.is_finite() || entry.factor < 0.0 {
            return Err(ConfigurationError::NegativeFactor {
                category,
                factor: entry.factor,
            });
        }
        self.entries.insert(category, entry);
        Ok(self)
    }

    pub fn lookup(&self, category: EmissionCategory) -> Result<&FactorEntry, ConfigurationError> {
        self.entries
            .get(&category)
            .ok_or(ConfigurationError::MissingFactor(category))
    }

    pub fn categories(&self) -> impl Iterator<Item = EmissionCategory> + '_ {
        self.entries.keys().copied()
    }
}

impl Default for EmissionFactorTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Programming or deployment defects: never caused by what a user typed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("unknown emission category '{0}'")]
    UnknownCategory(String),
    #[error("no emission factor configured for {0}")]
    MissingFactor(EmissionCategory),
    #[error("emission factor for {category} must be non-negative (got {factor})")]
    NegativeFactor {
        category: EmissionCategory,
        factor: f64,
    },
}
