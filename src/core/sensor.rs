use crate::types::{CompositeError, CompositeResult, DateWindow};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Name of the bit-packed quality band in Collection 2 Level-2 products
pub const QA_BAND: &str = "QA_PIXEL";

/// Supported Landsat missions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Satellite {
    Landsat5,
    Landsat7,
    Landsat8,
    Landsat9,
}

/// Sensor generation; band layout depends only on this
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorGeneration {
    /// TM / ETM+
    Legacy,
    /// OLI / OLI-2
    Modern,
}

/// Logical band roles used by the index formulas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BandRole {
    Blue,
    Green,
    Red,
    Nir,
    Swir1,
    Swir2,
}

/// Static description of one mission
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SatelliteDescriptor {
    pub satellite: Satellite,
    pub id: &'static str,
    pub collection: &'static str,
    pub generation: SensorGeneration,
    pub first_year: i32,
    pub last_year: Option<i32>,
}

const DESCRIPTORS: [SatelliteDescriptor; 4] = [
    SatelliteDescriptor {
        satellite: Satellite::Landsat5,
        id: "LANDSAT_5",
        collection: "LANDSAT/LT05/C02/T1_L2",
        generation: SensorGeneration::Legacy,
        first_year: 1984,
        last_year: Some(2012),
    },
    SatelliteDescriptor {
        satellite: Satellite::Landsat7,
        id: "LANDSAT_7",
        collection: "LANDSAT/LE07/C02/T1_L2",
        generation: SensorGeneration::Legacy,
        first_year: 1999,
        last_year: None,
    },
    SatelliteDescriptor {
        satellite: Satellite::Landsat8,
        id: "LANDSAT_8",
        collection: "LANDSAT/LC08/C02/T1_L2",
        generation: SensorGeneration::Modern,
        first_year: 2013,
        last_year: None,
    },
    SatelliteDescriptor {
        satellite: Satellite::Landsat9,
        id: "LANDSAT_9",
        collection: "LANDSAT/LC09/C02/T1_L2",
        generation: SensorGeneration::Modern,
        first_year: 2021,
        last_year: None,
    },
];

impl Satellite {
    pub const ALL: [Satellite; 4] = [
        Satellite::Landsat5,
        Satellite::Landsat7,
        Satellite::Landsat8,
        Satellite::Landsat9,
    ];

    pub fn descriptor(&self) -> &'static SatelliteDescriptor {
        match self {
            Satellite::Landsat5 => &DESCRIPTORS[0],
            Satellite::Landsat7 => &DESCRIPTORS[1],
            Satellite::Landsat8 => &DESCRIPTORS[2],
            Satellite::Landsat9 => &DESCRIPTORS[3],
        }
    }

    pub fn id(&self) -> &'static str {
        self.descriptor().id
    }

    pub fn generation(&self) -> SensorGeneration {
        self.descriptor().generation
    }

    /// Whether the mission was acquiring during any part of the window
    pub fn operational_during(&self, window: &DateWindow) -> bool {
        let desc = self.descriptor();
        // The window end is exclusive, so its last day belongs to the day before
        let last_day = window.end.pred_opt().unwrap_or(window.end);
        let starts_before_end = desc.first_year <= last_day.year();
        let ends_after_start = desc.last_year.map_or(true, |y| y >= window.start.year());
        starts_before_end && ends_after_start
    }
}

impl FromStr for Satellite {
    type Err = CompositeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "LANDSAT_5" | "LT05" | "L5" => Ok(Satellite::Landsat5),
            "LANDSAT_7" | "LE07" | "L7" => Ok(Satellite::Landsat7),
            "LANDSAT_8" | "LC08" | "L8" => Ok(Satellite::Landsat8),
            "LANDSAT_9" | "LC09" | "L9" => Ok(Satellite::Landsat9),
            _ => Err(CompositeError::UnknownSatellite(s.to_string())),
        }
    }
}

impl std::fmt::Display for Satellite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// Band-role lookup table for one sensor generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorBandProfile {
    pub generation: SensorGeneration,
    blue: &'static str,
    green: &'static str,
    red: &'static str,
    nir: &'static str,
    swir1: &'static str,
    swir2: &'static str,
}

const LEGACY_PROFILE: SensorBandProfile = SensorBandProfile {
    generation: SensorGeneration::Legacy,
    blue: "SR_B1",
    green: "SR_B2",
    red: "SR_B3",
    nir: "SR_B4",
    swir1: "SR_B5",
    swir2: "SR_B7",
};

const MODERN_PROFILE: SensorBandProfile = SensorBandProfile {
    generation: SensorGeneration::Modern,
    blue: "SR_B2",
    green: "SR_B3",
    red: "SR_B4",
    nir: "SR_B5",
    swir1: "SR_B6",
    swir2: "SR_B7",
};

impl SensorBandProfile {
    pub fn for_generation(generation: SensorGeneration) -> &'static SensorBandProfile {
        match generation {
            SensorGeneration::Legacy => &LEGACY_PROFILE,
            SensorGeneration::Modern => &MODERN_PROFILE,
        }
    }

    pub fn for_satellite(satellite: Satellite) -> &'static SensorBandProfile {
        Self::for_generation(satellite.generation())
    }

    /// Resolve a satellite identifier string, e.g. `LANDSAT_8` or `LE07`
    pub fn resolve(identifier: &str) -> CompositeResult<&'static SensorBandProfile> {
        let satellite: Satellite = identifier.parse()?;
        Ok(Self::for_satellite(satellite))
    }

    pub fn band(&self, role: BandRole) -> &'static str {
        match role {
            BandRole::Blue => self.blue,
            BandRole::Green => self.green,
            BandRole::Red => self.red,
            BandRole::Nir => self.nir,
            BandRole::Swir1 => self.swir1,
            BandRole::Swir2 => self.swir2,
        }
    }

    pub fn qa_band(&self) -> &'static str {
        QA_BAND
    }
}
