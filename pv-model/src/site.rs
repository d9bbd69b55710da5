use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

/// Geographic coordinates for a location
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export, export_to = "./site.ts")]
pub struct Coordinates {
    /// Latitude in decimal degrees (-90 to 90)
    pub latitude: f64,
    /// Longitude in decimal degrees (-180 to 180)
    pub longitude: f64,
}

impl Coordinates {
    /// Create new coordinates with validation
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, String> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(format!(
                "Invalid latitude: {}. Must be between -90 and 90",
                latitude
            ));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(format!(
                "Invalid longitude: {}. Must be between -180 and 180",
                longitude
            ));
        }

        Ok(Coordinates {
            latitude,
            longitude,
        })
    }
}

/// The installation site handed to the yield estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export, export_to = "./site.ts")]
pub struct Site {
    /// Human-readable name for the site
    pub name: String,
    pub coordinates: Coordinates,
    /// Long-term average global irradiance on the horizontal in kWh/m²/day
    pub irradiance_kwh_m2_day: f64,
}

impl Site {
    pub fn new(name: String, coordinates: Coordinates, irradiance_kwh_m2_day: f64) -> Self {
        Site {
            name,
            coordinates,
            irradiance_kwh_m2_day,
        }
    }
}
