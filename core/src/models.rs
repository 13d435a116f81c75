use anyhow::{Result, bail};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Miles to kilometers.
pub const MILES_TO_KM: f64 = 1.60934;
/// Liters to imperial gallons.
pub const LITERS_TO_GALLONS: f64 = 0.219969;
/// Upper bound for an embedded receipt photo (base64 payload).
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// One fuel fill-up. The two `mileage_*` fields are materialized from
/// (miles, liters) on every write and are never accepted as input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MileageEntry {
    pub id: String,
    pub date: String,
    pub miles: f64,
    pub liters: f64,
    pub price_pence: f64,
    pub mileage_km_per_l: f64,
    pub mileage_mpg: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub image: Option<String>,
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct NewMileageEntry {
    pub date: String,
    pub miles: f64,
    pub liters: f64,
    pub price_pence: f64,
    pub image: Option<String>,
}

/// Partial update. `image` is double-optional so a present `None` clears
/// the stored photo.
#[derive(Debug, Clone, Default)]
#[allow(clippy::option_option)]
pub struct UpdateMileageEntry {
    pub date: Option<String>,
    pub miles: Option<f64>,
    pub liters: Option<f64>,
    pub price_pence: Option<f64>,
    pub image: Option<Option<String>>,
}

/// Derived efficiency figures, rounded to 2 decimals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mileage {
    pub km_per_l: f64,
    pub mpg: f64,
}

#[must_use]
pub fn calculate_mileage(miles: f64, liters: f64) -> Mileage {
    let km = miles * MILES_TO_KM;
    Mileage {
        km_per_l: round2(km / liters),
        mpg: round2(miles / (liters * LITERS_TO_GALLONS)),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// --- Settings ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MileageUnit {
    #[serde(rename = "km/l")]
    KmPerL,
    #[serde(rename = "mpg")]
    Mpg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThemeMode {
    #[serde(rename = "light")]
    Light,
    #[serde(rename = "dark")]
    Dark,
}

/// Singleton per device; created with defaults on first access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    pub mileage_unit: MileageUnit,
    pub theme: ThemeMode,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            mileage_unit: MileageUnit::KmPerL,
            theme: ThemeMode::Light,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateAppSettings {
    pub mileage_unit: Option<MileageUnit>,
    pub theme: Option<ThemeMode>,
}

// --- Validation ---

fn validate_miles(miles: f64) -> Result<()> {
    if miles.is_nan() || miles <= 0.0 {
        bail!("Miles must be a positive number");
    }
    if miles > 10_000.0 {
        bail!("Miles seems too high (got {miles})");
    }
    Ok(())
}

fn validate_liters(liters: f64) -> Result<()> {
    if liters.is_nan() || liters <= 0.0 {
        bail!("Liters must be a positive number");
    }
    if liters > 200.0 {
        bail!("Liters seems too high (got {liters})");
    }
    Ok(())
}

fn validate_price(price_pence: f64) -> Result<()> {
    if price_pence.is_nan() || price_pence <= 0.0 {
        bail!("Price must be a positive number");
    }
    if price_pence > 500.0 {
        bail!("Price per liter seems too high (got {price_pence})");
    }
    Ok(())
}

/// Valid calendar date, not in the future.
pub fn validate_entry_date(date: &str) -> Result<NaiveDate> {
    let parsed = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| anyhow::anyhow!("Invalid date '{date}'. Must be YYYY-MM-DD"))?;
    let today = chrono::Local::now().date_naive();
    if parsed > today {
        bail!("Date cannot be in the future");
    }
    Ok(parsed)
}

fn validate_image(image: &str) -> Result<()> {
    if image.len() > MAX_IMAGE_BYTES {
        bail!("Image must be less than 5MB");
    }
    Ok(())
}

pub fn validate_new_entry(entry: &NewMileageEntry) -> Result<()> {
    validate_miles(entry.miles)?;
    validate_liters(entry.liters)?;
    validate_price(entry.price_pence)?;
    validate_entry_date(&entry.date)?;
    if let Some(image) = &entry.image {
        validate_image(image)?;
    }
    Ok(())
}

/// Validate only the fields a patch actually carries.
pub fn validate_update_entry(update: &UpdateMileageEntry) -> Result<()> {
    if let Some(miles) = update.miles {
        validate_miles(miles)?;
    }
    if let Some(liters) = update.liters {
        validate_liters(liters)?;
    }
    if let Some(price) = update.price_pence {
        validate_price(price)?;
    }
    if let Some(date) = &update.date {
        validate_entry_date(date)?;
    }
    if let Some(Some(image)) = &update.image {
        validate_image(image)?;
    }
    Ok(())
}
