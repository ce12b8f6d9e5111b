use crate::errors::{Error, Result};
use crate::model::NewSample;

/// Validates a write payload before it reaches the store
pub fn validate_sample(sample: &NewSample) -> Result<()> {
    validate_battery_id(&sample.battery_id)?;

    for (name, value) in [
        ("current", sample.current),
        ("voltage", sample.voltage),
        ("temperature", sample.temperature),
    ] {
        if !value.is_finite() {
            return Err(Error::Validation(format!(
                "{} must be a finite number, got {}",
                name, value
            )));
        }
    }

    Ok(())
}

pub fn validate_battery_id(battery_id: &str) -> Result<()> {
    if battery_id.is_empty() {
        return Err(Error::Validation("Battery ID cannot be empty".to_string()));
    }
    Ok(())
}

/// Returns the bound when present and non-blank.
pub fn require_bound<'a>(name: &'static str, value: Option<&'a str>) -> Result<&'a str> {
    match value.map(str::trim) {
        Some(bound) if !bound.is_empty() => Ok(bound),
        _ => Err(Error::MissingParameter(name)),
    }
}

/// Parses a mandatory numeric bound such as `minTemp`.
pub fn parse_numeric_bound(name: &'static str, value: Option<&str>) -> Result<f64> {
    let raw = require_bound(name, value)?;
    let parsed: f64 = raw.parse().map_err(|_| Error::InvalidParameter {
        name,
        value: raw.to_string(),
    })?;

    validate_finite_bound(name, parsed)
}

pub fn validate_finite_bound(name: &'static str, value: f64) -> Result<f64> {
    if !value.is_finite() {
        return Err(Error::InvalidParameter {
            name,
            value: value.to_string(),
        });
    }
    Ok(value)
}
