use crate::errors::Error;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Measurement column that may be projected by a field query.
///
/// The set is closed: the only way to obtain a `Field` from caller input is
/// [`Field::validate`] (or `str::parse`), which matches names exactly and
/// case-sensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Current,
    Voltage,
    Temperature,
}

impl Field {
    pub const ALL: [Field; 3] = [Field::Current, Field::Voltage, Field::Temperature];

    pub fn validate(name: &str) -> Result<Field, Error> {
        match name {
            "current" => Ok(Field::Current),
            "voltage" => Ok(Field::Voltage),
            "temperature" => Ok(Field::Temperature),
            other => Err(Error::InvalidField(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Current => "current",
            Field::Voltage => "voltage",
            Field::Temperature => "temperature",
        }
    }
}

impl FromStr for Field {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::validate(s)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
