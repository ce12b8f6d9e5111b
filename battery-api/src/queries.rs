//! Fixed statement text for the `battery_data` table.
//!
//! Column references for field projections are chosen from [`Field`] at
//! compile time; every other input is a bound parameter.

use crate::field::Field;

macro_rules! field_select {
    ($column:literal) => {
        concat!(
            "SELECT timestamp, ",
            $column,
            " AS value FROM battery_data WHERE battery_id = $1 ORDER BY timestamp ASC"
        )
    };
}

macro_rules! field_select_range {
    ($column:literal) => {
        concat!(
            "SELECT timestamp, ",
            $column,
            " AS value FROM battery_data WHERE battery_id = $1 ",
            "AND timestamp BETWEEN $2 AND $3 ORDER BY timestamp ASC"
        )
    };
}

pub const INSERT_SAMPLE: &str = "INSERT INTO battery_data (battery_id, current, voltage, temperature, timestamp) \
     VALUES ($1, $2, $3, $4, $5) \
     RETURNING id, battery_id, current, voltage, temperature, timestamp";

pub const SELECT_ALL: &str = "SELECT id, battery_id, current, voltage, temperature, timestamp \
     FROM battery_data WHERE battery_id = $1 ORDER BY timestamp ASC";

pub const SELECT_BY_TEMPERATURE: &str = "SELECT id, battery_id, current, voltage, temperature, timestamp \
     FROM battery_data WHERE battery_id = $1 \
     AND temperature BETWEEN $2 AND $3 ORDER BY timestamp ASC";

pub fn select_field(field: Field) -> &'static str {
    match field {
        Field::Current => field_select!("current"),
        Field::Voltage => field_select!("voltage"),
        Field::Temperature => field_select!("temperature"),
    }
}

pub fn select_field_in_range(field: Field) -> &'static str {
    match field {
        Field::Current => field_select_range!("current"),
        Field::Voltage => field_select_range!("voltage"),
        Field::Temperature => field_select_range!("temperature"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_COLUMNS: &str = "id, battery_id, current, voltage, temperature, timestamp";

    #[test]
    fn test_full_sample_statements_share_columns() {
        for sql in [INSERT_SAMPLE, SELECT_ALL, SELECT_BY_TEMPERATURE] {
            assert!(sql.contains(SAMPLE_COLUMNS), "{}", sql);
        }
    }

    #[test]
    fn test_field_projection_uses_column() {
        for field in Field::ALL {
            let expected = format!("SELECT timestamp, {} AS value", field.as_str());
            assert!(select_field(field).starts_with(&expected));
            assert!(select_field_in_range(field).starts_with(&expected));
        }
    }

    #[test]
    fn test_reads_are_ordered_by_timestamp() {
        let reads = Field::ALL
            .iter()
            .flat_map(|f| [select_field(*f), select_field_in_range(*f)])
            .chain([SELECT_ALL, SELECT_BY_TEMPERATURE]);

        for sql in reads {
            assert!(sql.ends_with("ORDER BY timestamp ASC"), "{}", sql);
        }
    }

    #[test]
    fn test_range_bounds_are_parameters() {
        assert!(select_field_in_range(Field::Voltage).contains("timestamp BETWEEN $2 AND $3"));
        assert!(SELECT_BY_TEMPERATURE.contains("temperature BETWEEN $2 AND $3"));
    }
}
