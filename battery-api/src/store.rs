use crate::db::StorePool;
use crate::errors::{Error, Result};
use crate::field::Field;
use crate::metrics::{INVALID_REQUESTS_TOTAL, QUERIES_TOTAL, SAMPLES_INSERTED_TOTAL};
use crate::model::{FieldValue, NewSample, TelemetrySample};
use crate::queries;
use crate::time;
use crate::validate::{validate_battery_id, validate_finite_bound, validate_sample};
use tracing::{debug, info, warn};

/// Read and write operations on battery telemetry.
///
/// Every input is validated before a connection is requested, so client
/// errors never reach the store. Reads are ordered by ascending timestamp
/// and return an empty vector when nothing matches.
#[derive(Debug, Clone)]
pub struct BatteryStore {
    pool: StorePool,
}

impl BatteryStore {
    pub fn new(pool: StorePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &StorePool {
        &self.pool
    }

    pub async fn insert_sample(&self, sample: &NewSample) -> Result<TelemetrySample> {
        QUERIES_TOTAL.with_label_values(&["insert_sample"]).inc();

        validate_sample(sample).map_err(rejected)?;
        let timestamp = match sample.time.as_deref() {
            Some(raw) => time::normalize(raw).map_err(rejected)?,
            None => time::now(),
        };

        let stored = self
            .pool
            .run("insert_sample", |pool| async move {
                sqlx::query_as::<_, TelemetrySample>(queries::INSERT_SAMPLE)
                    .bind(&sample.battery_id)
                    .bind(sample.current)
                    .bind(sample.voltage)
                    .bind(sample.temperature)
                    .bind(timestamp)
                    .fetch_one(&pool)
                    .await
            })
            .await?;

        SAMPLES_INSERTED_TOTAL.inc();
        info!("Battery data stored: {} (id {})", stored.battery_id, stored.id);
        Ok(stored)
    }

    pub async fn get_all_samples(&self, battery_id: &str) -> Result<Vec<TelemetrySample>> {
        QUERIES_TOTAL.with_label_values(&["get_all_samples"]).inc();
        validate_battery_id(battery_id).map_err(rejected)?;

        let samples = self
            .pool
            .run("get_all_samples", |pool| async move {
                sqlx::query_as::<_, TelemetrySample>(queries::SELECT_ALL)
                    .bind(battery_id)
                    .fetch_all(&pool)
                    .await
            })
            .await?;

        debug!("Retrieved {} samples for battery {}", samples.len(), battery_id);
        Ok(samples)
    }

    pub async fn get_field(&self, battery_id: &str, field: Field) -> Result<Vec<FieldValue>> {
        QUERIES_TOTAL.with_label_values(&["get_field"]).inc();
        validate_battery_id(battery_id).map_err(rejected)?;

        let values = self
            .pool
            .run("get_field", |pool| async move {
                sqlx::query_as::<_, FieldValue>(queries::select_field(field))
                    .bind(battery_id)
                    .fetch_all(&pool)
                    .await
            })
            .await?;

        debug!(
            "Retrieved {} {} values for battery {}",
            values.len(),
            field,
            battery_id
        );
        Ok(values)
    }

    /// Projects `field` for samples with `start <= timestamp <= end`.
    pub async fn get_field_in_range(
        &self,
        battery_id: &str,
        field: Field,
        start: &str,
        end: &str,
    ) -> Result<Vec<FieldValue>> {
        QUERIES_TOTAL.with_label_values(&["get_field_in_range"]).inc();
        validate_battery_id(battery_id).map_err(rejected)?;
        let start = time::normalize(start).map_err(rejected)?;
        let end = time::normalize(end).map_err(rejected)?;

        let values = self
            .pool
            .run("get_field_in_range", |pool| async move {
                sqlx::query_as::<_, FieldValue>(queries::select_field_in_range(field))
                    .bind(battery_id)
                    .bind(start)
                    .bind(end)
                    .fetch_all(&pool)
                    .await
            })
            .await?;

        debug!(
            "Retrieved {} {} values for battery {} between {} and {}",
            values.len(),
            field,
            battery_id,
            time::to_canonical_string(&start),
            time::to_canonical_string(&end)
        );
        Ok(values)
    }

    /// Full samples with `min_temp <= temperature <= max_temp`. An inverted
    /// range matches nothing.
    pub async fn get_by_temperature_range(
        &self,
        battery_id: &str,
        min_temp: f64,
        max_temp: f64,
    ) -> Result<Vec<TelemetrySample>> {
        QUERIES_TOTAL
            .with_label_values(&["get_by_temperature_range"])
            .inc();
        validate_battery_id(battery_id).map_err(rejected)?;
        let min_temp = validate_finite_bound("minTemp", min_temp).map_err(rejected)?;
        let max_temp = validate_finite_bound("maxTemp", max_temp).map_err(rejected)?;

        let samples = self
            .pool
            .run("get_by_temperature_range", |pool| async move {
                sqlx::query_as::<_, TelemetrySample>(queries::SELECT_BY_TEMPERATURE)
                    .bind(battery_id)
                    .bind(min_temp)
                    .bind(max_temp)
                    .fetch_all(&pool)
                    .await
            })
            .await?;

        debug!(
            "Retrieved {} samples for battery {} with temperature between {} and {}",
            samples.len(),
            battery_id,
            min_temp,
            max_temp
        );
        Ok(samples)
    }
}

fn rejected(err: Error) -> Error {
    INVALID_REQUESTS_TOTAL.inc();
    warn!("Rejected input: {}", err);
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::PoolState;
    use crate::test_utils::offline_store;

    fn sample(time: Option<&str>) -> NewSample {
        NewSample {
            battery_id: "B1".to_string(),
            current: 1.5,
            voltage: 3.7,
            temperature: 25.0,
            time: time.map(str::to_string),
        }
    }

    #[test]
    fn test_insert_rejects_bad_timestamp_before_store() {
        tokio_test::block_on(async {
            let store = offline_store();
            let result = store.insert_sample(&sample(Some("yesterday"))).await;
            assert!(matches!(result, Err(Error::InvalidTimestamp(_))));
        });
    }

    #[test]
    fn test_insert_rejects_empty_battery_id() {
        tokio_test::block_on(async {
            let store = offline_store();
            let mut sample = sample(None);
            sample.battery_id = String::new();
            let result = store.insert_sample(&sample).await;
            assert!(matches!(result, Err(Error::Validation(_))));
        });
    }

    #[test]
    fn test_valid_insert_reaches_pool() {
        tokio_test::block_on(async {
            let store = offline_store();
            let result = store.insert_sample(&sample(Some("2024-01-01T00:00:00Z"))).await;
            assert!(matches!(result, Err(Error::Unavailable(PoolState::Unavailable))));
        });
    }

    #[test]
    fn test_range_rejects_bad_bounds_before_store() {
        tokio_test::block_on(async {
            let store = offline_store();

            let result = store
                .get_field_in_range("B1", Field::Current, "2024-01-01", "soon")
                .await;
            assert!(matches!(result, Err(Error::InvalidTimestamp(ref raw)) if raw == "soon"));

            let result = store
                .get_field_in_range("B1", Field::Current, "", "2024-01-01")
                .await;
            assert!(matches!(result, Err(Error::InvalidTimestamp(_))));
        });
    }

    #[test]
    fn test_temperature_range_rejects_nan() {
        tokio_test::block_on(async {
            let store = offline_store();
            let result = store.get_by_temperature_range("B1", f64::NAN, 40.0).await;
            assert!(matches!(
                result,
                Err(Error::InvalidParameter { name: "minTemp", .. })
            ));
        });
    }

    #[test]
    fn test_reads_reject_empty_battery_id() {
        tokio_test::block_on(async {
            let store = offline_store();
            assert!(store.get_all_samples("").await.unwrap_err().is_client_error());
            assert!(store
                .get_field("", Field::Voltage)
                .await
                .unwrap_err()
                .is_client_error());
        });
    }

    #[test]
    fn test_whitespace_battery_id_reaches_pool() {
        tokio_test::block_on(async {
            let store = offline_store();
            assert!(matches!(
                store.get_all_samples(" ").await,
                Err(Error::Unavailable(_))
            ));
            assert!(matches!(
                store.get_field("  ", Field::Voltage).await,
                Err(Error::Unavailable(_))
            ));

            let mut sample = sample(None);
            sample.battery_id = " ".to_string();
            assert!(matches!(
                store.insert_sample(&sample).await,
                Err(Error::Unavailable(_))
            ));
        });
    }

    #[test]
    fn test_valid_reads_reach_pool() {
        tokio_test::block_on(async {
            let store = offline_store();
            assert!(matches!(
                store.get_field("B1", Field::Voltage).await,
                Err(Error::Unavailable(_))
            ));
            assert!(matches!(
                store.get_by_temperature_range("B1", 50.0, 10.0).await,
                Err(Error::Unavailable(_))
            ));
        });
    }
}
