//! SQLite table store.

use std::{fmt, time::Duration};

use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, warn};
use rusqlite::{
    Connection, Transaction, TransactionBehavior, params,
    types::{Type, Value as SqlValue},
};
use serde_json::{Map, Number};
use thiserror::Error;

use super::{FeatureStore, StoreError};
use crate::config::is_sql_identifier;
use crate::{Feature, FeatureCollection, FeatureId, Geometry, Properties};

/// How long a writer waits for a competing transaction to finish.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Error raised when a stored row cannot be turned back into a feature.
#[derive(Debug, Error)]
pub enum SqliteRowError {
    /// The `id` column held no integer, real or text value.
    #[error("row {fid} has an identifier of SQLite type {found}")]
    InvalidIdentifier {
        /// Row key.
        fid: i64,
        /// Storage class found in the column.
        found: Type,
    },
    /// A JSON column failed to parse.
    #[error("row {fid} has invalid JSON in column `{column}`: {source}")]
    InvalidJson {
        /// Row key.
        fid: i64,
        /// Offending column.
        column: &'static str,
        /// JSON decoding failure.
        #[source]
        source: serde_json::Error,
    },
    /// Generic SQLite error when reading rows.
    #[error(transparent)]
    Database(#[from] rusqlite::Error),
}

/// Store keeping one feature per row of a SQLite table.
///
/// The table is created on first open:
///
/// ```sql
/// CREATE TABLE <table> (
///     fid INTEGER PRIMARY KEY AUTOINCREMENT,
///     id NOT NULL UNIQUE,
///     geometry TEXT,
///     properties TEXT NOT NULL
/// )
/// ```
///
/// `id` has no declared type so integer identifiers stay integers and text
/// identifiers stay text. Rows are read in `fid` order. Feature foreign
/// members are not stored.
pub struct SqliteStore {
    path: Utf8PathBuf,
    table: String,
    locator: String,
}

impl fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteStore")
            .field("path", &self.path)
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open the database at `path`, creating it and `table` if needed.
    ///
    /// Returns [`StoreError::InvalidTable`] when `table` is not a plain SQL
    /// identifier, before touching the database.
    pub fn open(
        path: impl Into<Utf8PathBuf>,
        table: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let path = path.into();
        let table = table.into();
        if !is_sql_identifier(&table) {
            return Err(StoreError::InvalidTable { table });
        }
        let locator = format!("{path}#{table}");
        let store = Self {
            path,
            table,
            locator,
        };
        let connection = store.connect()?;
        connection
            .execute_batch(&store.create_table_sql())
            .map_err(|source| StoreError::unavailable(store.locator(), source))?;
        debug!("opened SQLite store {}", store.locator);
        Ok(store)
    }

    /// Location of the database file.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Table holding the features.
    pub fn table(&self) -> &str {
        &self.table
    }

    fn create_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS \"{}\" (
                fid INTEGER PRIMARY KEY AUTOINCREMENT,
                id NOT NULL UNIQUE,
                geometry TEXT,
                properties TEXT NOT NULL
            )",
            self.table
        )
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        let connection = Connection::open(&self.path)
            .map_err(|source| StoreError::unavailable(self.locator(), source))?;
        connection
            .busy_timeout(BUSY_TIMEOUT)
            .map_err(|source| StoreError::unavailable(self.locator(), source))?;
        Ok(connection)
    }

    fn read_rows(&self, connection: &Connection) -> Result<FeatureCollection, SqliteRowError> {
        let sql = format!(
            "SELECT fid, id, geometry, properties FROM \"{}\" ORDER BY fid",
            self.table
        );
        let mut statement = connection.prepare(&sql)?;
        let mut rows = statement.query([])?;
        let mut features = Vec::new();

        while let Some(row) = rows.next()? {
            let fid: i64 = row.get(0)?;
            let raw_id = row.get::<_, SqlValue>(1)?;
            let found = raw_id.data_type();
            let id = match raw_id {
                SqlValue::Integer(value) => Some(FeatureId::Integer(value)),
                SqlValue::Real(value) => Number::from_f64(value).map(FeatureId::Number),
                SqlValue::Text(value) => Some(FeatureId::Text(value)),
                SqlValue::Null | SqlValue::Blob(_) => None,
            }
            .ok_or(SqliteRowError::InvalidIdentifier { fid, found })?;
            let geometry = row
                .get::<_, Option<String>>(2)?
                .map(|text| serde_json::from_str::<Geometry>(&text))
                .transpose()
                .map_err(|source| SqliteRowError::InvalidJson {
                    fid,
                    column: "geometry",
                    source,
                })?;
            let properties_text: String = row.get(3)?;
            let properties: Properties = serde_json::from_str::<Option<Properties>>(
                &properties_text,
            )
            .map_err(|source| SqliteRowError::InvalidJson {
                fid,
                column: "properties",
                source,
            })?
            .unwrap_or_else(Map::new);
            features.push(Feature::new(geometry, properties).with_id(id));
        }

        Ok(FeatureCollection::new(features))
    }

    fn write_rows(
        &self,
        transaction: &Transaction<'_>,
        collection: &FeatureCollection,
    ) -> Result<(), rusqlite::Error> {
        transaction.execute(&format!("DELETE FROM \"{}\"", self.table), [])?;
        let sql = format!(
            "INSERT INTO \"{}\" (id, geometry, properties) VALUES (?1, ?2, ?3)",
            self.table
        );
        let mut statement = transaction.prepare(&sql)?;
        for feature in collection {
            let Some(id) = feature.id.as_ref() else {
                warn!("skipping feature without a top-level id while writing {}", self.locator);
                continue;
            };
            let id = match id {
                FeatureId::Integer(value) => SqlValue::Integer(*value),
                // SQLite integers are signed 64-bit; wider integers go in as text.
                FeatureId::Number(number) => number
                    .as_f64()
                    .filter(|_| number.is_f64())
                    .map_or_else(|| SqlValue::Text(number.to_string()), SqlValue::Real),
                FeatureId::Text(value) => SqlValue::Text(value.clone()),
            };
            let geometry = feature
                .geometry
                .as_ref()
                .map(|geometry| geometry.as_value().to_string());
            let properties = serde_json::Value::Object(feature.properties.clone()).to_string();
            statement.execute(params![id, geometry, properties])?;
        }
        Ok(())
    }
}

impl FeatureStore for SqliteStore {
    fn locator(&self) -> &str {
        &self.locator
    }

    fn load(&self) -> Result<FeatureCollection, StoreError> {
        let connection = self.connect()?;
        let collection = self
            .read_rows(&connection)
            .map_err(|source| StoreError::unavailable(self.locator(), source))?;
        debug!("loaded {} features from {}", collection.len(), self.locator);
        Ok(collection)
    }

    fn persist(&self, collection: &FeatureCollection) -> Result<(), StoreError> {
        let mut connection = self.connect()?;
        let transaction = connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|source| StoreError::write(self.locator(), source))?;
        self.write_rows(&transaction, collection)
            .and_then(|()| transaction.commit())
            .map_err(|source| StoreError::write(self.locator(), source))?;
        debug!("wrote {} features to {}", collection.len(), self.locator);
        Ok(())
    }

    /// Run the whole load, apply and write sequence inside one `IMMEDIATE`
    /// transaction, so concurrent writers queue on the database lock.
    fn transact<T, E, F>(&self, apply: F) -> Result<T, E>
    where
        E: From<StoreError>,
        F: FnOnce(&mut FeatureCollection) -> Result<T, E>,
    {
        let mut connection = self.connect()?;
        let transaction = connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|source| StoreError::unavailable(self.locator(), source))?;
        let mut collection = self
            .read_rows(&transaction)
            .map_err(|source| StoreError::unavailable(self.locator(), source))?;
        let outcome = apply(&mut collection)?;
        self.write_rows(&transaction, &collection)
            .and_then(|()| transaction.commit())
            .map_err(|source| StoreError::write(self.locator(), source))?;
        debug!("committed {} features to {}", collection.len(), self.locator);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use serde_json::json;
    use tempfile::TempDir;

    #[fixture]
    fn temp_db() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().expect("create temp dir");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("features.db"))
            .expect("utf-8 temp path");
        (dir, path)
    }

    fn island(id: impl Into<FeatureId>, name: &str) -> Feature {
        let properties = json!({ "name": name });
        Feature::new(
            Some(Geometry::point(125.6, 10.1)),
            properties.as_object().cloned().unwrap_or_default(),
        )
        .with_id(id)
    }

    #[rstest]
    fn new_table_loads_empty(temp_db: (TempDir, Utf8PathBuf)) {
        let (_dir, path) = temp_db;
        let store = SqliteStore::open(&path, "islands").expect("open store");
        assert!(store.load().expect("load").is_empty());
    }

    #[rstest]
    fn persist_keeps_order_and_identifier_types(temp_db: (TempDir, Utf8PathBuf)) {
        let (_dir, path) = temp_db;
        let store = SqliteStore::open(&path, "islands").expect("open store");
        let collection = FeatureCollection::new(vec![
            island(7, "Dinagat"),
            island("abc", "Null Island"),
            island(2, "Siargao"),
        ]);
        store.persist(&collection).expect("persist");

        let loaded = store.load().expect("load");
        assert_eq!(loaded.features, collection.features);
    }

    #[rstest]
    fn numeric_identifiers_outside_i64_are_kept(temp_db: (TempDir, Utf8PathBuf)) {
        let (_dir, path) = temp_db;
        let store = SqliteStore::open(&path, "islands").expect("open store");
        let float_id = FeatureId::Number(Number::from_f64(1.5).expect("finite id"));
        let wide_id = FeatureId::Number(Number::from(u64::MAX));
        let collection = FeatureCollection::new(vec![
            island(float_id.clone(), "Dinagat"),
            island(wide_id.clone(), "Siargao"),
        ]);
        store.persist(&collection).expect("persist");

        let loaded = store.load().expect("load");
        let ids: Vec<_> = loaded.iter().filter_map(|feature| feature.id.clone()).collect();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids.first(), Some(&float_id));
        assert!(ids.get(1).is_some_and(|id| id.matches(&wide_id)));
    }

    #[rstest]
    #[case("islands\" ; DROP TABLE x; --")]
    #[case("1islands")]
    #[case("")]
    fn unsafe_table_names_are_rejected(temp_db: (TempDir, Utf8PathBuf), #[case] table: &str) {
        let (_dir, path) = temp_db;
        assert!(matches!(
            SqliteStore::open(&path, table),
            Err(StoreError::InvalidTable { .. })
        ));
        assert!(!path.exists());
    }

    #[rstest]
    fn duplicate_identifiers_roll_back(temp_db: (TempDir, Utf8PathBuf)) {
        let (_dir, path) = temp_db;
        let store = SqliteStore::open(&path, "islands").expect("open store");
        let original = FeatureCollection::new(vec![island(1, "Dinagat")]);
        store.persist(&original).expect("persist");

        let clash = FeatureCollection::new(vec![island(2, "a"), island(2, "b")]);
        assert!(matches!(store.persist(&clash), Err(StoreError::Write { .. })));
        assert_eq!(store.load().expect("load").features, original.features);
    }

    #[rstest]
    fn failed_transaction_leaves_rows(temp_db: (TempDir, Utf8PathBuf)) {
        let (_dir, path) = temp_db;
        let store = SqliteStore::open(&path, "islands").expect("open store");
        store
            .persist(&FeatureCollection::new(vec![island(1, "Dinagat")]))
            .expect("persist");

        let result = store.transact(|collection| {
            collection.features.clear();
            Err::<(), _>(StoreError::write("test", std::io::Error::other("abort")))
        });

        assert!(result.is_err());
        assert_eq!(store.load().expect("load").len(), 1);
    }

    #[rstest]
    fn corrupt_properties_are_unavailable(temp_db: (TempDir, Utf8PathBuf)) {
        let (_dir, path) = temp_db;
        let store = SqliteStore::open(&path, "islands").expect("open store");
        let connection = Connection::open(&path).expect("open database");
        connection
            .execute(
                "INSERT INTO islands (id, geometry, properties) VALUES (1, NULL, 'not-json')",
                [],
            )
            .expect("insert row");

        let error = store.load().expect_err("invalid properties should fail");
        assert!(matches!(error, StoreError::Unavailable { .. }));
    }

    #[rstest]
    fn missing_directory_is_unavailable() {
        let dir = TempDir::new().expect("create temp dir");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("absent/features.db"))
            .expect("utf-8 temp path");
        assert!(matches!(
            SqliteStore::open(&path, "islands"),
            Err(StoreError::Unavailable { .. })
        ));
    }
}
