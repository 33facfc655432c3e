use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{Connection, OptionalExtension, params};

use super::models::{FactoryAttribute, FactoryConfig, FactoryRecord, Owner};
use crate::errors::StoreError;

/// Fixed message for ownership violations; the driver text would leak
/// schema details.
const OWNER_CONFLICT: &str = "Could not store factory: owner refers to a non-existent account";

/// Async-safe handle to the factory store.
///
/// Wraps `FactoryStore` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, preventing synchronous SQLite
/// I/O from tying up async worker threads.
#[derive(Clone)]
pub struct StoreHandle {
    inner: Arc<Mutex<FactoryStore>>,
}

impl StoreHandle {
    pub fn new(store: FactoryStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// Run a closure with access to the store on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&FactoryStore) -> Result<R, StoreError> + Send + 'static,
        R: Send + 'static,
    {
        let store = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = store
                .lock()
                .map_err(|e| StoreError::server(anyhow::anyhow!("store lock poisoned: {}", e)))?;
            f(&guard)
        })
        .await
        .map_err(|e| StoreError::server(anyhow::anyhow!("store task panicked: {}", e)))?
    }

    /// Acquire the store mutex synchronously. For startup initialization and
    /// tests; must not be called from a hot async path.
    pub fn lock_sync(&self) -> Result<std::sync::MutexGuard<'_, FactoryStore>, StoreError> {
        self.inner
            .lock()
            .map_err(|e| StoreError::server(anyhow::anyhow!("store lock poisoned: {}", e)))
    }
}

/// SQLite-backed store for factory records.
///
/// Every public operation runs inside one all-or-nothing transaction
/// boundary and classifies failures into the three-way taxonomy at this
/// boundary: constraint violations become `Conflict`, missing entities
/// become `NotFound`, everything else is wrapped as `Server`.
pub struct FactoryStore {
    conn: Connection,
}

impl FactoryStore {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(StoreError::server)?;
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(StoreError::server)?;
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    fn init(&self) -> Result<(), StoreError> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(StoreError::server)?;
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS owners (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL UNIQUE
                );

                CREATE TABLE IF NOT EXISTS factories (
                    id TEXT PRIMARY KEY,
                    owner_id TEXT NOT NULL REFERENCES owners(id),
                    name TEXT NOT NULL,
                    config TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    UNIQUE(owner_id, name)
                );

                CREATE TABLE IF NOT EXISTS factory_attributes (
                    factory_id TEXT NOT NULL REFERENCES factories(id) ON DELETE CASCADE,
                    name TEXT NOT NULL,
                    value TEXT NOT NULL,
                    ordinal INTEGER NOT NULL,
                    PRIMARY KEY (factory_id, name)
                );

                CREATE INDEX IF NOT EXISTS idx_factory_attributes_name_value
                    ON factory_attributes(name, value);
                ",
            )
            .map_err(StoreError::server)?;
        Ok(())
    }

    // ── Owner records ─────────────────────────────────────────────────

    pub fn put_owner(&self, owner: &Owner) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO owners (id, name) VALUES (?1, ?2)",
                params![owner.id, owner.name],
            )
            .map_err(|e| unique_conflict(&e).unwrap_or_else(|| StoreError::server(e)))?;
        Ok(())
    }

    pub fn get_owner(&self, id: &str) -> Result<Owner, StoreError> {
        self.conn
            .query_row(
                "SELECT id, name FROM owners WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Owner {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()
            .map_err(StoreError::server)?
            .ok_or_else(|| StoreError::NotFound(format!("Owner with id '{}' doesn't exist", id)))
    }

    // ── Factory CRUD ──────────────────────────────────────────────────

    /// Persist a record and return the canonical stored form.
    pub fn create(&self, record: &FactoryRecord) -> Result<FactoryRecord, StoreError> {
        let config_json = serde_json::to_string(&record.config).map_err(StoreError::server)?;
        let tx = self.conn.unchecked_transaction().map_err(StoreError::server)?;
        tx.execute(
            "INSERT INTO factories (id, owner_id, name, config) VALUES (?1, ?2, ?3, ?4)",
            params![record.id, record.owner_id, record.name, config_json],
        )
        .map_err(|e| {
            unique_conflict(&e)
                .or_else(|| owner_conflict(&e))
                .unwrap_or_else(|| StoreError::server(e))
        })?;
        insert_attributes(&tx, &record.id, &record.attributes)?;
        tx.commit().map_err(StoreError::server)?;
        self.get(&record.id)
    }

    /// Merge-style upsert of an existing record's fields and attributes.
    ///
    /// Fails with `NotFound` before any mutation if no record with that id
    /// exists.
    pub fn update(&self, record: &FactoryRecord) -> Result<FactoryRecord, StoreError> {
        let config_json = serde_json::to_string(&record.config).map_err(StoreError::server)?;
        let tx = self.conn.unchecked_transaction().map_err(StoreError::server)?;

        let exists: bool = tx
            .query_row(
                "SELECT COUNT(*) > 0 FROM factories WHERE id = ?1",
                params![record.id],
                |row| row.get(0),
            )
            .map_err(StoreError::server)?;
        if !exists {
            return Err(StoreError::NotFound(format!(
                "Could not update factory with id '{}' because it doesn't exist",
                record.id
            )));
        }

        tx.execute(
            "UPDATE factories SET owner_id = ?1, name = ?2, config = ?3 WHERE id = ?4",
            params![record.owner_id, record.name, config_json, record.id],
        )
        .map_err(|e| unique_conflict(&e).unwrap_or_else(|| StoreError::server(e)))?;
        tx.execute(
            "DELETE FROM factory_attributes WHERE factory_id = ?1",
            params![record.id],
        )
        .map_err(StoreError::server)?;
        insert_attributes(&tx, &record.id, &record.attributes)?;
        tx.commit().map_err(StoreError::server)?;
        self.get(&record.id)
    }

    /// Delete a record. An absent id is `NotFound`; attributes go with the
    /// record.
    pub fn remove(&self, id: &str) -> Result<(), StoreError> {
        let deleted = self
            .conn
            .execute("DELETE FROM factories WHERE id = ?1", params![id])
            .map_err(StoreError::server)?;
        if deleted == 0 {
            return Err(StoreError::NotFound(format!(
                "Factory with id '{}' doesn't exist",
                id
            )));
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<FactoryRecord, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, owner_id, name, config, created_at FROM factories WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()
            .map_err(StoreError::server)?;

        let Some((id, owner_id, name, config_json, created_at)) = row else {
            return Err(StoreError::NotFound(format!(
                "Factory with id '{}' doesn't exist",
                id
            )));
        };
        let config: FactoryConfig =
            serde_json::from_str(&config_json).map_err(StoreError::server)?;
        let attributes = self.attributes_of(&id)?;
        Ok(FactoryRecord {
            id,
            owner_id,
            name,
            attributes,
            config,
            created_at,
        })
    }

    /// Page through records whose attribute mapping contains every given
    /// (name, value) pair. Stable order by id; an empty filter matches
    /// everything.
    pub fn find_by_attribute(
        &self,
        max_items: usize,
        skip_count: usize,
        attributes: &[(String, String)],
    ) -> Result<Vec<FactoryRecord>, StoreError> {
        let mut sql = String::from("SELECT f.id FROM factories f");
        let mut clauses = Vec::new();
        for i in 0..attributes.len() {
            clauses.push(format!(
                "EXISTS (SELECT 1 FROM factory_attributes a \
                 WHERE a.factory_id = f.id AND a.name = ?{} AND a.value = ?{})",
                2 * i + 1,
                2 * i + 2
            ));
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(&format!(
            " ORDER BY f.id LIMIT ?{} OFFSET ?{}",
            2 * attributes.len() + 1,
            2 * attributes.len() + 2
        ));

        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        for (name, value) in attributes {
            args.push(Box::new(name.clone()));
            args.push(Box::new(value.clone()));
        }
        args.push(Box::new(max_items as i64));
        args.push(Box::new(skip_count as i64));
        let refs: Vec<&dyn rusqlite::ToSql> = args.iter().map(|a| a.as_ref()).collect();

        let mut stmt = self.conn.prepare(&sql).map_err(StoreError::server)?;
        let rows = stmt
            .query_map(refs.as_slice(), |row| row.get::<_, String>(0))
            .map_err(StoreError::server)?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(row.map_err(StoreError::server)?);
        }
        ids.into_iter().map(|id| self.get(&id)).collect()
    }

    fn attributes_of(&self, factory_id: &str) -> Result<Vec<FactoryAttribute>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT name, value FROM factory_attributes \
                 WHERE factory_id = ?1 ORDER BY ordinal",
            )
            .map_err(StoreError::server)?;
        let rows = stmt
            .query_map(params![factory_id], |row| {
                Ok(FactoryAttribute {
                    name: row.get(0)?,
                    value: row.get(1)?,
                })
            })
            .map_err(StoreError::server)?;
        let mut attributes = Vec::new();
        for row in rows {
            attributes.push(row.map_err(StoreError::server)?);
        }
        Ok(attributes)
    }
}

fn insert_attributes(
    conn: &Connection,
    factory_id: &str,
    attributes: &[FactoryAttribute],
) -> Result<(), StoreError> {
    for (ordinal, attribute) in attributes.iter().enumerate() {
        conn.execute(
            "INSERT INTO factory_attributes (factory_id, name, value, ordinal) \
             VALUES (?1, ?2, ?3, ?4)",
            params![factory_id, attribute.name, attribute.value, ordinal as i64],
        )
        .map_err(|e| unique_conflict(&e).unwrap_or_else(|| StoreError::server(e)))?;
    }
    Ok(())
}

/// Duplicate-key violations surface the driver's message as a `Conflict`.
fn unique_conflict(err: &rusqlite::Error) -> Option<StoreError> {
    match err {
        rusqlite::Error::SqliteFailure(e, msg)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
                && matches!(
                    e.extended_code,
                    rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                        | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                ) =>
        {
            Some(StoreError::Conflict(
                msg.clone()
                    .unwrap_or_else(|| "duplicate key".to_string()),
            ))
        }
        _ => None,
    }
}

/// Ownership foreign-key violations get a fixed `Conflict` message.
fn owner_conflict(err: &rusqlite::Error) -> Option<StoreError> {
    match err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY =>
        {
            Some(StoreError::Conflict(OWNER_CONFLICT.to_string()))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::models::{Recipe, RecipeKind};

    fn config(workspace_name: &str) -> FactoryConfig {
        FactoryConfig {
            workspace_name: workspace_name.into(),
            recipe: Recipe {
                kind: RecipeKind::Image,
                content: "library/ubuntu:24.04".into(),
            },
            commands: vec![],
        }
    }

    fn record(id: &str, owner: &str, name: &str) -> FactoryRecord {
        FactoryRecord {
            id: id.into(),
            owner_id: owner.into(),
            name: name.into(),
            attributes: vec![],
            config: config(name),
            created_at: String::new(),
        }
    }

    fn store() -> FactoryStore {
        let store = FactoryStore::in_memory().unwrap();
        store
            .put_owner(&Owner {
                id: "u1".into(),
                name: "mina".into(),
            })
            .unwrap();
        store
    }

    #[test]
    fn create_then_get_returns_canonical_form() {
        let store = store();
        let mut input = record("f1", "u1", "rust-starter");
        input.attributes = vec![
            FactoryAttribute {
                name: "team".into(),
                value: "ide".into(),
            },
            FactoryAttribute {
                name: "visibility".into(),
                value: "public".into(),
            },
        ];

        let created = store.create(&input).unwrap();
        assert_eq!(created.id, "f1");
        assert_eq!(created.owner_id, "u1");
        assert!(!created.created_at.is_empty());
        let names: Vec<_> = created.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["team", "visibility"]);

        let fetched = store.get("f1").unwrap();
        assert_eq!(fetched, created);
    }

    #[test]
    fn create_duplicate_id_is_conflict() {
        let store = store();
        store.create(&record("f1", "u1", "a")).unwrap();
        let err = store.create(&record("f1", "u1", "b")).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)), "got {:?}", err);
    }

    #[test]
    fn create_duplicate_name_for_same_owner_is_conflict() {
        let store = store();
        store.create(&record("f1", "u1", "same")).unwrap();
        let err = store.create(&record("f2", "u1", "same")).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)), "got {:?}", err);
    }

    #[test]
    fn create_with_unknown_owner_is_conflict_with_fixed_message() {
        let store = store();
        let err = store.create(&record("f1", "ghost", "a")).unwrap_err();
        match err {
            StoreError::Conflict(msg) => assert_eq!(msg, OWNER_CONFLICT),
            other => panic!("Expected Conflict, got {:?}", other),
        }
    }

    #[test]
    fn update_missing_record_is_not_found_and_writes_nothing() {
        let store = store();
        let err = store.update(&record("absent", "u1", "a")).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)), "got {:?}", err);
        assert!(matches!(
            store.get("absent").unwrap_err(),
            StoreError::NotFound(_)
        ));
    }

    #[test]
    fn update_replaces_fields_and_attributes() {
        let store = store();
        let created = store
            .create(&record("f1", "u1", "old").with_attribute("team", "ide"))
            .unwrap();
        assert_eq!(created.attribute("team"), Some("ide"));

        let mut update = record("f1", "u1", "new");
        update.config = config("renamed");
        update = update.with_attribute("visibility", "public");

        let updated = store.update(&update).unwrap();
        assert_eq!(updated.name, "new");
        assert_eq!(updated.config.workspace_name, "renamed");
        assert_eq!(updated.attribute("team"), None);
        assert_eq!(updated.attribute("visibility"), Some("public"));
    }

    #[test]
    fn update_to_duplicate_name_is_conflict() {
        let store = store();
        store.create(&record("f1", "u1", "taken")).unwrap();
        store.create(&record("f2", "u1", "free")).unwrap();
        let err = store.update(&record("f2", "u1", "taken")).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)), "got {:?}", err);
    }

    #[test]
    fn remove_existing_record_then_get_is_not_found() {
        let store = store();
        store.create(&record("f1", "u1", "a")).unwrap();
        store.remove("f1").unwrap();
        assert!(matches!(
            store.get("f1").unwrap_err(),
            StoreError::NotFound(_)
        ));
    }

    #[test]
    fn remove_absent_record_is_not_found() {
        let store = store();
        let err = store.remove("nope").unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)), "got {:?}", err);
    }

    #[test]
    fn get_absent_record_is_not_found() {
        let store = store();
        let err = store.get("nope").unwrap_err();
        match err {
            StoreError::NotFound(msg) => assert!(msg.contains("nope")),
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn get_owner_roundtrip_and_not_found() {
        let store = store();
        assert_eq!(store.get_owner("u1").unwrap().name, "mina");
        assert!(matches!(
            store.get_owner("ghost").unwrap_err(),
            StoreError::NotFound(_)
        ));
    }

    #[test]
    fn find_by_attribute_matches_supersets_only() {
        let store = store();
        store
            .create(
                &record("f1", "u1", "a")
                    .with_attribute("team", "ide")
                    .with_attribute("visibility", "public"),
            )
            .unwrap();
        store
            .create(&record("f2", "u1", "b").with_attribute("team", "ide"))
            .unwrap();
        store
            .create(
                &record("f3", "u1", "c")
                    .with_attribute("team", "docs")
                    .with_attribute("visibility", "public"),
            )
            .unwrap();

        let team_ide = store
            .find_by_attribute(30, 0, &[("team".into(), "ide".into())])
            .unwrap();
        let ids: Vec<_> = team_ide.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["f1", "f2"]);

        let public_ide = store
            .find_by_attribute(
                30,
                0,
                &[
                    ("team".into(), "ide".into()),
                    ("visibility".into(), "public".into()),
                ],
            )
            .unwrap();
        let ids: Vec<_> = public_ide.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["f1"]);

        let no_match = store
            .find_by_attribute(30, 0, &[("team".into(), "ops".into())])
            .unwrap();
        assert!(no_match.is_empty());
    }

    #[test]
    fn find_by_attribute_empty_filter_pages_everything_by_id() {
        let store = store();
        for id in ["f2", "f1", "f3"] {
            store.create(&record(id, "u1", id)).unwrap();
        }

        let all = store.find_by_attribute(30, 0, &[]).unwrap();
        let ids: Vec<_> = all.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["f1", "f2", "f3"]);

        let page = store.find_by_attribute(1, 1, &[]).unwrap();
        let ids: Vec<_> = page.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["f2"]);
    }

    #[tokio::test]
    async fn store_handle_runs_operations_on_blocking_pool() {
        let handle = StoreHandle::new(store());
        let created = handle
            .call(|s| s.create(&record("f1", "u1", "a")))
            .await
            .unwrap();
        assert_eq!(created.id, "f1");

        let err = handle
            .call(|s| s.create(&record("f1", "u1", "b")))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }
}
