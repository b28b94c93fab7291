//! Test helpers: on-disk databases and a file-copying tool backend.

use std::cell::Cell;

use camino::{Utf8Path, Utf8PathBuf};
use netxfer_data::{ExchangeTools, ToolError, create_application_schema, create_exchange_schema};
use rusqlite::Connection;
use tempfile::TempDir;

const VALUE_LISTS: &str = "
    INSERT INTO vl_entry VALUES
        ('reach_material', 5081, 'concrete'),
        ('wastewater_structure_status', 8493, 'operational');
";

const NETWORK: &str = "
    INSERT INTO od_organisation (obj_id, identifier) VALUES ('org-1', 'Stadt Bern');
    INSERT INTO od_wastewater_structure (obj_id, identifier, status, fk_owner)
        VALUES ('S1', 'MH 1', 8493, 'org-1');
    INSERT INTO od_manhole (obj_id) VALUES ('S1');
    INSERT INTO od_wastewater_networkelement (obj_id, identifier, fk_wastewater_structure)
        VALUES ('A', 'A', 'S1'), ('B', 'B', NULL), ('C', 'C', NULL),
               ('R1', 'R 1', NULL), ('R2', 'R 2', NULL);
    INSERT INTO od_wastewater_node (obj_id) VALUES ('A'), ('B'), ('C');
    INSERT INTO od_reach (obj_id, material, fk_from, fk_to)
        VALUES ('R1', 5081, 'A', 'B'), ('R2', 5081, 'B', 'C');
";

/// Temporary directory holding the databases of one test.
#[derive(Debug)]
pub(super) struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 workspace");
        Self { _dir: dir, root }
    }

    pub(super) fn path(&self, name: &str) -> Utf8PathBuf {
        self.root.join(name)
    }

    /// Application database at `name` holding the sample network.
    pub(super) fn network(&self, name: &str) -> Utf8PathBuf {
        self.application(name, NETWORK)
    }

    /// Application database at `name` holding value lists only.
    pub(super) fn empty(&self, name: &str) -> Utf8PathBuf {
        self.application(name, "")
    }

    fn application(&self, name: &str, rows: &str) -> Utf8PathBuf {
        let path = self.path(name);
        let connection = Connection::open(&path).expect("open application database");
        create_application_schema(&connection).expect("application schema");
        connection
            .execute_batch(VALUE_LISTS)
            .and_then(|()| connection.execute_batch(rows))
            .expect("seed application database");
        path
    }
}

/// Number of rows in `table` of the database at `path`.
pub(super) fn count(path: &Utf8Path, table: &str) -> i64 {
    let connection = Connection::open(path).expect("open database");
    connection
        .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
            row.get(0)
        })
        .expect("count rows")
}

/// [`ExchangeTools`] whose transfer file is a copy of the exchange database.
#[derive(Debug, Default)]
pub(super) struct CopyTools {
    pub(super) reject: bool,
    pub(super) validations: Cell<usize>,
}

impl CopyTools {
    pub(super) fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }
}

impl ExchangeTools for CopyTools {
    fn create_schema(
        &self,
        database: &Utf8Path,
        _models: &[&str],
        recreate: bool,
    ) -> Result<(), ToolError> {
        let connection = Connection::open(database).expect("open exchange database");
        create_exchange_schema(&connection, recreate).expect("exchange schema");
        Ok(())
    }

    fn encode(&self, database: &Utf8Path, _: &[&str], output: &Utf8Path) -> Result<(), ToolError> {
        std::fs::copy(database, output).expect("copy exchange database");
        Ok(())
    }

    fn decode(&self, database: &Utf8Path, input: &Utf8Path) -> Result<(), ToolError> {
        std::fs::copy(input, database).expect("copy transfer file");
        Ok(())
    }

    fn validate(&self, path: &Utf8Path) -> Result<(), ToolError> {
        self.validations.set(self.validations.get() + 1);
        if self.reject {
            return Err(ToolError::Validation {
                path: path.to_path_buf(),
                report: "Error: line 1: unknown TID".to_owned(),
            });
        }
        Ok(())
    }
}
