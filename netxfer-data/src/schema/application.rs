//! DDL of the application schema.

use rusqlite::Connection;

use super::{SchemaError, run_migration_step};

const STEPS: &[(&str, &str)] = &[
    (
        "create vl_entry",
        "CREATE TABLE IF NOT EXISTS vl_entry (
            list_name TEXT NOT NULL,
            code INTEGER NOT NULL,
            display TEXT NOT NULL,
            PRIMARY KEY (list_name, code)
        );",
    ),
    (
        "create od_organisation",
        "CREATE TABLE IF NOT EXISTS od_organisation (
            obj_id TEXT PRIMARY KEY,
            identifier TEXT,
            uid TEXT,
            remark TEXT,
            last_modification TEXT,
            fk_dataowner TEXT,
            fk_provider TEXT
        );",
    ),
    (
        "create od_wastewater_structure",
        "CREATE TABLE IF NOT EXISTS od_wastewater_structure (
            obj_id TEXT PRIMARY KEY,
            identifier TEXT,
            remark TEXT,
            status INTEGER,
            year_of_construction INTEGER,
            fk_owner TEXT REFERENCES od_organisation (obj_id)
                DEFERRABLE INITIALLY DEFERRED,
            fk_operator TEXT REFERENCES od_organisation (obj_id)
                DEFERRABLE INITIALLY DEFERRED,
            fk_main_cover TEXT REFERENCES od_structure_part (obj_id)
                DEFERRABLE INITIALLY DEFERRED,
            last_modification TEXT,
            fk_dataowner TEXT REFERENCES od_organisation (obj_id)
                DEFERRABLE INITIALLY DEFERRED,
            fk_provider TEXT REFERENCES od_organisation (obj_id)
                DEFERRABLE INITIALLY DEFERRED
        );",
    ),
    (
        "create od_manhole",
        "CREATE TABLE IF NOT EXISTS od_manhole (
            obj_id TEXT PRIMARY KEY REFERENCES od_wastewater_structure (obj_id)
                ON DELETE CASCADE DEFERRABLE INITIALLY DEFERRED,
            function INTEGER,
            dimension1 INTEGER,
            dimension2 INTEGER,
            depth INTEGER
        );",
    ),
    (
        "create od_special_structure",
        "CREATE TABLE IF NOT EXISTS od_special_structure (
            obj_id TEXT PRIMARY KEY REFERENCES od_wastewater_structure (obj_id)
                ON DELETE CASCADE DEFERRABLE INITIALLY DEFERRED,
            function INTEGER,
            upper_elevation REAL
        );",
    ),
    (
        "create od_discharge_point",
        "CREATE TABLE IF NOT EXISTS od_discharge_point (
            obj_id TEXT PRIMARY KEY REFERENCES od_wastewater_structure (obj_id)
                ON DELETE CASCADE DEFERRABLE INITIALLY DEFERRED,
            relevance INTEGER,
            waterlevel_hydraulic REAL
        );",
    ),
    (
        "create od_infiltration_installation",
        "CREATE TABLE IF NOT EXISTS od_infiltration_installation (
            obj_id TEXT PRIMARY KEY REFERENCES od_wastewater_structure (obj_id)
                ON DELETE CASCADE DEFERRABLE INITIALLY DEFERRED,
            kind INTEGER,
            absorption_capacity REAL
        );",
    ),
    (
        "create od_wwtp_structure",
        "CREATE TABLE IF NOT EXISTS od_wwtp_structure (
            obj_id TEXT PRIMARY KEY REFERENCES od_wastewater_structure (obj_id)
                ON DELETE CASCADE DEFERRABLE INITIALLY DEFERRED,
            kind INTEGER
        );",
    ),
    (
        "create od_wastewater_networkelement",
        "CREATE TABLE IF NOT EXISTS od_wastewater_networkelement (
            obj_id TEXT PRIMARY KEY,
            identifier TEXT,
            remark TEXT,
            fk_wastewater_structure TEXT REFERENCES od_wastewater_structure (obj_id)
                DEFERRABLE INITIALLY DEFERRED,
            last_modification TEXT,
            fk_dataowner TEXT REFERENCES od_organisation (obj_id)
                DEFERRABLE INITIALLY DEFERRED,
            fk_provider TEXT REFERENCES od_organisation (obj_id)
                DEFERRABLE INITIALLY DEFERRED
        );",
    ),
    (
        "create od_wastewater_node",
        "CREATE TABLE IF NOT EXISTS od_wastewater_node (
            obj_id TEXT PRIMARY KEY REFERENCES od_wastewater_networkelement (obj_id)
                ON DELETE CASCADE DEFERRABLE INITIALLY DEFERRED,
            backflow_level REAL,
            bottom_level REAL,
            situation_geometry BLOB,
            fk_overflow_to TEXT REFERENCES od_wastewater_networkelement (obj_id)
                DEFERRABLE INITIALLY DEFERRED
        );",
    ),
    (
        "create od_reach",
        "CREATE TABLE IF NOT EXISTS od_reach (
            obj_id TEXT PRIMARY KEY REFERENCES od_wastewater_networkelement (obj_id)
                ON DELETE CASCADE DEFERRABLE INITIALLY DEFERRED,
            clear_height INTEGER,
            material INTEGER,
            length_effective REAL,
            progression_geometry BLOB,
            fk_from TEXT REFERENCES od_wastewater_networkelement (obj_id)
                DEFERRABLE INITIALLY DEFERRED,
            fk_to TEXT REFERENCES od_wastewater_networkelement (obj_id)
                DEFERRABLE INITIALLY DEFERRED
        );",
    ),
    (
        "create od_structure_part",
        "CREATE TABLE IF NOT EXISTS od_structure_part (
            obj_id TEXT PRIMARY KEY,
            identifier TEXT,
            remark TEXT,
            renovation_demand INTEGER,
            fk_wastewater_structure TEXT REFERENCES od_wastewater_structure (obj_id)
                DEFERRABLE INITIALLY DEFERRED,
            last_modification TEXT,
            fk_dataowner TEXT REFERENCES od_organisation (obj_id)
                DEFERRABLE INITIALLY DEFERRED,
            fk_provider TEXT REFERENCES od_organisation (obj_id)
                DEFERRABLE INITIALLY DEFERRED
        );",
    ),
    (
        "create od_cover",
        "CREATE TABLE IF NOT EXISTS od_cover (
            obj_id TEXT PRIMARY KEY REFERENCES od_structure_part (obj_id)
                ON DELETE CASCADE DEFERRABLE INITIALLY DEFERRED,
            level REAL,
            material INTEGER,
            positional_accuracy INTEGER,
            situation_geometry BLOB
        );",
    ),
    (
        "create od_access_aid",
        "CREATE TABLE IF NOT EXISTS od_access_aid (
            obj_id TEXT PRIMARY KEY REFERENCES od_structure_part (obj_id)
                ON DELETE CASCADE DEFERRABLE INITIALLY DEFERRED,
            kind INTEGER
        );",
    ),
    (
        "create od_examination",
        "CREATE TABLE IF NOT EXISTS od_examination (
            obj_id TEXT PRIMARY KEY,
            identifier TEXT,
            remark TEXT,
            recording_date TEXT,
            recording_type INTEGER,
            fk_reach TEXT REFERENCES od_reach (obj_id)
                DEFERRABLE INITIALLY DEFERRED,
            last_modification TEXT,
            fk_dataowner TEXT REFERENCES od_organisation (obj_id)
                DEFERRABLE INITIALLY DEFERRED,
            fk_provider TEXT REFERENCES od_organisation (obj_id)
                DEFERRABLE INITIALLY DEFERRED
        );",
    ),
];

/// Create the application tables if they do not exist yet.
///
/// Every foreign key is `DEFERRABLE INITIALLY DEFERRED`: the structure and
/// structure-part tables reference each other, so no insertion order would
/// satisfy immediate checks.
///
/// # Errors
/// Returns [`SchemaError::Migration`] naming the failing table.
pub fn create_application_schema(connection: &Connection) -> Result<(), SchemaError> {
    for (step, sql) in STEPS {
        run_migration_step(connection, step, sql)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use netxfer_core::RULES;
    use rstest::{fixture, rstest};
    use std::collections::HashSet;

    #[fixture]
    fn connection() -> Connection {
        let connection = Connection::open_in_memory()
            .unwrap_or_else(|err| panic!("failed to open in-memory database: {err}"));
        create_application_schema(&connection)
            .unwrap_or_else(|err| panic!("failed to create schema: {err}"));
        connection
    }

    fn columns(connection: &Connection, table: &str) -> HashSet<String> {
        let mut statement = connection
            .prepare(&format!("SELECT name FROM pragma_table_info('{table}')"))
            .unwrap_or_else(|err| panic!("failed to inspect {table}: {err}"));
        let names = statement
            .query_map([], |row| row.get::<_, String>(0))
            .unwrap_or_else(|err| panic!("failed to list columns of {table}: {err}"));
        names
            .collect::<Result<_, _>>()
            .unwrap_or_else(|err| panic!("failed to read column of {table}: {err}"))
    }

    #[rstest]
    fn every_mapped_column_exists(connection: Connection) {
        for rule in RULES {
            for table in rule.tables() {
                let present = columns(&connection, table);
                assert!(present.contains("obj_id"), "{table} lacks obj_id");
                for field in rule.fields_in_table(table) {
                    assert!(
                        present.contains(field.source),
                        "{table} lacks {} mapped by {}",
                        field.source,
                        rule.entity
                    );
                }
            }
        }
    }

    #[rstest]
    fn creation_is_repeatable(connection: Connection) {
        assert!(create_application_schema(&connection).is_ok());
    }
}
