//! Shared fixtures for the behaviour tests.

use netxfer_data::{create_application_schema, create_exchange_schema};
use rusqlite::Connection;

/// Value lists present in every application database.
pub const VALUE_LISTS: &str = "
    INSERT INTO vl_entry VALUES
        ('reach_material', 5081, 'concrete'),
        ('cover_material', 5355, 'cast_iron'),
        ('wastewater_structure_status', 8493, 'operational');
";

/// Manhole `S1` holding node `A` and cover `CV1`, treatment plant structure
/// `W1` holding cover `CV9`, and reaches `R1` from `A` to `B` and `R2` from
/// `B` to `C`.
pub const NETWORK: &str = "
    INSERT INTO od_organisation (obj_id, identifier) VALUES ('org-1', 'Stadt Bern');
    INSERT INTO od_wastewater_structure (obj_id, identifier, status, fk_owner, fk_main_cover)
        VALUES ('S1', 'MH 1', 8493, 'org-1', 'CV1'), ('W1', 'ARA', NULL, NULL, NULL);
    INSERT INTO od_manhole (obj_id, depth) VALUES ('S1', 2400);
    INSERT INTO od_wwtp_structure (obj_id) VALUES ('W1');
    INSERT INTO od_structure_part (obj_id, identifier, fk_wastewater_structure)
        VALUES ('CV1', 'D 1', 'S1'), ('CV9', 'D 9', 'W1');
    INSERT INTO od_cover (obj_id, material) VALUES ('CV1', 5355), ('CV9', 5355);
    INSERT INTO od_wastewater_networkelement (obj_id, identifier, fk_wastewater_structure)
        VALUES ('A', 'A', 'S1'), ('B', 'B', NULL), ('C', 'C', NULL),
               ('R1', 'R 1', NULL), ('R2', 'R 2', NULL);
    INSERT INTO od_wastewater_node (obj_id) VALUES ('A'), ('B'), ('C');
    INSERT INTO od_reach (obj_id, material, fk_from, fk_to)
        VALUES ('R1', 5081, 'A', 'B'), ('R2', 5081, 'B', 'C');
";

/// In-memory application database seeded with `rows`.
pub fn application(rows: &str) -> Connection {
    let connection = Connection::open_in_memory()
        .unwrap_or_else(|err| panic!("failed to open application database: {err}"));
    create_application_schema(&connection)
        .unwrap_or_else(|err| panic!("failed to create application schema: {err}"));
    connection
        .execute_batch(VALUE_LISTS)
        .unwrap_or_else(|err| panic!("failed to seed value lists: {err}"));
    connection
        .execute_batch(rows)
        .unwrap_or_else(|err| panic!("failed to seed application rows: {err}"));
    connection
}

/// In-memory exchange database seeded with `rows`.
pub fn exchange(rows: &str) -> Connection {
    let connection = Connection::open_in_memory()
        .unwrap_or_else(|err| panic!("failed to open exchange database: {err}"));
    create_exchange_schema(&connection, false)
        .unwrap_or_else(|err| panic!("failed to create exchange schema: {err}"));
    connection
        .execute_batch(rows)
        .unwrap_or_else(|err| panic!("failed to seed exchange rows: {err}"));
    connection
}

/// Number of rows in `table`.
pub fn count(connection: &Connection, table: &str) -> i64 {
    connection
        .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
            row.get(0)
        })
        .unwrap_or_else(|err| panic!("failed to count {table}: {err}"))
}
