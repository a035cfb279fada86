//! Tests against SQLite database files on disk.

use insta::assert_snapshot;
use rowbind::core::error::ErrorCode;
use rowbind::{Backend, ConnectParams, Connection, FieldType, Timestamp};
use std::cell::{Cell, RefCell};
use tempfile::TempDir;

fn open(dir: &TempDir) -> Connection {
    let path = dir.path().join("ddb_demo.db");
    let mut conn = Connection::new(Backend::Sqlite);
    conn.connect_with(ConnectParams::new(path.to_string_lossy().into_owned()))
        .unwrap();
    conn
}

#[test]
fn test_rows_written_by_one_connection_are_read_by_another() {
    let dir = TempDir::new().unwrap();
    {
        let writer = open(&dir);
        writer
            .update_structure("CREATE TABLE ddb_demo (id INT NOT NULL PRIMARY KEY, ts TIMESTAMP, data VARCHAR(255), tf BOOLEAN)")
            .unwrap();
        writer.start_transaction().unwrap();
        for i in 1..=5 {
            let sql = format!(
                "INSERT INTO ddb_demo (id, ts, data, tf) VALUES ({}, '2023-0{}-1{} 12:00:00', 'Test item {}', {})",
                i, i, i, i, i % 2
            );
            assert_eq!(writer.execute_modify(&sql).unwrap(), 1);
        }
        writer.commit().unwrap();
    }

    let reader = open(&dir);
    let id = Cell::new(0);
    let ts = Cell::new(Timestamp::ZERO);
    let data = RefCell::new(String::new());
    let tf = Cell::new(false);
    let mut rs = reader.create_row_set().unwrap();
    rs.bind(FieldType::Int, &id).unwrap();
    rs.bind(FieldType::Time, &ts).unwrap();
    rs.bind(FieldType::Str, &data).unwrap();
    rs.bind(FieldType::Bool, &tf).unwrap();
    rs.query("SELECT id, ts, data, tf FROM ddb_demo ORDER BY id").unwrap();

    let mut seen = 0;
    while rs.get_next().unwrap().is_row() {
        seen += 1;
        assert_eq!(id.get(), seen);
        assert_eq!(ts.get(), Timestamp::new(2023, seen as u32, 10 + seen as u32, 12, 0, 0));
        assert_eq!(*data.borrow(), format!("Test item {}", seen));
        assert_eq!(tf.get(), seen % 2 == 1);
    }
    assert_eq!(seen, 5);
    assert_eq!(rs.current_row(), 5);
}

#[test]
fn test_error_descriptions() {
    let dir = TempDir::new().unwrap();
    let conn = open(&dir);
    let number = Cell::new(0);
    let mut rs = conn.create_row_set().unwrap();
    rs.bind(FieldType::Int, &number).unwrap();

    let err = rs.query("SELECT n FROM missing").unwrap_err();
    assert_eq!(err.code(), ErrorCode::QueryFailure);
    assert_snapshot!(conn.error_description().replace('\n', " | "), @"Rowset - Query function unsuccessful. | SQLite: no such table: missing");

    let err = conn.commit().unwrap_err();
    assert_snapshot!(err.to_string(), @"DB - Commit/RollBack: The transaction has not been started.");
}

#[test]
fn test_unwritable_path_is_a_connection_failure() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("no_such_dir").join("x.db");
    let mut conn = Connection::new(Backend::Sqlite);
    let err = conn
        .connect_with(ConnectParams::new(path.to_string_lossy().into_owned()))
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ConnectionFailure);
    assert_eq!(conn.last_error(), ErrorCode::ConnectionFailure);
    assert!(!conn.is_connected());
    assert_eq!(conn.database_name(), "<No connection>");
}
