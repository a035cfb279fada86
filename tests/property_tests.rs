//! Property-based tests for the row set protocol and the string and number
//! helpers
//!
//! These tests verify, for arbitrary inputs, that:
//! - The Nth bound field always receives the Nth result column
//! - Fetching past the end never touches bound destinations
//! - SQL number literals parse back to the value they were printed from
//! - Cleaning text without quotes or carriage returns is the identity

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rowbind::core::error::{describe, ErrorCode};
    use rowbind::core::locale::NumericLocale;
    use rowbind::core::scratch::ScratchBuffer;
    use rowbind::{Backend, ConnectParams, Connection, Fetch, FieldType};
    use std::cell::Cell;

    // Test infrastructure

    fn memory_connection() -> Connection {
        let mut conn = Connection::new(Backend::Sqlite);
        conn.connect_with(ConnectParams::new(":memory:")).unwrap();
        conn
    }

    fn select_list(values: &[i32]) -> String {
        let columns: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        format!("SELECT {}", columns.join(", "))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_bind_order_matches_column_order(values in prop::collection::vec(any::<i32>(), 1..12)) {
            let conn = memory_connection();
            let cells: Vec<Cell<i32>> = values.iter().map(|_| Cell::new(0)).collect();
            let mut rs = conn.create_row_set().unwrap();
            for cell in &cells {
                rs.bind(FieldType::Int, cell).unwrap();
            }
            rs.query(&select_list(&values)).unwrap();

            prop_assert_eq!(rs.get_next().unwrap(), Fetch::Row { converted: values.len() });
            for (cell, value) in cells.iter().zip(&values) {
                prop_assert_eq!(cell.get(), *value);
            }
        }

        #[test]
        fn prop_exhausted_fetch_never_mutates(values in prop::collection::vec(any::<i32>(), 1..6), extra_calls in 1usize..4) {
            let conn = memory_connection();
            let cells: Vec<Cell<i32>> = values.iter().map(|_| Cell::new(0)).collect();
            let mut rs = conn.create_row_set().unwrap();
            for cell in &cells {
                rs.bind(FieldType::Int, cell).unwrap();
            }
            rs.query(&select_list(&values)).unwrap();
            while rs.get_next().unwrap().is_row() {}

            for cell in &cells {
                cell.set(i32::MIN);
            }
            for _ in 0..extra_calls {
                prop_assert_eq!(rs.get_next().unwrap(), Fetch::End);
            }
            prop_assert!(cells.iter().all(|cell| cell.get() == i32::MIN));
        }

        #[test]
        fn prop_print_number_round_trips(value in any::<f64>().prop_filter("finite", |v| v.is_finite())) {
            for locale in [NumericLocale::PERIOD, NumericLocale::COMMA] {
                let literal = locale.print_number(value);
                prop_assert!(!literal.contains(','), "literal {} is not SQL safe", literal);
                prop_assert_eq!(locale.parse_number(&literal), value);
            }
        }

        #[test]
        fn prop_clean_sql_is_identity_on_clean_text(text in "[^'\r]{0,600}") {
            let mut scratch = ScratchBuffer::new();
            let once = scratch.clean_sql(&text).to_string();
            prop_assert_eq!(&once, &text);
            prop_assert_eq!(scratch.clean_sql(&once), text.as_str());
        }

        #[test]
        fn prop_clean_sql_removes_lone_quotes(text in ".{0,200}") {
            let mut scratch = ScratchBuffer::new();
            let cleaned = scratch.clean_sql(&text);
            prop_assert!(!cleaned.contains('\r'));
            prop_assert_eq!(cleaned.matches('\'').count(), text.matches('\'').count() * 2);
        }

        #[test]
        fn prop_unknown_error_ids_are_undefined(id in 25u16..) {
            prop_assert_eq!(ErrorCode::from_id(id), ErrorCode::Undefined);
            prop_assert_eq!(describe(id), ErrorCode::Undefined.description());
        }
    }

    #[test]
    fn test_query_without_bindings_always_fails() {
        let conn = memory_connection();
        let mut rs = conn.create_row_set().unwrap();
        for sql in ["SELECT 1", "SELECT * FROM missing", "not even sql"] {
            assert_eq!(rs.query(sql).unwrap_err().code(), ErrorCode::MissingBindings);
        }
    }
}
