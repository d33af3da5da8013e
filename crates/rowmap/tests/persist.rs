//! Integration tests for persistence operations against a recording
//! connection.

#![allow(missing_docs)]

mod common;

use common::{
    AuditEntry, Customer, Employee, Membership, MockConnection, Order, Person, assert_sql_contains,
    init_tracing, row,
};
use rowmap::{DataType, Dialect, Error, GeneratedKeys, transaction};

#[test]
fn insert_back_fills_generated_key() {
    init_tracing();
    let mut conn = MockConnection::new(Dialect::sqlite());
    let mut order = Order {
        total: 42,
        ..Order::default()
    };

    let inserted = rowmap::insert(&mut conn, &mut order).unwrap();
    assert_eq!(inserted.id, 100);

    let (sql, params) = &conn.statements[0];
    assert_sql_contains(sql, &["INSERT INTO Order (customerId, total) VALUES (?, ?)"]);
    assert_eq!(params, &vec![DataType::Int64(None), DataType::Int64(Some(42))]);
}

#[test]
fn sequential_inserts_get_distinct_keys() {
    let mut conn = MockConnection::new(Dialect::postgres());
    let mut first = Employee::default();
    let mut second = Employee::default();
    rowmap::insert(&mut conn, &mut first).unwrap();
    rowmap::insert(&mut conn, &mut second).unwrap();
    assert_ne!(first.id, second.id);
    assert_sql_contains(conn.sql()[0], &["RETURNING id"]);
}

#[test]
fn batched_insert_assigns_keys_in_submission_order() {
    let mut conn = MockConnection::new(Dialect::sqlite());
    let mut orders: Vec<Order> =
        (1..=3).map(|total| Order { total, ..Order::default() }).collect();

    rowmap::insert_all(&mut conn, &mut orders, true).unwrap();

    let ids: Vec<i64> = orders.iter().map(|order| order.id).collect();
    assert_eq!(ids, vec![100, 101, 102]);
    assert_eq!(conn.statements.len(), 3);
    assert_eq!(conn.statements[2].1[1], DataType::Int64(Some(3)));
}

#[test]
fn batch_failure_keeps_completed_keys() {
    let mut conn = MockConnection::new(Dialect::sqlite());
    conn.fail_after = Some(2);
    let mut orders = vec![Order::default(), Order::default(), Order::default()];

    let err = rowmap::insert_all(&mut conn, &mut orders, true).unwrap_err();
    assert!(matches!(err, Error::Execution(_)));
    assert!(err.to_string().contains("UNIQUE constraint failed"));

    assert_eq!(orders[0].id, 100);
    assert_eq!(orders[1].id, 101);
    assert_eq!(orders[2].id, 0);
}

#[test]
fn unbatched_insert_stops_at_first_failure() {
    let mut conn = MockConnection::new(Dialect::sqlite());
    conn.fail_after = Some(1);
    let mut orders = vec![Order::default(), Order::default()];

    assert!(rowmap::insert_all(&mut conn, &mut orders, false).is_err());
    assert_eq!(orders[0].id, 100);
    assert_eq!(orders[1].id, 0);
}

#[test]
fn insert_without_generated_keys_executes() {
    let mut conn = MockConnection::new(Dialect::sqlite());
    let mut customer = Customer {
        id: 7,
        name: "Ada".to_string(),
    };
    rowmap::insert(&mut conn, &mut customer).unwrap();
    assert_eq!(customer.id, 7);
    assert_eq!(
        conn.statements[0].1,
        vec![DataType::Int64(Some(7)), DataType::Str(Some("Ada".to_string()))]
    );
}

#[test]
fn update_binds_set_columns_then_keys() {
    let mut conn = MockConnection::new(Dialect::sqlite());
    let person = Person {
        id: 3,
        name: "Grace".to_string(),
        age: 85,
    };

    rowmap::update(&mut conn, &person, &["age"]).unwrap();

    let (sql, params) = &conn.statements[0];
    assert_sql_contains(sql, &["UPDATE people SET name = ?", "WHERE id = ?"]);
    assert_eq!(params, &vec![DataType::Str(Some("Grace".to_string())), DataType::Int64(Some(3))]);
}

#[test]
fn delete_by_id_checks_key_count() {
    let mut conn = MockConnection::new(Dialect::sqlite());
    let err = rowmap::delete_by_id::<Membership, _>(&mut conn, &[1_i64.into()]).unwrap_err();
    assert!(err.is_config());
    assert!(conn.statements.is_empty());

    let affected =
        rowmap::delete_by_id::<Membership, _>(&mut conn, &[1_i64.into(), 2_i64.into()]).unwrap();
    assert_eq!(affected, 1);
    assert_sql_contains(conn.sql()[0], &["DELETE FROM memberships WHERE group_id = ? AND user_id = ?"]);
}

#[test]
fn identity_operations_need_a_key() {
    let mut conn = MockConnection::new(Dialect::sqlite());
    let entry = AuditEntry {
        message: "boot".to_string(),
    };
    assert!(rowmap::delete(&mut conn, &entry).unwrap_err().is_config());
    assert!(rowmap::load_by_id::<AuditEntry, _>(&mut conn, &[]).unwrap_err().is_config());
    assert!(rowmap::update(&mut conn, &entry, &[]).unwrap_err().is_config());
}

#[test]
fn load_by_id_found_and_missing() {
    let mut conn = MockConnection::new(Dialect::sqlite())
        .returning(vec![row(&[
            ("Order.id", DataType::Int64(Some(1))),
            ("Order.customerId", DataType::Int64(Some(7))),
            ("Order.total", DataType::Int64(Some(42))),
            ("Customer.id", DataType::Int64(Some(7))),
            ("Customer.name", DataType::Str(Some("Ada".to_string()))),
        ])])
        .returning(Vec::new());

    let order = rowmap::load_by_id::<Order, _>(&mut conn, &[1_i64.into()]).unwrap().unwrap();
    assert_eq!(order.customer.map(|customer| customer.name), Some("Ada".to_string()));
    assert_sql_contains(
        conn.sql()[0],
        &["LEFT JOIN Customer ON Customer.id = Order.customerId", "WHERE Order.id = ?"],
    );

    let missing = rowmap::load_by_id::<Order, _>(&mut conn, &[2_i64.into()]).unwrap();
    assert_eq!(missing, None);
}

#[test]
fn select_and_count_with_predicate() {
    let mut conn = MockConnection::new(Dialect::sqlite())
        .returning(vec![
            row(&[("id", DataType::Int64(Some(1))), ("total", DataType::Int64(Some(50)))]),
            row(&[("id", DataType::Int64(Some(2))), ("total", DataType::Int64(Some(60)))]),
        ])
        .returning(vec![row(&[("COUNT(*)", DataType::Int64(Some(2)))])]);

    let orders: Vec<Order> =
        rowmap::select(&mut conn, "total > ?", &[DataType::Int64(Some(40))]).unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[1].total, 60);

    let count = rowmap::count::<Order, _>(&mut conn, "total > ?", &[40_i64.into()]).unwrap();
    assert_eq!(count, 2);
    assert_sql_contains(conn.sql()[1], &["SELECT COUNT(*) FROM Order WHERE total > ?"]);
}

#[test]
fn transaction_commits_or_rolls_back() {
    let mut conn = MockConnection::new(Dialect::mysql());
    let total = transaction(&mut conn, |conn| {
        let mut order = Order::default();
        rowmap::insert(conn, &mut order)?;
        Ok(order.id)
    })
    .unwrap();
    assert_eq!(total, 100);
    assert_eq!(conn.sql().first(), Some(&"START TRANSACTION"));
    assert_eq!(conn.sql().last(), Some(&"COMMIT"));

    let mut conn = MockConnection::new(Dialect::sqlite());
    let err = transaction(&mut conn, |conn| rowmap::delete_by_id::<Membership, _>(conn, &[]))
        .unwrap_err();
    assert!(err.is_config());
    assert_eq!(conn.sql(), vec!["BEGIN", "ROLLBACK"]);
}

#[test]
fn driver_generated_keys_are_matched_by_position() {
    let mut conn = MockConnection::new(Dialect {
        generated_keys: GeneratedKeys::Driver,
        ..Dialect::postgres()
    });
    conn.unlabelled = true;
    let mut employee = Employee::default();
    rowmap::insert(&mut conn, &mut employee).unwrap();
    assert_eq!(employee.id, 100);
    assert!(!conn.sql()[0].contains("RETURNING"));
}
