//! Integration tests for row materialization and join reconstruction.

#![allow(missing_docs)]

mod common;

use chrono::NaiveDate;
use common::{Customer, Employee, Order, Priority, Task, row};
use rowmap::{
    DataType, Dialect, Field, InsertBuilder, Row, describe, materialize, materialize_all,
    materialize_erased, materialize_first,
};

fn order_row() -> Row {
    row(&[
        ("Order.id", DataType::Int64(Some(1))),
        ("Order.customerId", DataType::Int64(Some(7))),
        ("Order.total", DataType::Int64(Some(42))),
        ("Customer.id", DataType::Int64(Some(7))),
        ("Customer.name", DataType::Str(Some("Ada".to_string()))),
    ])
}

#[test]
fn order_with_customer() {
    let order = materialize::<Order>(&Dialect::sqlite(), &order_row()).unwrap();
    assert_eq!(
        order,
        Order {
            id: 1,
            customer: Some(Box::new(Customer {
                id: 7,
                name: "Ada".to_string(),
            })),
            total: 42,
        }
    );
}

#[test]
fn outer_join_miss_leaves_relation_unset() {
    let order = materialize::<Order>(&Dialect::sqlite(), &row(&[
        ("Order.id", DataType::Int64(Some(2))),
        ("Order.customerId", DataType::Int64(None)),
        ("Order.total", DataType::Int64(Some(5))),
        ("Customer.id", DataType::Int64(None)),
        ("Customer.name", DataType::Str(None)),
    ]))
    .unwrap();
    assert_eq!(order.id, 2);
    assert_eq!(order.customer, None);

    let root_only = row(&[("Order.id", DataType::Int64(Some(3))), ("Order.total", DataType::Int64(Some(9)))]);
    let order = materialize::<Order>(&Dialect::sqlite(), &root_only).unwrap();
    assert_eq!(order.total, 9);
    assert_eq!(order.customer, None);
}

#[test]
fn child_from_key_column_alone() {
    let order = materialize::<Order>(&Dialect::sqlite(), &row(&[
        ("Order.id", DataType::Int64(Some(4))),
        ("Customer.id", DataType::Int64(Some(11))),
    ]))
    .unwrap();
    let customer = order.customer.unwrap();
    assert_eq!(customer.id, 11);
    assert_eq!(customer.name, "");
}

#[test]
fn self_join_one_level_deep() {
    let employee = materialize::<Employee>(&Dialect::sqlite(), &row(&[
        ("employees.id", DataType::Int64(Some(2))),
        ("employees.name", DataType::Str(Some("Grace".to_string()))),
        ("employees.manager_id", DataType::Int64(Some(1))),
        ("manager.id", DataType::Int64(Some(1))),
        ("manager.name", DataType::Str(Some("Ada".to_string()))),
        ("manager.manager_id", DataType::Int64(Some(99))),
    ]))
    .unwrap();

    assert_eq!(employee.name, "Grace");
    let manager = employee.manager.unwrap();
    assert_eq!(manager.id, 1);
    assert_eq!(manager.name, "Ada");
    assert_eq!(manager.manager, None);
}

#[test]
fn bare_labels_and_unmapped_columns() {
    let order = materialize::<Order>(&Dialect::sqlite(), &row(&[
        ("ID", DataType::Int64(Some(5))),
        ("total", DataType::Int32(Some(17))),
        ("rownum", DataType::Int64(Some(1))),
    ]))
    .unwrap();
    assert_eq!(order.id, 5);
    assert_eq!(order.total, 17);
}

#[test]
fn materialize_is_idempotent() {
    let row = order_row();
    let first = materialize::<Order>(&Dialect::sqlite(), &row).unwrap();
    let second = materialize::<Order>(&Dialect::sqlite(), &row).unwrap();
    assert_eq!(first, second);
}

#[test]
fn enums_round_trip_under_both_encodings() {
    let template = InsertBuilder::<Task>::new().build(&Dialect::sqlite()).unwrap();

    for priority in Priority::VARIANTS.iter().copied() {
        let task = Task {
            id: 1,
            title: "ship".to_string(),
            priority,
            rank: priority,
            due: NaiveDate::from_ymd_opt(2024, 2, 29),
        };
        let stored = template.bind(&task).unwrap();
        let mut fields: Vec<Field> = template
            .columns()
            .zip(stored)
            .map(|(column, value)| Field::new(format!("Tasks.{column}"), value))
            .collect();
        fields.push(Field::new("Tasks.id", 1_i64));

        let loaded = materialize::<Task>(&Dialect::sqlite(), &Row::new(fields)).unwrap();
        assert_eq!(loaded, task);
    }
}

#[test]
fn enum_name_is_case_sensitive() {
    let err = materialize::<Task>(&Dialect::sqlite(), &row(&[("Tasks.priority", DataType::Str(Some("high".to_string())))]))
        .unwrap_err();
    assert!(err.is_conversion());
    assert!(err.to_string().contains("Tasks.priority"), "{err}");
}

#[test]
fn delimited_columns_match_exact_case() {
    let task = materialize::<Task>(&Dialect::sqlite(), &row(&[
        ("Tasks.id", DataType::Int64(Some(1))),
        ("Tasks.title", DataType::Str(Some("lower".to_string()))),
        ("Tasks.Title", DataType::Str(Some("exact".to_string()))),
        ("TASKS.DUE", DataType::Str(None)),
    ]))
    .unwrap();
    assert_eq!(task.title, "exact");

    let task = materialize::<Task>(&Dialect::sqlite(), &row(&[("tasks.Title", DataType::Str(Some("x".to_string())))]))
        .unwrap();
    assert_eq!(task.title, "");
}

#[test]
fn case_sensitive_dialect_matches_plain_columns_exactly() {
    let strict = Dialect {
        case_sensitive: true,
        ..Dialect::postgres()
    };
    let labels = row(&[
        ("Customer.ID", DataType::Int64(Some(7))),
        ("Customer.name", DataType::Str(Some("Ada".to_string()))),
    ]);

    let customer = materialize::<Customer>(&strict, &labels).unwrap();
    assert_eq!(customer.id, 0);
    assert_eq!(customer.name, "Ada");

    let customer = materialize::<Customer>(&Dialect::postgres(), &labels).unwrap();
    assert_eq!(customer.id, 7);
}

#[test]
fn reserved_table_name_is_matched_exactly() {
    let order = materialize::<Order>(&Dialect::sqlite(), &row(&[
        ("order.id", DataType::Int64(Some(1))),
        ("Order.total", DataType::Int64(Some(8))),
    ]))
    .unwrap();
    assert_eq!(order.id, 0);
    assert_eq!(order.total, 8);
}

#[test]
fn lenient_numeric_coercion() {
    let order = materialize::<Order>(&Dialect::sqlite(), &row(&[
        ("Order.id", DataType::Str(Some("12".to_string()))),
        ("Order.total", DataType::Double(Some(3.0))),
    ]));
    let order = order.unwrap();
    assert_eq!(order.id, 12);
    assert_eq!(order.total, 3);
}

#[test]
fn many_rows_in_result_order() {
    let rows = vec![
        order_row(),
        row(&[("Order.id", DataType::Int64(Some(2)))]),
        row(&[("Order.id", DataType::Int64(Some(3)))]),
    ];
    let ids: Vec<i64> = materialize_all::<Order, _>(&Dialect::sqlite(), rows)
        .unwrap()
        .map(|order| order.map(|order| order.id))
        .collect::<rowmap::Result<_>>()
        .unwrap();
    assert_eq!(ids, vec![1, 2, 3]);

    assert_eq!(materialize_first::<Order>(&Dialect::sqlite(), Vec::new()).unwrap(), None);
}

#[test]
fn erased_materialization() {
    let meta = describe::<Customer>().unwrap();
    let instance = materialize_erased(
        &meta,
        &Dialect::sqlite(),
        &row(&[("Customer.id", DataType::Int64(Some(7))), ("Customer.name", DataType::Str(Some("Ada".to_string())))]),
    )
    .unwrap();
    let customer = instance.downcast::<Customer>().unwrap();
    assert_eq!(customer.name, "Ada");
}
