//! Integration tests for the object graph: naming, cascades and the
//! referential guards that keep handles consistent.

mod common;

use common::{flush, table_with};
use oxide_schema::prelude::*;

/// `customers(id, code)` with a unique index on `code`, and
/// `orders(id, customer_code)` with a foreign key into that index.
struct Shop {
    db: Database,
    customers: TableId,
    orders: TableId,
    code_index: IndexId,
    order_key: ForeignKeyId,
}

fn shop() -> Shop {
    let mut db = Database::sqlite();
    let main = db.default_schema();
    let (customers, cols) = table_with(
        &mut db,
        main,
        "customers",
        &[
            ColumnDefinition::new("id", DataType::Bigint).not_null(),
            ColumnDefinition::new("code", DataType::Text).not_null(),
        ],
    );
    db.create_primary_key(customers, "pk_customers", &[cols[0]])
        .unwrap();
    let code_index = db
        .create_index(
            customers,
            IndexDefinition::new("uq_customers_code").column(cols[1]).unique(),
        )
        .unwrap();

    let (orders, cols) = table_with(
        &mut db,
        main,
        "orders",
        &[
            ColumnDefinition::new("id", DataType::Bigint).not_null(),
            ColumnDefinition::new("customer_code", DataType::Text),
        ],
    );
    db.create_primary_key(orders, "pk_orders", &[cols[0]]).unwrap();
    let origin = db
        .create_index(
            orders,
            IndexDefinition::new("ix_orders_customer").column(cols[1]),
        )
        .unwrap();
    let order_key = db
        .create_foreign_key(
            ForeignKeyDefinition::new("fk_orders_customer", origin)
                .references(code_index)
                .on_delete(ForeignKeyAction::Cascade),
        )
        .unwrap();
    db.accept_changes();

    Shop {
        db,
        customers,
        orders,
        code_index,
        order_key,
    }
}

// =============================================================================
// Naming
// =============================================================================

#[test]
fn contains_follows_insert_and_remove() {
    let mut db = Database::postgres();
    let public = db.default_schema();
    let (table, cols) = table_with(
        &mut db,
        public,
        "Accounts",
        &[ColumnDefinition::new("balance", DataType::Double)],
    );

    assert!(db.contains::<TableId>(public, "accounts"), "Lookup ignores case");
    assert!(db.contains::<ColumnId>(table, "BALANCE"));
    assert!(
        matches!(
            db.get::<ViewId>(public, "accounts"),
            Err(SchemaError::TypeMismatch { .. })
        ),
        "Tables and views share the schema namespace"
    );
    assert_eq!(db.get::<TableId>(public, "ACCOUNTS").unwrap(), table);

    db.remove(cols[0]).unwrap();
    assert!(!db.contains::<ColumnId>(table, "balance"));
    assert!(db.is_removed(cols[0]).unwrap());

    db.remove(table).unwrap();
    assert!(!db.contains::<TableId>(public, "accounts"));
    assert!(matches!(
        db.get::<TableId>(public, "accounts"),
        Err(SchemaError::NotFound { .. })
    ));

    // The freed name can be taken again.
    db.create_table(public, "accounts").unwrap();
    assert!(db.contains::<TableId>(public, "accounts"));
}

#[test]
fn names_conflict_across_kinds_in_a_schema() {
    let mut db = Database::postgres();
    let public = db.default_schema();
    let (table, _) = table_with(
        &mut db,
        public,
        "events",
        &[ColumnDefinition::new("id", DataType::Bigint)],
    );
    let err = db
        .create_view(public, "EVENTS", ViewQuery::select_from(table).all())
        .unwrap_err();
    assert!(matches!(err, SchemaError::NameConflict { .. }), "Got {err:?}");
}

#[test]
fn double_rename_reports_the_pre_batch_name() {
    let mut db = Database::sqlite();
    let main = db.default_schema();
    let (table, cols) = table_with(
        &mut db,
        main,
        "t",
        &[ColumnDefinition::new("a", DataType::Integer)],
    );
    db.accept_changes();

    db.rename(cols[0], "b").unwrap();
    db.rename(cols[0], "c").unwrap();

    assert_eq!(
        db.original_value(cols[0], Descriptor::Name),
        Some(&TrackedValue::Name(String::from("a")))
    );
    let changes = db.changes_for(cols[0]).unwrap();
    assert_eq!(changes.len(), 1, "Repeated renames collapse into one diff");
    assert_eq!(
        changes[0].current,
        Some(TrackedValue::Name(String::from("c")))
    );
    assert!(db.contains::<ColumnId>(table, "c"));
    assert!(!db.contains::<ColumnId>(table, "b"));

    let actions = flush(&mut db);
    assert_eq!(actions, vec!["ALTER TABLE \"t\" RENAME COLUMN \"a\" TO \"c\";"]);
}

#[test]
fn create_then_remove_in_one_batch_emits_nothing() {
    let mut db = Database::sqlite();
    let main = db.default_schema();
    let (table, _) = table_with(
        &mut db,
        main,
        "scratch",
        &[ColumnDefinition::new("a", DataType::Integer)],
    );
    db.remove(table).unwrap();

    assert!(!db.has_pending_changes());
    assert!(flush(&mut db).is_empty());
}

// =============================================================================
// Cascades
// =============================================================================

#[test]
fn table_removal_cascades_without_lingering_references() {
    let Shop {
        mut db,
        customers,
        orders,
        code_index,
        order_key,
    } = shop();

    let err = db.remove(customers).unwrap_err();
    assert!(err.is_referential(), "Got {err:?}");
    assert!(!db.is_removed(customers).unwrap());
    assert!(!db.has_pending_changes(), "A refused removal changes nothing");

    let order_columns = db.columns(orders).unwrap();
    db.remove(orders).unwrap();
    assert!(db.is_removed(order_key).unwrap());
    assert!(
        db.index(code_index).unwrap().referencing_keys().is_empty(),
        "Removed foreign key must release the referenced index"
    );
    for column in order_columns {
        assert!(db.is_removed(column).unwrap());
    }
    assert!(!db.contains::<IndexId>(db.default_schema(), "ix_orders_customer"));

    db.remove(customers).unwrap();
    assert!(db.tables(db.default_schema()).unwrap().is_empty());

    let actions = flush(&mut db);
    assert_eq!(
        actions,
        vec!["DROP TABLE \"orders\";", "DROP TABLE \"customers\";"],
        "Referencing table is dropped first"
    );
}

#[test]
fn removed_objects_reject_mutation() {
    let Shop {
        mut db, orders, ..
    } = shop();
    let column = db.get::<ColumnId>(orders, "customer_code").unwrap();
    db.remove(orders).unwrap();

    assert!(matches!(
        db.rename(column, "other"),
        Err(SchemaError::AlreadyRemoved { .. })
    ));
    assert!(matches!(
        db.set_nullable(column, false),
        Err(SchemaError::AlreadyRemoved { .. })
    ));
}

// =============================================================================
// Referential guards
// =============================================================================

#[test]
fn referenced_unique_index_stays_unique() {
    let Shop {
        mut db,
        code_index,
        order_key,
        ..
    } = shop();

    let err = db.set_unique(code_index, false).unwrap_err();
    assert!(
        matches!(err, SchemaError::ReferentialViolation { .. }),
        "Got {err:?}"
    );
    assert!(db.index(code_index).unwrap().is_unique());
    assert!(!db.has_pending_changes());

    let err = db.remove(code_index).unwrap_err();
    assert!(err.is_referential(), "Got {err:?}");
    assert!(!db.is_removed(code_index).unwrap());
    assert!(!db.is_removed(order_key).unwrap());
    assert!(!db.has_pending_changes());

    // Once the key is gone both changes go through.
    db.remove(order_key).unwrap();
    db.set_unique(code_index, false).unwrap();
    db.remove(code_index).unwrap();
}

#[test]
fn view_blocks_column_removal() {
    let Shop {
        mut db, customers, ..
    } = shop();
    let main = db.default_schema();
    let code = db.get::<ColumnId>(customers, "code").unwrap();
    let view = db
        .create_view(main, "customer_codes", ViewQuery::select_from(customers).column(code))
        .unwrap();

    let err = db.remove(code).unwrap_err();
    assert!(err.is_referential(), "Got {err:?}");

    assert_eq!(err.violation_count(), 2, "Index and view are both reported");

    db.remove(view).unwrap();
    let err = db.remove(code).unwrap_err();
    assert!(err.to_string().contains("uq_customers_code"), "Got {err}");
}
