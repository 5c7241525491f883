//! An UPDATE across joined tables, and its stored (JSON) form.
//!
//! Run with:
//!   cargo run --example update_join -p dbal

use dbal::{DbalResult, QueryBuilder, Value};

fn main() -> DbalResult<()> {
    let qb = QueryBuilder::new()
        .update("address")
        .join(
            "customer_address",
            "customer_address.address_id = address.address_id",
            None,
        )
        .join(
            "address_status",
            "address_status.status_id = customer_address.status_id",
            None,
        )
        .value("address.street_name", "Main street")
        .where_with(|cb| {
            cb.and([
                cb.eq("customer_address.customer_id"),
                cb.eq("address_status.address_status"),
            ])
        })
        .add_parameters([Value::Int(1), Value::from("Active")]);

    println!("SQL: {}", qb.to_sql()?);
    println!("Params: {:?}", qb.parameters());

    let stored = qb.to_json()?;
    println!("Stored: {stored:#}");

    let restored = QueryBuilder::from_json(stored)?;
    assert_eq!(restored.to_sql()?, qb.to_sql()?);
    Ok(())
}
