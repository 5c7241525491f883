//! Round trips against a live PostgreSQL server.
//!
//! Every test is skipped unless `DATABASE_URL` is set (a `.env` file works).

#![cfg(feature = "postgres")]

use dbal::{Config, Connection, DbalResult, DriverRegistry, OrderDirection, QueryBuilder, Value};
use futures_util::StreamExt;

async fn connect(test: &str) -> DbalResult<Option<Box<dyn Connection>>> {
    dotenvy::dotenv().ok();
    let config = match Config::from_env("DATABASE_URL") {
        Ok(config) => config,
        Err(_) => {
            eprintln!("DATABASE_URL is not set; skipping {test}");
            return Ok(None);
        }
    };
    let registry = DriverRegistry::with_defaults();
    config.connect(&registry).await.map(Some)
}

fn table_name(prefix: &str) -> String {
    format!("dbal_{prefix}_{}", std::process::id())
}

#[tokio::test]
async fn crud_round_trip() -> DbalResult<()> {
    let Some(conn) = connect("crud_round_trip").await? else {
        return Ok(());
    };
    let table = table_name("book");

    conn.execute(
        &format!("CREATE TEMP TABLE {table} (book_id BIGINT PRIMARY KEY, title TEXT, pages INT)"),
        &[],
    )
    .await?;

    for (id, title, pages) in [(1_i64, "Moby Dick", 635), (2, "Dubliners", 152), (3, "Ulysses", 730)] {
        let inserted = conn
            .query()
            .insert(&table)
            .values([
                ("book_id", Value::from(id)),
                ("title", Value::from(title)),
                ("pages", Value::from(pages)),
            ])
            .execute(conn.as_ref())
            .await?;
        assert_eq!(inserted.affected_rows, 1);
    }

    let updated = conn
        .query()
        .update(&table)
        .value("title", "Moby-Dick")
        .where_(QueryBuilder::condition("book_id"))
        .add_parameter(1)
        .execute(conn.as_ref())
        .await?;
    assert_eq!(updated.affected_rows, 1);

    let result = conn
        .query()
        .select(["book_id", "title"])
        .from(table.as_str())
        .where_with(|cb| cb.gt("pages"))
        .order_by("pages", OrderDirection::Desc)
        .limit(Some(2), None)
        .add_parameter(200)
        .execute(conn.as_ref())
        .await?;
    assert_eq!(result.len(), 2);
    assert_eq!(result.rows[0].get("book_id"), Some(&Value::Int(3)));
    assert_eq!(result.rows[1].get("title"), Some(&Value::from("Moby-Dick")));

    let deleted = conn
        .query()
        .delete(&table)
        .where_with(|cb| cb.lt("pages"))
        .add_parameter(200)
        .execute(conn.as_ref())
        .await?;
    assert_eq!(deleted.affected_rows, 1);

    Ok(())
}

#[tokio::test]
async fn stream_reads_rows_in_order() -> DbalResult<()> {
    let Some(conn) = connect("stream_reads_rows_in_order").await? else {
        return Ok(());
    };

    let mut stream = conn
        .stream("SELECT generate_series(1, ?::int) AS n", &[Value::Int(5)])
        .await?;
    let mut seen = Vec::new();
    while let Some(row) = stream.next().await {
        let row = row?;
        seen.push(row.get("n").and_then(Value::as_i64));
    }
    assert_eq!(seen, vec![Some(1), Some(2), Some(3), Some(4), Some(5)]);
    assert!(!stream.is_readable());
    Ok(())
}

#[tokio::test]
async fn decodes_common_column_types() -> DbalResult<()> {
    let Some(conn) = connect("decodes_common_column_types").await? else {
        return Ok(());
    };

    let result = conn
        .execute(
            "SELECT true AS b, 2::int2 AS s, 1.5::float8 AS f, 'x'::text AS t, NULL::text AS n, \
             '{\"a\":1}'::jsonb AS j, '2024-01-02'::date AS d",
            &[],
        )
        .await?;
    let row = result.first().expect("one row");
    assert_eq!(row.get("b"), Some(&Value::Bool(true)));
    assert_eq!(row.get("s"), Some(&Value::Int(2)));
    assert_eq!(row.get("f"), Some(&Value::Float(1.5)));
    assert_eq!(row.get("t"), Some(&Value::from("x")));
    assert_eq!(row.get("n"), Some(&Value::Null));
    assert_eq!(row.get("j"), Some(&Value::from("{\"a\":1}")));
    assert_eq!(row.get("d"), Some(&Value::from("2024-01-02")));
    Ok(())
}

#[tokio::test]
async fn text_parameters_adapt_to_column_types() -> DbalResult<()> {
    let Some(conn) = connect("text_parameters_adapt_to_column_types").await? else {
        return Ok(());
    };

    let result = conn
        .execute(
            "SELECT ?::int8 + 1 AS n, ?::bool AS b",
            &[Value::from("41"), Value::from("true")],
        )
        .await?;
    let row = result.first().expect("one row");
    assert_eq!(row.get("n"), Some(&Value::Int(42)));
    assert_eq!(row.get("b"), Some(&Value::Bool(true)));
    Ok(())
}

#[tokio::test]
async fn builder_uses_postgres_quote_char() -> DbalResult<()> {
    let Some(conn) = connect("builder_uses_postgres_quote_char").await? else {
        return Ok(());
    };
    assert_eq!(conn.quote_char(), '"');
    assert_eq!(conn.query().quote_identifier("public.t"), "\"public\".\"t\"");
    Ok(())
}
