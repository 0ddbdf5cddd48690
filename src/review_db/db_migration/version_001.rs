use super::*;

pub fn migrate(conn: &SqliteConnection) -> Result<()> {
    create_table_reviews(&conn)?;

    Ok(())
}

// A review is one authored record about a single product. The structured
// columns are exactly the fields the correlation and dedup logic reads;
// everything a product-type form adds beyond them lives in the JSON payload.
fn create_table_reviews(conn: &SqliteConnection) -> Result<()> {
    sql_query(
        "CREATE TABLE reviews(
                id              INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,

                product_type    TEXT NOT NULL DEFAULT '',
                product_name    TEXT,
                cultivars       TEXT,
                breeder         TEXT,
                farm            TEXT,

                date            TEXT NOT NULL DEFAULT '',
                is_private      INTEGER NOT NULL DEFAULT 0,
                is_draft        INTEGER NOT NULL DEFAULT 0,
                correlation_key TEXT,

                image           TEXT,
                payload         TEXT NOT NULL DEFAULT '{}'
             )",
    )
    .execute(conn)?;

    Ok(())
}
