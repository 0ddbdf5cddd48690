use super::*;

pub fn migrate(conn: &SqliteConnection) -> Result<()> {
    create_index_review_date(&conn)?;
    create_index_review_type(&conn)?;

    Ok(())
}

// Creates an index to list reviews by modification date.
// Callers sort their library views by date, worth speeding up.
fn create_index_review_date(conn: &SqliteConnection) -> Result<()> {
    sql_query("CREATE INDEX review_date_idx ON reviews(date)").execute(conn)?;
    Ok(())
}

// Creates an index to filter reviews by their product type.
fn create_index_review_type(conn: &SqliteConnection) -> Result<()> {
    sql_query("CREATE INDEX review_type_idx ON reviews(product_type)").execute(conn)?;
    Ok(())
}
