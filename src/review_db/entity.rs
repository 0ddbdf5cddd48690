use super::schema::reviews;

// Basic entity mapping on the reviews table (1:1 copy of our schema).
// The opaque parts of a record (totals and the open field bag) ride in the
// JSON payload column.
#[derive(Debug, Queryable, Clone)]
pub struct Review {
    pub id: i64,

    pub product_type: String,
    pub product_name: Option<String>,
    pub cultivars: Option<String>,
    pub breeder: Option<String>,
    pub farm: Option<String>,

    pub date: String,
    pub is_private: bool,
    pub is_draft: bool,
    pub correlation_key: Option<String>,

    pub image: Option<String>,
    pub payload: String,
}

#[derive(Insertable)]
#[table_name = "reviews"]
pub struct InsertFull<'a> {
    pub product_type: &'a str,
    pub product_name: Option<&'a str>,
    pub cultivars: Option<&'a str>,
    pub breeder: Option<&'a str>,
    pub farm: Option<&'a str>,

    pub date: &'a str,
    pub is_private: bool,
    pub is_draft: bool,
    pub correlation_key: Option<&'a str>,

    pub image: Option<&'a str>,
    pub payload: &'a str,
}
