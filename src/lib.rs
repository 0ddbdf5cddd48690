#[macro_use]
extern crate diesel;

pub mod correlation;
pub mod dedup;
pub mod image_file;
pub mod record_store;
pub mod remote_store;
pub mod review_db;
pub mod review_record;
