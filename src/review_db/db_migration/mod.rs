/// Module performing database migrations to newer application/database format versions.
/// Used on an existing DB connection to upgrade it to the most recent version.
///
/// upgrade_db(&connection); // upgrades to latest DB version
mod version_001;
mod version_002;

mod errors;
pub use self::errors::{MigrationError, Result};

use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::Integer;
use diesel::sqlite::SqliteConnection;

pub type DBVersion = u32;
const REQUIRED_DB_VERSION: DBVersion = 2;

/// Upgrades the given database connection to the REQUIRED_DB_VERSION of the
/// current application build.
///
/// As the application and therefore the database schema evolves, this routine is
/// used to step-by-step keep database files up to date with the application.
///
/// MUST be run before any other action on the database to make sure it's compatible.
pub fn upgrade_db(connection: &SqliteConnection) -> Result<DBVersion> {
    loop {
        let current_version = read_db_version(&connection)?;
        if current_version < REQUIRED_DB_VERSION {
            migrate_up_from(connection, current_version)?;
        } else {
            return Ok(current_version);
        }
    }
}

/// Migrates the given database connection from the DBVersion version to (version + 1).
/// Expects the database to be in the given version and updates the user_version pragma
/// to the new (version + 1) value if successful.
///
/// Does not wrap the operation in a transaction,
/// the caller is supposed to if a rollback might be required.
fn migrate_up_from(connection: &SqliteConnection, version: DBVersion) -> Result<()> {
    match version {
        // Just run the known migration steps as regular functions.
        0 => version_001::migrate(&connection)?,
        1 => version_002::migrate(&connection)?,
        // We do not know how to handle this migration.
        _ => return Err(MigrationError::UnknownDBVersion { version }),
    };

    write_db_version(&connection, version + 1)?;
    Ok(())
}

#[derive(QueryableByName)]
struct UserVersionRow {
    #[sql_type = "Integer"]
    user_version: i32,
}

fn read_db_version(connection: &SqliteConnection) -> Result<DBVersion> {
    let row: UserVersionRow = sql_query("PRAGMA user_version")
        .get_result(connection)
        .map_err(|source| MigrationError::ReadWriteDBVersion { source })?;

    Ok(row.user_version as DBVersion)
}

fn write_db_version(connection: &SqliteConnection, version: DBVersion) -> Result<()> {
    sql_query(format!("PRAGMA user_version = {}", version))
        .execute(connection)
        .map_err(|source| MigrationError::ReadWriteDBVersion { source })?;

    Ok(())
}
