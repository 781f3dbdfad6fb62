use sqlx::{
    query,
    sqlite::{SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqliteRow},
    ConnectOptions, Error as SqlError, Row,
};
use std::str::FromStr;

mod drawing_winner_replies;
mod drawing_winners;
mod drawings;
mod migrations;
pub use self::drawing_winner_replies::DrawingWinnerReply;
pub(crate) use self::drawing_winner_replies::*;
pub use self::drawing_winners::DrawingWinner;
pub(crate) use self::drawing_winners::*;
pub use self::drawings::Drawing;
pub(crate) use self::drawings::*;
pub(crate) use self::migrations::is_db_up_to_date;
use self::migrations::*;

pub async fn create_connection(path: &str) -> Result<SqliteConnection, SqlError> {
    SqliteConnectOptions::from_str(path)?
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .create_if_missing(true)
        .connect()
        .await
}

pub async fn setup_new_db(connection: &mut SqliteConnection) -> Result<(), SqlError> {
    create_tables(connection).await?;
    create_indices(connection).await?;

    set_db_version(connection).await?;

    Ok(())
}

pub async fn setup_db(connection: &mut SqliteConnection) -> Result<(), SqlError> {
    set_pragmas(connection).await?;

    Ok(())
}

pub async fn check_db_integrity(connection: &mut SqliteConnection) -> Result<bool, SqlError> {
    let res: String = query("PRAGMA integrity_check")
        .map(|row: SqliteRow| -> String { row.get(0) })
        .fetch_one(connection)
        .await?;

    Ok(res == "ok")
}

async fn set_pragmas(connection: &mut SqliteConnection) -> Result<(), SqlError> {
    query("PRAGMA synchronous = NORMAL")
        .execute(&mut *connection)
        .await?;
    query("PRAGMA page_size = 4096")
        .execute(&mut *connection)
        .await?;
    Ok(())
}

async fn create_tables(connection: &mut SqliteConnection) -> Result<(), SqlError> {
    create_migrations_tables(connection).await?;
    create_drawings_tables(connection).await?;
    create_drawing_winners_tables(connection).await?;
    create_drawing_winner_replies_tables(connection).await?;

    Ok(())
}

async fn create_indices(connection: &mut SqliteConnection) -> Result<(), SqlError> {
    create_drawings_indices(connection).await?;
    create_drawing_winners_indices(connection).await?;
    create_drawing_winner_replies_indices(connection).await?;
    Ok(())
}
