use bsky_ref::Did;
use log::trace;
use serde_derive::{Deserialize, Serialize};
use sqlx::{query, sqlite::SqliteRow, Error, Row, SqliteConnection};

/// One completed draw.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Drawing {
    pub id: String,
    pub author_did: Did,
    pub post_id: String,
    /// Milliseconds since the unix epoch.
    pub draw_date: i64,
    /// Size of the eligible pool.
    pub entries: i64,
    pub verified: bool,
}

pub(crate) type DrawingRow = (String, String, String, i64, i64, bool);

pub async fn create_drawings_tables(connection: &mut SqliteConnection) -> Result<(), Error> {
    trace!("Creating drawings tables");

    query(
        "
        CREATE TABLE IF NOT EXISTS drawings (
            id TEXT PRIMARY KEY,
            author_did TEXT NOT NULL,
            post_id TEXT NOT NULL,
            draw_date INTEGER NOT NULL,
            entries INTEGER NOT NULL,
            verified BOOLEAN NOT NULL
        )
        ",
    )
    .execute(connection)
    .await?;

    Ok(())
}

pub async fn insert_drawing_row(
    connection: &mut SqliteConnection,
    drawing: &Drawing,
) -> Result<(), Error> {
    query(
        "INSERT INTO drawings (id, author_did, post_id, draw_date, entries, verified) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&drawing.id)
    .bind(drawing.author_did.as_str())
    .bind(&drawing.post_id)
    .bind(drawing.draw_date)
    .bind(drawing.entries)
    .bind(drawing.verified)
    .execute(connection)
    .await?;

    Ok(())
}

pub async fn select_drawing(
    connection: &mut SqliteConnection,
    id: &str,
) -> Result<Option<DrawingRow>, Error> {
    query(
        "SELECT id, author_did, post_id, draw_date, entries, verified FROM drawings WHERE id = ?",
    )
    .bind(id)
    .map(|row: SqliteRow| {
        (
            row.get(0),
            row.get(1),
            row.get(2),
            row.get(3),
            row.get(4),
            row.get(5),
        )
    })
    .fetch_optional(connection)
    .await
}

pub async fn create_drawings_indices(connection: &mut SqliteConnection) -> Result<(), Error> {
    trace!("Creating drawings indices");

    query("CREATE INDEX IF NOT EXISTS drawings_author_did_index on drawings (author_did)")
        .execute(connection)
        .await?;

    Ok(())
}
