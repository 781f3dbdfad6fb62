use bsky_ref::Did;
use log::trace;
use serde_derive::{Deserialize, Serialize};
use sqlx::{query, sqlite::SqliteRow, Error, Row, SqliteConnection};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawingWinner {
    pub drawing_id: String,
    pub user_did: Did,
}

pub async fn create_drawing_winners_tables(
    connection: &mut SqliteConnection,
) -> Result<(), Error> {
    trace!("Creating drawing_winners tables");

    query(
        "
        CREATE TABLE IF NOT EXISTS drawing_winners (
            id INTEGER PRIMARY KEY,
            drawing_id TEXT NOT NULL,
            user_did TEXT NOT NULL,
            FOREIGN KEY (drawing_id)
                REFERENCES drawings (id)
                ON UPDATE RESTRICT
                ON DELETE CASCADE
        )
        ",
    )
    .execute(connection)
    .await?;

    Ok(())
}

pub async fn insert_drawing_winner(
    connection: &mut SqliteConnection,
    winner: &DrawingWinner,
) -> Result<(), Error> {
    query("INSERT INTO drawing_winners (drawing_id, user_did) VALUES (?, ?)")
        .bind(&winner.drawing_id)
        .bind(winner.user_did.as_str())
        .execute(connection)
        .await?;

    Ok(())
}

/// Winner DIDs in the order they were drawn.
pub async fn select_drawing_winner_dids(
    connection: &mut SqliteConnection,
    drawing_id: &str,
) -> Result<Vec<String>, Error> {
    query("SELECT user_did FROM drawing_winners WHERE drawing_id = ? ORDER BY id")
        .bind(drawing_id)
        .map(|row: SqliteRow| row.get(0))
        .fetch_all(connection)
        .await
}

pub async fn create_drawing_winners_indices(
    connection: &mut SqliteConnection,
) -> Result<(), Error> {
    trace!("Creating drawing_winners indices");

    query(
        "CREATE INDEX IF NOT EXISTS drawing_winners_drawing_id_index on drawing_winners (drawing_id)",
    )
    .execute(connection)
    .await?;

    Ok(())
}
