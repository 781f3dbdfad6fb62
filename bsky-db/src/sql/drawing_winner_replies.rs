use bsky_ref::{Did, PostUri};
use log::trace;
use serde_derive::{Deserialize, Serialize};
use sqlx::{query, sqlite::SqliteRow, Error, Row, SqliteConnection};

/// A qualifying reply written by a winner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawingWinnerReply {
    pub reply_uri: PostUri,
    pub drawing_id: String,
    pub user_did: Did,
}

pub async fn create_drawing_winner_replies_tables(
    connection: &mut SqliteConnection,
) -> Result<(), Error> {
    trace!("Creating drawing_winner_replies tables");

    query(
        "
        CREATE TABLE IF NOT EXISTS drawing_winner_replies (
            id INTEGER PRIMARY KEY,
            reply_uri TEXT NOT NULL,
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

pub async fn insert_drawing_winner_reply(
    connection: &mut SqliteConnection,
    reply: &DrawingWinnerReply,
) -> Result<(), Error> {
    query("INSERT INTO drawing_winner_replies (reply_uri, drawing_id, user_did) VALUES (?, ?, ?)")
        .bind(reply.reply_uri.to_string())
        .bind(&reply.drawing_id)
        .bind(reply.user_did.as_str())
        .execute(connection)
        .await?;

    Ok(())
}

pub async fn select_drawing_winner_reply_uris(
    connection: &mut SqliteConnection,
    drawing_id: &str,
    user_did: &Did,
) -> Result<Vec<String>, Error> {
    query(
        "SELECT reply_uri FROM drawing_winner_replies WHERE drawing_id = ? AND user_did = ? ORDER BY id",
    )
    .bind(drawing_id)
    .bind(user_did.as_str())
    .map(|row: SqliteRow| row.get(0))
    .fetch_all(connection)
    .await
}

pub async fn create_drawing_winner_replies_indices(
    connection: &mut SqliteConnection,
) -> Result<(), Error> {
    trace!("Creating drawing_winner_replies indices");

    query(
        "CREATE INDEX IF NOT EXISTS drawing_winner_replies_drawing_id_user_did_index on drawing_winner_replies (drawing_id, user_did)",
    )
    .execute(connection)
    .await?;

    Ok(())
}
