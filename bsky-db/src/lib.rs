use bsky_ref::{Did, PostUri, RefError};
use log::{info, trace};
use sqlx::{Connection, SqliteConnection};
use std::{io, path::Path};
use thiserror::Error as ThisError;

pub mod sql;
pub use sql::{Drawing, DrawingWinner, DrawingWinnerReply};
use sql::*;

/// Path that opens a private in-memory database.
pub const MEMORY: &str = "sqlite::memory:";

pub struct Database {
    sql: SqliteConnection,
}

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("Failed to remove file, cause: {0}")]
    RemoveFile(#[source] io::Error),
    #[error("Stored reference is malformed, cause: {0}")]
    Ref(#[from] RefError),
    #[error("Sql error, cause: {0}")]
    Sql(#[from] sqlx::Error),
    #[error("Sql database failed integrity check")]
    SqlIntegrityCheckFailure {},
}

impl Database {
    pub async fn new(path: &str) -> Result<Self, Error> {
        let mut sql = create_connection(path).await?;

        if let Ok(false) = is_db_up_to_date(&mut sql).await {
            info!("sqlite db is out of date. Deleting db and it will be rebuilt.");
            sql.close().await?;
            if path != MEMORY && Path::new(path).exists() {
                std::fs::remove_file(path).map_err(Error::RemoveFile)?;
            }

            sql = create_connection(path).await?;
            setup_new_db(&mut sql).await?;
        }
        setup_db(&mut sql).await?;

        Ok(Self { sql })
    }

    /// Stores a drawing with its winners and their replies, all or nothing.
    pub async fn insert_drawing(
        &mut self,
        drawing: &Drawing,
        winners: &[DrawingWinner],
        replies: &[DrawingWinnerReply],
    ) -> Result<(), Error> {
        trace!(
            "Inserting drawing {} with {} winners and {} replies",
            drawing.id,
            winners.len(),
            replies.len()
        );

        let mut tx = self.sql.begin().await?;
        insert_drawing_row(&mut tx, drawing).await?;
        for winner in winners {
            insert_drawing_winner(&mut tx, winner).await?;
        }
        for reply in replies {
            insert_drawing_winner_reply(&mut tx, reply).await?;
        }
        tx.commit().await?;

        Ok(())
    }

    // queries

    pub async fn get_drawing(&mut self, id: &str) -> Result<Option<Drawing>, Error> {
        let row = select_drawing(&mut self.sql, id).await?;
        let drawing = match row {
            Some((id, author_did, post_id, draw_date, entries, verified)) => Some(Drawing {
                id,
                author_did: Did::from_string(author_did)?,
                post_id,
                draw_date,
                entries,
                verified,
            }),
            None => None,
        };
        Ok(drawing)
    }

    pub async fn get_drawing_winners(&mut self, id: &str) -> Result<Vec<DrawingWinner>, Error> {
        select_drawing_winner_dids(&mut self.sql, id)
            .await?
            .into_iter()
            .map(|user_did| -> Result<DrawingWinner, Error> {
                Ok(DrawingWinner {
                    drawing_id: id.to_string(),
                    user_did: Did::from_string(user_did)?,
                })
            })
            .collect()
    }

    pub async fn get_drawing_winner_replies(
        &mut self,
        id: &str,
        user_did: &Did,
    ) -> Result<Vec<DrawingWinnerReply>, Error> {
        select_drawing_winner_reply_uris(&mut self.sql, id, user_did)
            .await?
            .into_iter()
            .map(|reply_uri| -> Result<DrawingWinnerReply, Error> {
                Ok(DrawingWinnerReply {
                    reply_uri: PostUri::from_string(reply_uri)?,
                    drawing_id: id.to_string(),
                    user_did: user_did.clone(),
                })
            })
            .collect()
    }

    pub async fn check_integrity(&mut self) -> Result<(), Error> {
        if check_db_integrity(&mut self.sql).await? {
            Ok(())
        } else {
            Err(Error::SqlIntegrityCheckFailure {})
        }
    }
}
