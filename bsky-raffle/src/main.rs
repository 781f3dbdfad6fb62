use bsky_client::{ClientConfig, Credentials, XrpcConnector, DEFAULT_SERVICE};
use bsky_db::{Database, Drawing, DrawingWinner, DrawingWinnerReply};
use bsky_draw::{
    connect, draw_winners, drawing_info, parse_post, verify_handle, DrawError, DrawOptions,
    DrawResult,
};
use bsky_ref::{Did, PostUri};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use log::{debug, info};
use serde::Serialize;
use serde_json::json;
use std::{collections::BTreeMap, io, path::PathBuf, process, time::Duration};
use thiserror::Error as ThisError;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Draw raffle winners from the people who engaged with a Bluesky post"
)]
struct Cli {
    #[command(flatten)]
    config: Config,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct Config {
    /// Bluesky service to talk to
    #[arg(long, env = "BSKY_SERVICE", default_value = DEFAULT_SERVICE, global = true)]
    service: String,

    /// Account used for unverified draws
    #[arg(long, env = "BSKY_IDENTIFIER", global = true)]
    identifier: Option<String>,

    #[arg(long = "login-password", env = "BSKY_PASSWORD", hide_env_values = true, global = true)]
    login_password: Option<String>,

    /// Defaults to ~/.bsky-raffle/drawings.sqlite3
    #[arg(long, env = "DB_PATH", global = true)]
    db_path: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long = "timeout", env = "BSKY_TIMEOUT_SECS", default_value_t = 30, global = true)]
    timeout_secs: u64,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Draw winners for a post and store the drawing
    Draw(DrawArgs),
    /// Show a stored drawing
    Drawing { id: String },
    /// Show the engagement collected for a post
    Parse { url: String },
    /// Check an app password against a handle
    Verify { handle: String, password: String },
}

#[derive(Args, Debug)]
struct DrawArgs {
    /// Web URL of the post, e.g. https://bsky.app/profile/alice.bsky.social/post/3k...
    url: String,
    #[arg(long, default_value_t = 1)]
    winners: usize,
    #[arg(long)]
    require_repost: bool,
    #[arg(long)]
    require_like: bool,
    #[arg(long)]
    require_follow: bool,
    #[arg(long)]
    require_reply: bool,
    #[arg(long)]
    require_reply_image: bool,
    /// App password of the post author; makes the drawing verified
    #[arg(long)]
    password: Option<String>,
    /// Print the full result as JSON
    #[arg(long)]
    json: bool,
}

impl From<&DrawArgs> for DrawOptions {
    fn from(args: &DrawArgs) -> Self {
        DrawOptions {
            winner_count: args.winners,
            require_repost: args.require_repost,
            require_like: args.require_like,
            require_follow: args.require_follow,
            require_reply: args.require_reply,
            require_reply_image: args.require_reply_image,
            password: args.password.clone(),
        }
    }
}

#[derive(Debug, ThisError)]
enum AppError {
    #[error(transparent)]
    Draw(#[from] DrawError),
    #[error(transparent)]
    Client(#[from] bsky_client::Error),
    #[error(transparent)]
    Db(#[from] bsky_db::Error),
    #[error("Failed to create {path}, cause: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("Failed to encode output, cause: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Missing login, set BSKY_IDENTIFIER and BSKY_PASSWORD")]
    MissingLogin,
    #[error("No home directory found, set DB_PATH")]
    NoHomeDir,
    #[error("Unable to find drawing with ID \"{0}\"")]
    DrawingNotFound(String),
}

impl Config {
    fn client_config(&self) -> ClientConfig {
        ClientConfig {
            service: self.service.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }

    fn credentials(&self) -> Result<Credentials, AppError> {
        match (&self.identifier, &self.login_password) {
            (Some(identifier), Some(password)) => Ok(Credentials::new(identifier, password)),
            _ => Err(AppError::MissingLogin),
        }
    }

    fn db_path(&self) -> Result<PathBuf, AppError> {
        match &self.db_path {
            Some(path) => Ok(path.clone()),
            None => simple_home_dir::home_dir()
                .map(|home| home.join(".bsky-raffle").join("drawings.sqlite3"))
                .ok_or(AppError::NoHomeDir),
        }
    }

    async fn open_db(&self) -> Result<Database, AppError> {
        let path = self.db_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| AppError::CreateDir {
                path: parent.display().to_string(),
                source,
            })?;
        }

        debug!("Opening {}", path.display());
        let mut db = Database::new(&path.to_string_lossy()).await?;
        db.check_integrity().await?;
        Ok(db)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(error) = run(Cli::parse()).await {
        eprintln!("Error: {}", error);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let config = cli.config;
    let connector = XrpcConnector::new(&config.client_config())?;

    match cli.command {
        Command::Draw(args) => {
            let options = DrawOptions::from(&args);
            let defaults = match config.credentials() {
                Ok(credentials) => credentials,
                // verified draws log in as the post author instead
                Err(_) if options.password.is_some() => Credentials::new("", ""),
                Err(error) => return Err(error),
            };
            let mut db = config.open_db().await?;

            let result = draw_winners(
                &connector,
                &defaults,
                &args.url,
                &options,
                &mut rand::thread_rng(),
            )
            .await?;

            let (drawing, winners, replies) =
                drawing_rows(Uuid::new_v4().to_string(), Utc::now().timestamp_millis(), &result);
            db.insert_drawing(&drawing, &winners, &replies).await?;
            info!("Stored drawing {}", drawing.id);

            println!("{}", drawing.id);
            if args.json {
                print_json(&result)?;
            }
        }
        Command::Drawing { id } => {
            let mut db = config.open_db().await?;
            let drawing = db
                .get_drawing(&id)
                .await?
                .ok_or_else(|| AppError::DrawingNotFound(id.clone()))?;
            let winners = db.get_drawing_winners(&id).await?;
            if winners.is_empty() {
                return Err(AppError::DrawingNotFound(id));
            }

            let winner_dids: Vec<Did> = winners.into_iter().map(|winner| winner.user_did).collect();
            let mut reply_uris: BTreeMap<Did, Vec<PostUri>> = BTreeMap::new();
            for did in &winner_dids {
                let uris = db
                    .get_drawing_winner_replies(&id, did)
                    .await?
                    .into_iter()
                    .map(|reply| reply.reply_uri)
                    .collect();
                reply_uris.insert(did.clone(), uris);
            }

            let upstream = connect(&connector, &config.credentials()?).await?;
            let info = drawing_info(
                &upstream,
                &drawing.author_did,
                &drawing.post_id,
                &winner_dids,
                &reply_uris,
            )
            .await?;

            print_json(&json!({ "drawing": drawing, "info": info }))?;
        }
        Command::Parse { url } => {
            let snapshot = parse_post(&connector, &config.credentials()?, &url).await?;
            print_json(&snapshot)?;
        }
        Command::Verify { handle, password } => {
            let verification = verify_handle(&connector, &handle, &password).await?;
            print_json(&verification)?;
        }
    }

    Ok(())
}

/// Rows persisted for a finished draw.
fn drawing_rows(
    id: String,
    draw_date: i64,
    result: &DrawResult,
) -> (Drawing, Vec<DrawingWinner>, Vec<DrawingWinnerReply>) {
    let winners = result
        .winners
        .iter()
        .map(|winner| DrawingWinner {
            drawing_id: id.clone(),
            user_did: winner.did.clone(),
        })
        .collect();

    // A reply URI names its author, so it carries the winner's DID.
    let replies = result
        .winning_replies
        .iter()
        .flat_map(|by_winner| by_winner.values().flatten())
        .map(|reply| DrawingWinnerReply {
            reply_uri: reply.uri.clone(),
            drawing_id: id.clone(),
            user_did: reply.uri.did().clone(),
        })
        .collect();

    let drawing = Drawing {
        id,
        author_did: result.post_info.post.author.did.clone(),
        post_id: result.post_info.post_id.clone(),
        draw_date,
        entries: result.final_entrant_pool.len() as i64,
        verified: result.verified,
    };

    (drawing, winners, replies)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
