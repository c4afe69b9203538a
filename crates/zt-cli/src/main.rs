//! zt — command line client for Zero Trust Chat.
//!
//! Keys live in the local SQLite store; everything that goes over the wire
//! is sealed before it leaves this process.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use zt_client::config::TTL_CHOICES;
use zt_client::{Client, ClientConfig, HttpTransport, SessionContext};
use zt_crypto::FileMetadata;
use zt_proto::{MessageContent, MessageId};
use zt_store::{KeyStore, SqliteStore};

#[derive(Parser)]
#[command(name = "zt", about = "Zero Trust Chat client", version)]
struct Cli {
    /// Server base URL (overrides ZT_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Local key database (overrides ZT_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Username this session acts as
    #[arg(long, short, global = true, env = "ZT_USER")]
    user: Option<String>,

    /// Bearer token issued at login
    #[arg(long, global = true, env = "ZT_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate and store a keypair, printing the public key to register
    Keygen {
        /// Replace an existing key (old messages become unreadable)
        #[arg(long)]
        force: bool,
    },
    /// Print the stored public key
    Pubkey,
    /// List users known to the server
    Users,
    /// Send a text message
    Send {
        to: String,
        message: String,
        #[arg(long, value_parser = parse_ttl)]
        ttl: Option<u32>,
    },
    /// Encrypt and send a file
    SendFile {
        to: String,
        path: PathBuf,
        #[arg(long, value_parser = parse_ttl)]
        ttl: Option<u32>,
        /// MIME type recorded in the sealed metadata
        #[arg(long)]
        mime: Option<String>,
    },
    /// Download and decrypt a file attachment
    FetchFile {
        file_ref: String,
        #[arg(long, short)]
        out: PathBuf,
    },
    /// Poll once and print conversations
    Inbox {
        /// Only this peer's thread
        #[arg(long)]
        peer: Option<String>,
    },
    /// Keep syncing and print notifications until interrupted
    Watch {
        /// Peer whose typing indicator is followed
        #[arg(long)]
        peer: Option<String>,
    },
}

fn parse_ttl(s: &str) -> Result<u32, String> {
    let ttl: u32 = s.parse().map_err(|_| format!("'{s}' is not a number"))?;
    if TTL_CHOICES.contains(&ttl) {
        Ok(ttl)
    } else {
        Err(format!("ttl must be one of {TTL_CHOICES:?}"))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "zt_client=info,zt_store=info,zt_cli=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env();
    if let Some(url) = cli.api_url.clone() {
        config.api_url = url;
    }
    if let Some(db) = cli.db.clone() {
        config.db_path = db;
    }

    let user = cli
        .user
        .clone()
        .context("no user given (use --user or ZT_USER)")?;
    let store = SqliteStore::open(&config.db_path)
        .await
        .with_context(|| format!("opening {}", config.db_path.display()))?;
    let keystore = KeyStore::new(Arc::new(store));

    match &cli.command {
        Commands::Keygen { force } => {
            let keypair = keystore.register(&user, *force).await?;
            info!(target: "zt_cli", event = "keygen", user = %user, "keypair stored");
            println!("{}", keypair.public.to_b64());
            return Ok(());
        }
        Commands::Pubkey => {
            let Some(keypair) = keystore.load_keypair(&user).await? else {
                bail!("no key stored for {user}; run `zt keygen` first");
            };
            println!("{}", keypair.public.to_b64());
            return Ok(());
        }
        _ => {}
    }

    let token = cli
        .token
        .clone()
        .context("no token given (use --token or ZT_TOKEN)")?;
    let session = SessionContext::open(&keystore, &user).await?;
    let transport = Arc::new(HttpTransport::new(&config, token)?);
    let client = Client::new(config, session, transport);

    match cli.command {
        Commands::Keygen { .. } | Commands::Pubkey => {}
        Commands::Users => {
            for u in client.users().await? {
                if u.username != user {
                    println!("{}", u.username);
                }
            }
        }
        Commands::Send { to, message, ttl } => {
            let id = client.send_text(&to, &message, ttl).await?;
            println!("sent {id}");
        }
        Commands::SendFile {
            to,
            path,
            ttl,
            mime,
        } => {
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .context("path has no usable file name")?;
            let mut metadata = FileMetadata::new(name);
            if let Some(mime) = mime {
                metadata = metadata.with_type(mime);
            }
            let id = client.send_file(&to, metadata, bytes, ttl).await?;
            println!("sent {id}");
        }
        Commands::FetchFile { file_ref, out } => {
            let bytes = client.sync().download_file(&file_ref).await?;
            tokio::fs::write(&out, &bytes)
                .await
                .with_context(|| format!("writing {}", out.display()))?;
            println!("{} bytes -> {}", bytes.len(), out.display());
        }
        Commands::Inbox { peer } => {
            client.sync().tick().await?;
            let peers = match peer {
                Some(p) => vec![p],
                None => client.sync().peers(),
            };
            for p in peers {
                println!("── {p}");
                for msg in client.sync().thread(&p) {
                    print_message(&msg);
                }
            }
        }
        Commands::Watch { peer } => {
            let mut events = client.subscribe();
            client.presence().select_peer(peer.clone());
            let handle = client.start();
            info!(target: "zt_cli", event = "watch_started", user = %user, "syncing; ctrl-c to stop");

            let mut was_typing = false;
            let mut typing_check = tokio::time::interval(client.config().typing_poll_interval());
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    event = events.recv() => match event {
                        Ok(n) => println!("[{}] {}", n.from, n.preview),
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!(target: "zt_cli", skipped = n, "notifications dropped");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    },
                    _ = typing_check.tick() => {
                        let typing = client.presence().is_peer_typing();
                        if typing != was_typing {
                            if let Some(p) = peer.as_deref() {
                                println!("{p} {}", if typing { "is typing…" } else { "stopped typing" });
                            }
                            was_typing = typing;
                        }
                    }
                }
            }
            handle.shutdown().await;
            info!(target: "zt_cli", event = "watch_stopped", "sync stopped");
        }
    }

    Ok(())
}

fn print_message(msg: &zt_proto::ChatMessage) {
    let time = msg.created_at.format("%H:%M:%S");
    let status = match (&msg.id, msg.status) {
        (MessageId::Local(_), Some(s)) => format!(" ({s:?})"),
        _ => String::new(),
    };
    let extra = match &msg.content {
        MessageContent::File {
            file_ref: Some(r), ..
        } => format!(" [file ref {r}]"),
        _ => String::new(),
    };
    println!(
        "{time} {}: {}{extra}{status}",
        msg.from,
        msg.display_text()
    );
}
