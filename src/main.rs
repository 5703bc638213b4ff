use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use notes_sync::config::{self, Config};
use notes_sync::connectivity::{self, ConnectivityObserver, ProbeTarget};
use notes_sync::edit::EditSession;
use notes_sync::model::UNSET;
use notes_sync::view::{self, NotesView, Recovery};
use notes_sync::{
    FetchOutcome, HttpNotesClient, NewNote, Note, NotePatch, NotesState, NotesStore, StoreOptions,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Command-line client for a notes REST API")]
struct Args {
    /// Path to YAML config file; built-in defaults apply when it does not exist
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Override api.base_url (takes precedence over NOTES_API_URL)
    #[arg(long)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch and print all notes
    List,
    /// Print how many notes the server holds
    Count,
    /// Create a note
    New {
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
    },
    /// Edit the title and/or content of a note
    Edit {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
    },
    /// Delete a note
    Delete { id: i64 },
    /// Delete every note
    Clear,
    /// Keep the list fresh and re-render on every change until Ctrl-C
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = load_config(&args)?;

    let client = HttpNotesClient::from_config(&cfg)?;
    let target = ProbeTarget::from_url(client.base_url())
        .ok_or_else(|| anyhow!("api.base_url has no host"))?;
    let observer = ConnectivityObserver::new(true);
    let store = NotesStore::builder(Arc::new(client))
        .options(StoreOptions::from(&cfg))
        .connectivity(observer.clone())
        .build();

    match args.command {
        Command::List => {
            if let FetchOutcome::Failed(_) = store.fetch_all().await {
                observer.report(connectivity::probe(&target, cfg.probe_timeout()).await);
            }
            render(&store.snapshot(), observer.is_online());
        }
        Command::Count => {
            println!("{}", store.count().await?);
        }
        Command::New { title, content } => {
            let note = NewNote::new(
                title.unwrap_or_else(|| UNSET.into()),
                content.unwrap_or_else(|| UNSET.into()),
            );
            let created = store.create_note(note).await?;
            println!("created {}", describe(&created));
        }
        Command::Edit { id, title, content } => {
            if let FetchOutcome::Failed(err) = store.fetch_all().await {
                return Err(err.into());
            }
            let mut session = EditSession::new(store.clone());
            if !session.set_note_id(Some(id)) {
                bail!("note {} not found", id);
            }
            let patch = NotePatch { title, content };
            if patch.is_empty() {
                warn!(id, "nothing to change; saving note as is");
            }
            session.set_note(patch);
            let saved = session.save_note().await?;
            println!("updated {}", describe(&saved));
        }
        Command::Delete { id } => {
            store.delete_note(id).await?;
            println!("deleted note {}", id);
        }
        Command::Clear => {
            store.clear_notes().await?;
            println!("cleared all notes");
        }
        Command::Watch => watch(&cfg, target, &store, &observer).await,
    }

    Ok(())
}

/// Config file (optional), then `NOTES_API_URL`, then `--base-url`.
fn load_config(args: &Args) -> Result<Config> {
    let mut cfg = if args.config.exists() {
        config::load(Some(&args.config))?
    } else {
        info!(path = %args.config.display(), "config file not found; using defaults");
        Config::default()
    };
    if let Ok(url) = std::env::var("NOTES_API_URL") {
        cfg.api.base_url = url;
    }
    if let Some(url) = &args.base_url {
        cfg.api.base_url = url.clone();
    }
    config::validate(&cfg)?;
    Ok(cfg)
}

async fn watch(
    cfg: &Config,
    target: ProbeTarget,
    store: &Arc<NotesStore>,
    observer: &ConnectivityObserver,
) {
    let _probe = observer.spawn_probe(target, cfg.probe_interval(), cfg.probe_timeout());
    let mut states = store.subscribe();
    let mut online = observer.subscribe();
    store.start();

    loop {
        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            changed = online.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted; shutting down");
                break;
            }
        }
        let state = states.borrow_and_update().clone();
        render(&state, observer.is_online());
    }

    store.stop();
}

fn render(state: &NotesState, online: bool) {
    let view = view::select(state, online);
    println!("== {} ==", view.headline());
    match view {
        NotesView::List(notes) => notes.iter().for_each(print_note),
        NotesView::Failed { error, .. } => {
            println!("{}", error.message());
            if let Some(detail) = error.detail() {
                println!("  {}", detail);
            }
        }
        NotesView::Loading | NotesView::Empty => {}
    }
    if let Some(hint) = view.hint() {
        println!("{}", hint);
    }
    match view.recovery() {
        Some(Recovery::Reconnect) => println!("(will refetch when the connection is back)"),
        Some(Recovery::Reload) => println!("(run `notes-sync list` to reload)"),
        None => {}
    }
}

fn print_note(note: &Note) {
    if note.is_blank() {
        println!("{}  (no content)", describe(note));
        return;
    }
    println!("{}  {}", describe(note), note.display_title());
    for line in note.display_content().lines() {
        println!("    {}", line);
    }
}

fn describe(note: &Note) -> String {
    match note.id {
        Some(id) => format!("note #{}", id),
        None => "unsaved note".to_string(),
    }
}
