mod config;

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use quadld::store::{FjallQuadStore, QuadPattern, QuadStore};
use quadld::{GraphDb, Options, policy};
use serde_json::{Value, json};
use tracing::info;

use crate::config::Config;

mod flags {
    use std::path::PathBuf;

    xflags::xflags! {
        /// Store and read JSON-LD documents as quads.
        cmd quadld {
            /// toml configuration file
            optional -c,--config config: PathBuf
            /// Store directory, overrides the configuration
            optional -s,--store store: PathBuf

            /// Write a document.
            cmd put {
                required file: PathBuf
                optional --base base: String
                /// Cut the root subjects first
                optional --overwrite
                /// Use the streaming writer
                optional --stream
                /// Print the document with store blank node ids
                optional --blank-ids
            }
            /// Write a document under a freshly minted id.
            cmd post {
                required file: PathBuf
                optional --base base: String
            }
            /// Reconstruct the document rooted at an IRI.
            cmd get {
                required iri: String
                /// File holding the context to compact with
                optional --context context: PathBuf
                optional --base base: String
            }
            /// Delete the statements of a document.
            cmd del {
                required file: PathBuf
                optional --cut
                optional --recurse
            }
            /// Delete a subject and the blank nodes it reaches.
            cmd cut {
                required iri: String
                /// Follow IRI objects too
                optional --recurse
            }
            /// Report the statements that conflict with the store.
            cmd check {
                required file: PathBuf
                /// One value per subject and predicate
                optional --unique
            }
            /// Print every stored quad.
            cmd dump {}
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let flags = flags::Quadld::from_env_or_exit();
    let mut config = match &flags.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(store) = flags.store {
        config.store.path = store;
    }

    let mut lock = fd_lock::RwLock::new(open_lock_file(&config.store.path)?);
    let Ok(_guard) = lock.try_write() else {
        bail!("store {} is in use by another process", config.store.path.display());
    };

    let keyspace = fjall::Config::new(&config.store.path)
        .temporary(config.store.temporary)
        .open()
        .context("failed to open store")?;
    let store = FjallQuadStore::new(keyspace)?;
    let db = GraphDb::new(store.clone()).with_defaults(config.jsonld.clone());
    info!(target: "lifecycle", path = %config.store.path.display(), "store opened");

    match flags.subcommand {
        flags::QuadldCmd::Put(cmd) => {
            let mut options = Options::default()
                .overwrite(cmd.overwrite)
                .sync(!cmd.stream)
                .blank_ids(cmd.blank_ids);
            if let Some(base) = cmd.base {
                options = options.base(base);
            }
            let written = db.put(read_json(&cmd.file)?, &options).await?;
            print_json(written.as_ref())?;
        }
        flags::QuadldCmd::Post(cmd) => {
            let mut options = Options::default();
            if let Some(base) = cmd.base {
                options = options.base(base);
            }
            let written = db.post(read_json(&cmd.file)?, &options).await?;
            print_json(written.as_ref())?;
        }
        flags::QuadldCmd::Get(cmd) => {
            let context = cmd.context.as_deref().map(read_json).transpose()?;
            let mut options = Options::default();
            if let Some(base) = cmd.base {
                options = options.base(base);
            }
            let found = db.get(cmd.iri, context.as_ref(), &options).await?;
            print_json(found.as_ref())?;
        }
        flags::QuadldCmd::Del(cmd) => {
            let options = Options::default().cut(cmd.cut).recurse(cmd.recurse);
            db.del(read_json(&cmd.file)?, &options).await?;
        }
        flags::QuadldCmd::Cut(cmd) => {
            let options = Options::default().recurse(cmd.recurse);
            db.cut(cmd.iri, &options).await?;
        }
        flags::QuadldCmd::Check(cmd) => {
            let document = read_json(&cmd.file)?;
            let outcome = if cmd.unique {
                db.check(document, &Options::default(), policy::unique_subject_predicate)
                    .await?
            } else {
                db.check(document, &Options::default(), policy::accept_all)
                    .await?
            };
            let report = json!({
                "conflicts": outcome.conflicts,
                "checked": outcome.checked,
            });
            print_json(Some(&report))?;
        }
        flags::QuadldCmd::Dump(_) => {
            for quad in store.get(QuadPattern::default()).await? {
                println!("{}", serde_json::to_string(&quad)?);
            }
        }
    }

    store.flush()?;
    Ok(())
}

fn open_lock_file(store: &Path) -> Result<File> {
    let mut path = store.as_os_str().to_owned();
    path.push(".lock");
    let path = PathBuf::from(path);
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    File::create(&path).with_context(|| format!("failed to create {}", path.display()))
}

fn read_json(path: &Path) -> Result<Value> {
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not JSON", path.display()))
}

fn print_json(value: Option<&Value>) -> Result<()> {
    match value {
        Some(value) => println!("{}", serde_json::to_string_pretty(value)?),
        None => println!("null"),
    }
    Ok(())
}
