#![allow(clippy::cognitive_complexity)]
use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result, anyhow};
use clap::Subcommand;
use config::CoordinationConfig;
use coordination::{ChannelNotifier, FetchCoordinator, Notification, UpdateCoordinator};
use hearth_core::{
    config::{
        cli::{self, Parser},
        trace,
    },
    prometheus::{self, Encoder, TextEncoder},
    tokio::{self, runtime::Builder, sync::mpsc},
    tracing::*,
};
use parent_store::{FileStore, ParentId, ParentInfo, ParentSeed};

#[derive(Parser, Debug)]
#[clap(author, name = "hearth", bin_name = "hearth", about, long_about = None)]
struct Args {
    #[clap(flatten)]
    config: cli::Config,
    /// print prometheus metrics to stderr before exiting
    #[clap(long, env = "HEARTH_DUMP_METRICS")]
    dump_metrics: bool,
    #[clap(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// load a parent record and print it as json. With a seed the record is
    /// created if it doesn't exist yet
    Fetch {
        id: ParentId,
        /// name to create the record with
        #[clap(long)]
        seed_name: Option<String>,
        #[clap(long, requires = "seed_name")]
        seed_email: Option<String>,
    },
    /// submit the parent record in a json file
    Update { path: PathBuf },
    /// print the effective coordination config
    Config,
}

fn main() -> Result<()> {
    // loaded first so .env values reach the cli parser
    let dotenv = dotenv::dotenv();
    // parses from cli or environment var
    let args = Args::parse();
    let trace_config = trace::Config::parse(&args.config.hearth_log)?;
    debug!(?args, ?trace_config);
    if let Err(err) = dotenv {
        debug!(?err, ".env file not loaded");
    }

    let mut builder = Builder::new_multi_thread();
    // configure thread name & enable IO/time
    builder.thread_name(&args.config.thread_name).enable_all();
    // default num threads will be num logical CPUs
    if let Some(num) = args.config.threads {
        builder.worker_threads(num);
    }
    let rt = builder.build()?;

    let dump_metrics = args.dump_metrics;
    let res = rt.block_on(start(args));
    if dump_metrics {
        print_metrics()?;
    }
    res
}

async fn start(args: Args) -> Result<()> {
    let cfg = CoordinationConfig::parse_or_default(&args.config.config_path)?;
    debug!(path = ?cfg.path(), "coordination config loaded");

    match args.cmd {
        Cmd::Config => {
            print!("{}", serde_yaml::to_string(&cfg.to_wire())?);
            Ok(())
        }
        Cmd::Fetch {
            id,
            seed_name,
            seed_email,
        } => {
            let store = Arc::new(FileStore::new(&args.config.store_path));
            let fetcher = FetchCoordinator::new(store, cfg.fetch());
            let seed = seed_name.map(|name| ParentSeed {
                id: id.clone(),
                name,
                email: seed_email,
            });
            let info = fetcher
                .fetch(id.clone(), seed)
                .await
                .ok_or_else(|| anyhow!("no parent record for {id}"))?;
            println!("{}", serde_json::to_string_pretty(&info)?);
            Ok(())
        }
        Cmd::Update { path } => {
            let raw = tokio::fs::read(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            let info: ParentInfo = serde_json::from_slice(&raw)
                .with_context(|| format!("{} is not a parent record", path.display()))?;

            let store = Arc::new(FileStore::new(&args.config.store_path));
            let (notifier, mut rx) = ChannelNotifier::new();
            let updater = UpdateCoordinator::new(store, Arc::new(notifier), cfg.update().clone());
            let res = updater.submit(info).await;
            print_notifications(&mut rx)?;
            res.map_err(|err| {
                info!(retryable = err.is_retryable(), "update not saved");
                anyhow!(err)
            })
        }
    }
}

fn print_notifications(rx: &mut mpsc::UnboundedReceiver<Notification>) -> Result<()> {
    while let Ok(n) = rx.try_recv() {
        println!("{}", serde_json::to_string(&n)?);
    }
    Ok(())
}

fn print_metrics() -> Result<()> {
    let mut buf = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buf)?;
    eprint!("{}", String::from_utf8(buf)?);
    Ok(())
}
