use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use log::info;
use tasktally::{Engine, EngineConfig, FileSensor, Store, SystemClock};

fn format_hms(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let Some(page_path) = args.next() else {
        bail!("usage: tasktally <page-file> [db-path]");
    };
    let db_path = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("tasktally.db"));

    let store = Store::open(db_path)?;
    let sensor = Arc::new(FileSensor::new(PathBuf::from(page_path)));

    let Some(engine) = Engine::try_launch(
        &store,
        sensor,
        Arc::new(SystemClock),
        EngineConfig::default(),
    )
    .await?
    else {
        info!("another engine already owns this context, exiting");
        return Ok(());
    };

    let mut events = engine.subscribe();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => {
                use tokio::sync::broadcast::error::RecvError;
                if matches!(event, Err(RecvError::Closed)) {
                    break;
                }
                let snapshot = engine.snapshot().await;
                println!(
                    "today {} | pending {} | submissions {} | {}",
                    format_hms(snapshot.committed_seconds),
                    format_hms(snapshot.pending_seconds),
                    snapshot.submission_count,
                    if snapshot.is_active { "task tracked" } else { "no task" },
                );
            }
        }
    }

    engine.shutdown().await;
    Ok(())
}
