mod add;
mod cache_clear;
mod init;
mod install;
mod outdated;
mod remove;
mod update;
mod upgrade;

use domainlang_package::progress::ProgressReceiver;

use crate::error::CliResult;
use crate::{Command, GlobalOptions};

pub async fn dispatch(command: Command, global: &GlobalOptions) -> CliResult<()> {
    match command {
        Command::Init => init::run(global).await,
        Command::Install => install::run(global).await,
        Command::Add { specifier } => add::run(global, &specifier).await,
        Command::Remove { alias } => remove::run(global, &alias).await,
        Command::Update { alias } => update::run(global, alias.as_deref()).await,
        Command::Upgrade { alias } => upgrade::run(global, alias.as_deref()).await,
        Command::Outdated => outdated::run(global).await,
        Command::CacheClear => cache_clear::run(global).await,
    }
}

/// Drain progress events to stderr, one line per event, until the sender
/// side is dropped. Human-readable text by default; one JSON object per
/// line under `--json`.
pub async fn drain_progress(mut rx: ProgressReceiver, json: bool) {
    use domainlang_package::progress::ProgressEvent;

    while let Some(event) = rx.recv().await {
        if json {
            if let Ok(line) = serde_json::to_string(&JsonEvent::from(&event)) {
                eprintln!("{line}");
            }
            continue;
        }
        match event {
            ProgressEvent::Started { name } => eprintln!("  resolving {name}"),
            ProgressEvent::Resolved { name, commit } => {
                eprintln!("  {name} -> {}", &commit[..commit.len().min(12)])
            }
            ProgressEvent::Downloading { name, bytes, total } => match total {
                Some(total) => eprintln!("  {name}: {bytes}/{total} bytes"),
                None => eprintln!("  {name}: {bytes} bytes"),
            },
            ProgressEvent::CacheHit { name } => eprintln!("  {name} (cached)"),
            ProgressEvent::Finished { name } => eprintln!("done  {name}"),
            ProgressEvent::Failed { name, message } => eprintln!("failed {name}: {message}"),
            ProgressEvent::Done => {}
        }
    }
}

#[derive(serde::Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum JsonEvent {
    Started { name: String },
    Resolved { name: String, commit: String },
    Downloading { name: String, bytes: u64, total: Option<u64> },
    CacheHit { name: String },
    Finished { name: String },
    Failed { name: String, message: String },
    Done,
}

impl From<&domainlang_package::progress::ProgressEvent> for JsonEvent {
    fn from(event: &domainlang_package::progress::ProgressEvent) -> Self {
        use domainlang_package::progress::ProgressEvent as E;
        match event {
            E::Started { name } => JsonEvent::Started { name: name.to_string() },
            E::Resolved { name, commit } => JsonEvent::Resolved {
                name: name.to_string(),
                commit: commit.clone(),
            },
            E::Downloading { name, bytes, total } => JsonEvent::Downloading {
                name: name.to_string(),
                bytes: *bytes,
                total: *total,
            },
            E::CacheHit { name } => JsonEvent::CacheHit { name: name.to_string() },
            E::Finished { name } => JsonEvent::Finished { name: name.to_string() },
            E::Failed { name, message } => JsonEvent::Failed {
                name: name.to_string(),
                message: message.clone(),
            },
            E::Done => JsonEvent::Done,
        }
    }
}

fn current_workspace_dir() -> std::io::Result<std::path::PathBuf> {
    std::env::current_dir()
}
