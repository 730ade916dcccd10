//! Console output plus one journal file per log category.

use std::fs::File;
use std::path::Path;

use rwfuzz_explore::targets;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::{EnvFilter, LevelFilter, Targets};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, Layer, Registry};

/// Journal file for each category target.
pub const JOURNALS: [(&str, &str); 4] = [
    (targets::EXECUTION, "execution_info.txt"),
    (targets::FUNCSEEDS, "funcseeds_log.txt"),
    (targets::CONFLICT, "conflict_test_logs.txt"),
    (targets::FUZZ, "fuzz_test_logs.txt"),
];

/// Keeps the journal writers alive. Dropping it flushes them.
pub struct LogGuards {
    _guards: Vec<WorkerGuard>,
}

/// Build the subscriber without installing it.
pub fn journal_subscriber(
    dir: &Path,
) -> std::io::Result<(impl tracing::Subscriber + Send + Sync + 'static, LogGuards)> {
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    let console = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    layers.push(fmt::layer().with_filter(console).boxed());

    let mut guards = Vec::with_capacity(JOURNALS.len());
    for (target, file_name) in JOURNALS {
        let file = File::create(dir.join(file_name))?;
        let (writer, guard) = tracing_appender::non_blocking(file);
        guards.push(guard);
        layers.push(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false)
                .with_filter(Targets::new().with_target(target, LevelFilter::DEBUG))
                .boxed(),
        );
    }

    let subscriber = tracing_subscriber::registry().with(layers);
    Ok((subscriber, LogGuards { _guards: guards }))
}

/// Install the subscriber process-wide.
pub fn init(dir: &Path) -> anyhow::Result<LogGuards> {
    let (subscriber, guards) = journal_subscriber(dir)?;
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(guards)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_land_in_their_journal() {
        let dir = tempfile::tempdir().unwrap();
        let (subscriber, guards) = journal_subscriber(dir.path()).unwrap();
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: targets::FUZZ, round = 3, "turn finished");
            tracing::info!(target: targets::CONFLICT, "batch sent");
            tracing::info!(target: "elsewhere", "not journaled");
        });
        drop(guards);

        let fuzz = std::fs::read_to_string(dir.path().join("fuzz_test_logs.txt")).unwrap();
        assert!(fuzz.contains("turn finished"));
        assert!(fuzz.contains("round=3"));
        assert!(!fuzz.contains("batch sent"));

        let conflict = std::fs::read_to_string(dir.path().join("conflict_test_logs.txt")).unwrap();
        assert!(conflict.contains("batch sent"));

        for (_, name) in JOURNALS {
            let text = std::fs::read_to_string(dir.path().join(name)).unwrap();
            assert!(!text.contains("not journaled"));
        }
    }
}
