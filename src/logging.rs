/// Log routing: one log file per station plus `ap`, with all output
/// serialized behind a single mutex so that two workers logging at the
/// same instant never interleave their lines mid-write. Builds on
/// `tracing`/`tracing-subscriber`, which is already this codebase's
/// ambient logging stack, rather than introducing a file-rotation
/// crate not otherwise present in the corpus.
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::field::{Field, Visit};
use tracing::Event;
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

use crate::errors::{Result, SimError};

/// A `tracing_subscriber::Layer` that appends each event to the log
/// file named after its `station` field (or `ap`/`dispatcher` for
/// events with no station field), and mirrors the same line to stdout.
pub struct StationLogLayer {
    log_dir: PathBuf,
    files: Mutex<HashMap<String, File>>,
}

impl StationLogLayer {
    /// Create the log directory and a layer rooted at it. Failing to
    /// create the directory is the one real resource-exhaustion case
    /// here, so it's reported rather than panicking the caller's
    /// startup path.
    pub fn new(log_dir: impl Into<PathBuf>) -> Result<Self> {
        let log_dir = log_dir.into();
        fs::create_dir_all(&log_dir).map_err(|e| {
            SimError::ResourceExhausted(format!(
                "failed to create log directory {}: {e}",
                log_dir.display()
            ))
        })?;
        Ok(Self { log_dir, files: Mutex::new(HashMap::new()) })
    }

    fn write_line(&self, station: &str, line: &str) {
        let mut files = self.files.lock().unwrap();
        if !files.contains_key(station) {
            match open_log_file(&self.log_dir, station) {
                Ok(file) => {
                    files.insert(station.to_string(), file);
                }
                Err(err) => {
                    // Can't open this station's file; still surface the
                    // line on stdout rather than silently dropping it.
                    eprintln!("{err}");
                    println!("{line}");
                    return;
                }
            }
        }
        let file = files.get_mut(station).expect("just inserted or already present");
        let _ = writeln!(file, "{line}");
        println!("{line}");
    }
}

fn open_log_file(log_dir: &Path, station: &str) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join(station))
        .map_err(|e| SimError::ResourceExhausted(format!("failed to open log file for {station}: {e}")))
}

#[derive(Default)]
struct EventVisitor {
    station: Option<String>,
    message: Option<String>,
    extra: Vec<(String, String)>,
}

impl Visit for EventVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let rendered = format!("{value:?}");
        match field.name() {
            "message" => self.message = Some(rendered.trim_matches('"').to_string()),
            "station" => self.station = Some(rendered.trim_matches('"').to_string()),
            name => self.extra.push((name.to_string(), rendered)),
        }
    }
}

impl<S> Layer<S> for StationLogLayer
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let station = visitor.station.unwrap_or_else(|| "dispatcher".to_string());
        let mut line = format!("[{}] {}", event.metadata().level(), visitor.message.unwrap_or_default());
        for (k, v) in visitor.extra {
            line.push_str(&format!(" {k}={v}"));
        }
        self.write_line(&station, &line);
    }
}
