use fern::Dispatch;
use log::LevelFilter;
use std::fs::OpenOptions;

/// Logging for a stdio sidecar: stdout carries the IPC stream, so log lines
/// go to stderr, plus an append-only file when `ROLLCALL_LOG_FILE` is set.
/// Level comes from `ROLLCALL_LOG` (default info).
pub fn init() {
    let level = match std::env::var("ROLLCALL_LOG")
        .unwrap_or_default()
        .to_lowercase()
        .as_str()
    {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Info,
    };

    let mut dispatch = Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}][{}] {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr());

    if let Ok(path) = std::env::var("ROLLCALL_LOG_FILE") {
        if let Ok(file) = OpenOptions::new().create(true).append(true).open(&path) {
            dispatch = dispatch.chain(file);
        }
    }

    // A second init (tests spawning in-process) is harmless; ignore it.
    let _ = dispatch.apply();
}
