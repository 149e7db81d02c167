//! Logging helpers
//!
//! The process installs `env_logger` once at startup. Library components never
//! reach for the global logger on their own: they are handed a [`SharedLogger`]
//! so that tests can substitute a capturing sink.

use std::sync::Arc;

use log::{LevelFilter, Log, Metadata, Record};

/// Logging capability injected into the supervisor, sessions and copiers
pub type SharedLogger = Arc<dyn Log>;

/// Level used when a configured level name is not recognized
pub const FALLBACK_LEVEL: LevelFilter = LevelFilter::Info;

/// Whether `level` names a log level (case-insensitive)
pub fn is_known_level(level: &str) -> bool {
    level.trim().parse::<LevelFilter>().is_ok()
}

/// Resolve a configured level name, falling back to [`FALLBACK_LEVEL`]
pub fn resolve_level(level: &str) -> LevelFilter {
    level.trim().parse().unwrap_or(FALLBACK_LEVEL)
}

// env_logger reads an unknown word as a module name and would silence the crate
fn default_filter(level: &str) -> String {
    resolve_level(level).to_string().to_lowercase()
}

/// Initialize the logging system
///
/// # Parameters
///
/// * `level` - Log level used when `RUST_LOG` is not set; unknown names fall
///   back to `info`
pub fn init_logger(level: &str) {
    let env = env_logger::Env::default().filter_or("RUST_LOG", default_filter(level));

    // A second initialization (tests, embedding) is not an error worth surfacing.
    let _ = env_logger::try_init_from_env(env);
}

/// Forwards every record to the process-wide logger installed by [`init_logger`]
#[derive(Debug, Default, Clone, Copy)]
pub struct GlobalLogger;

impl GlobalLogger {
    /// Wrap the global logger as a [`SharedLogger`]
    pub fn shared() -> SharedLogger {
        Arc::new(GlobalLogger)
    }
}

impl Log for GlobalLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level() && log::logger().enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if record.level() <= log::STATIC_MAX_LEVEL && record.level() <= log::max_level() {
            log::logger().log(record);
        }
    }

    fn flush(&self) {
        log::logger().flush();
    }
}

/// Emit a record through an injected [`SharedLogger`]
///
/// `emit!(logger, Level::Info, "accepted connection from {}", addr)`
macro_rules! emit {
    ($logger:expr, $level:expr, $($arg:tt)+) => {
        $logger.log(
            &::log::Record::builder()
                .level($level)
                .target(module_path!())
                .module_path_static(Some(module_path!()))
                .file_static(Some(file!()))
                .line(Some(line!()))
                .args(format_args!($($arg)+))
                .build(),
        )
    };
}

pub(crate) use emit;
