//! Library-boundary logger initialization.
//!
//! Embedding callers opt in to decode diagnostics (filler runs, sloppy-mode
//! repairs, session summaries) by calling `enable_diagnostics` once; repeated
//! calls are no-ops. Tests rely on `env_logger`'s test capture instead.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Once;

use log::LevelFilter;

static INIT_LOGGER: Once = Once::new();

/// Route `log` records to stderr, or append them to `log_file` when given.
pub fn enable_diagnostics(log_file: Option<&Path>) -> std::io::Result<()> {
    let mut result = Ok(());
    INIT_LOGGER.call_once(|| {
        let mut builder = env_logger::Builder::new();

        builder.is_test(false);
        builder.filter_level(LevelFilter::Info);

        // Custom formatter: just print the level and message
        builder.format(|buf, record| {
            use std::io::Write;
            writeln!(buf, "[{}] {}", record.level(), record.args())?;
            buf.flush()?;
            Ok(())
        });

        if let Some(filename) = log_file {
            match OpenOptions::new().append(true).create(true).open(filename) {
                Ok(file) => {
                    builder.target(env_logger::Target::Pipe(Box::new(file)));
                }
                Err(err) => {
                    result = Err(err);
                    return;
                }
            }
        }

        let _ = builder.try_init();
    });
    result
}
