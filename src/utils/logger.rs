use env_logger::{Builder, Target};
use log::LevelFilter;
use std::io::Write;

/// Installs the process-wide logger. `RUST_LOG` still overrides `default_level`.
pub fn setup_logging(default_level: LevelFilter) {
    let mut builder = Builder::new();

    builder
        .target(Target::Stdout)
        .filter_level(default_level)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] [{}] {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.args()
            )
        });

    // A second call (tests, embedding hosts) keeps the first logger.
    let _ = builder.try_init();
}
