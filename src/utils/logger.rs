use env_logger::{Builder, Env, Target};
use std::io::Write;

/// Route `log` records to stderr so they never interleave with the shell's stdout.
///
/// `RUST_LOG` overrides the default `info` level.
pub fn setup_logging() {
    Builder::from_env(Env::default().default_filter_or("info"))
        .target(Target::Stderr)
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] [{}:{}] {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .init();
}
