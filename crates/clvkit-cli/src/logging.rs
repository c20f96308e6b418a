//! Log output for the command-line tool
//!
//! Events go to stderr so that JSON written to stdout stays clean. The filter
//! comes from `RUST_LOG` when set; otherwise `--verbose` selects the level:
//!
//! | Flag    | Level   |
//! |---------|---------|
//! | (none)  | `info`  |
//! | `-v`    | `debug` |
//! | `-vv`   | `trace` |

use tracing_subscriber::EnvFilter;

pub fn init(verbose: u8) -> anyhow::Result<()> {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))
}
