//! Process-wide tracing setup for `bdd-cli`. No distributed-tracing export
//! pipeline — this engine runs as a single local process, so a pretty
//! stdout layer plus `RUST_LOG`-style filtering covers every caller this
//! workspace has.

use tracing::subscriber::set_global_default;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Installs the global subscriber. `log_level` overrides `RUST_LOG` when
/// given; otherwise falls back to `info`.
pub fn init_tracing(log_level: Option<&str>) {
    let env_filter = log_level
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));

    let subscriber = FmtSubscriber::builder().pretty().with_env_filter(env_filter).finish();

    set_global_default(subscriber).expect("failed to set default tracing subscriber");
}

#[cfg(test)]
mod tests {
    // `set_global_default` can only succeed once per process, so this
    // module intentionally has no test invoking `init_tracing` — a second
    // call from any other test binary would panic.
}
