//! Structured logging setup. Pipeline phases log through `tracing`
//! (`info_span!` per phase, `warn`/`error` at individual diagnostics);
//! `init` wires a `tracing-subscriber` `EnvFilter` reading `ROUTECOMP_LOG`,
//! defaulting to `info` when unset. Mirrors the teacher's convention of a
//! small dedicated module owning subscriber setup rather than configuring
//! it inline in `main`.

use tracing_subscriber::EnvFilter;

pub fn init() {
    let filter = EnvFilter::try_from_env("ROUTECOMP_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
