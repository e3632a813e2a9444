//! Tracing subscriber setup.

/// Install the global fmt subscriber. `RUST_LOG` still applies; the
/// runtime and kernel crates are raised to `debug` when `verbose`.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    for target in ["rte_runtime", "rte_kernel", "rte_harness"] {
        if let Ok(directive) = format!("{}={}", target, level).parse() {
            filter = filter.add_directive(directive);
        }
    }

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
