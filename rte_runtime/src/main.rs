//! rte-harness: run scripted surface calls through a live session.
//!
//! Each script is a JSON `CallScript`. Calls run in order against the
//! session's surface; every call is checked against its expected result
//! and error number, and the persisted values against `expectedHash`.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};

use rte_kernel::hashing::canonical_hash;
use rte_kernel::script::{run_call, CallScript};
use rte_kernel::state::create_initial_store;
use rte_kernel::surface::RteSurface;

use rte_runtime::backend::{HttpBackend, LoggingBackend, ProgressBackend};
use rte_runtime::clock::SystemClock;
use rte_runtime::config::RuntimeConfig;
use rte_runtime::logging;
use rte_runtime::progress_cache::ProgressCache;
use rte_runtime::registry::LaunchRegistry;
use rte_runtime::session::SessionDeps;

#[derive(Debug, Parser)]
#[command(name = "rte-harness", about = "Run SCORM call scripts against the runtime")]
struct Args {
    /// Call script files (JSON).
    #[arg(required = true)]
    scripts: Vec<PathBuf>,

    /// Runtime config (TOML). Defaults apply when missing.
    #[arg(long, default_value = "rte.toml")]
    config: PathBuf,

    /// Run against a bare kernel surface: no policy, cache or backend.
    #[arg(long)]
    bare: bool,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(args.verbose);

    let config = RuntimeConfig::load_or_default(&args.config);
    if let Err(e) = config.validate() {
        error!("{}", e);
        return ExitCode::FAILURE;
    }
    let config = Arc::new(config);

    let backend: Arc<dyn ProgressBackend> = match &config.backend.endpoint {
        Some(endpoint) => match HttpBackend::new(endpoint, config.backend_timeout()) {
            Ok(backend) => Arc::new(backend),
            Err(e) => {
                error!("{}", e);
                return ExitCode::FAILURE;
            }
        },
        None => Arc::new(LoggingBackend),
    };

    let cache = if config.cache.enabled && !args.bare {
        match ProgressCache::open(&config.cache.dir, config.cache.compact_after_frames) {
            Ok(cache) => Some(cache),
            Err(e) => {
                warn!("Progress cache disabled: {}", e);
                None
            }
        }
    } else {
        None
    };

    let mut registry = LaunchRegistry::new(SessionDeps {
        config: Arc::clone(&config),
        backend,
        clock: Arc::new(SystemClock),
        cache,
    });

    let mut total = 0;
    let mut passed = 0;
    for path in &args.scripts {
        total += 1;
        let script = match load_script(path) {
            Ok(script) => script,
            Err(e) => {
                println!("[FAIL] {}: {}", path.display(), e);
                continue;
            }
        };

        let ok = if args.bare {
            run_bare(&script)
        } else {
            run_session(&mut registry, &script).await
        };
        if ok {
            passed += 1;
        }
    }

    println!("\n{}/{} scripts passed", passed, total);
    if passed == total {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn load_script(path: &Path) -> Result<CallScript, String> {
    let text = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    serde_json::from_str(&text).map_err(|e| e.to_string())
}

fn run_bare(script: &CallScript) -> bool {
    let store = match create_initial_store(&script.launch) {
        Ok(store) => store,
        Err((element, code)) => {
            println!("[FAIL] {}: launch rejected at {:?} ({})", script.name, element, code);
            return false;
        }
    };
    let mut surface = RteSurface::standalone(store);
    let calls_ok = run_calls(&mut surface, script);
    let hash = canonical_hash(&surface.store().persisted_values());
    report(script, calls_ok, &hash)
}

async fn run_session(registry: &mut LaunchRegistry, script: &CallScript) -> bool {
    let session = match registry.open(Some(script.name.clone()), script.launch.clone()) {
        Ok(session) => session,
        Err(e) => {
            println!("[FAIL] {}: {}", script.name, e);
            return false;
        }
    };

    let (calls_ok, hash) = {
        let surface = session.surface();
        let mut surface = surface.lock();
        let calls_ok = run_calls(&mut surface, script);
        (calls_ok, canonical_hash(&surface.store().persisted_values()))
    };

    if !session.on_leaving().await {
        warn!(launch_id = session.launch_id(), "pushes still in flight at exit");
    }
    let stats = session.stats();
    info!(
        launch_id = session.launch_id(),
        dispatched = stats.dispatched,
        delivered = stats.delivered,
        failed = stats.failed,
        "session closed"
    );
    registry.reap_terminated();

    report(script, calls_ok, &hash)
}

fn run_calls(surface: &mut RteSurface, script: &CallScript) -> bool {
    let mut ok = true;
    for (index, call) in script.calls.iter().enumerate() {
        let outcome = run_call(surface, call);
        if !outcome.passed {
            ok = false;
            println!(
                "  call {} {}({:?}): got {:?} error {}, expected {:?} error {:?}",
                index, call.function, call.args, outcome.result, outcome.error, call.expect, call.error
            );
        }
    }
    ok
}

fn report(script: &CallScript, calls_ok: bool, hash: &str) -> bool {
    let hash_ok = script.expected_hash.as_deref().map_or(true, |expected| expected == hash);
    let ok = calls_ok && hash_ok;
    if ok {
        println!("[PASS] {}: {} calls, hash={}", script.name, script.calls.len(), hash);
    } else {
        println!("[FAIL] {}:", script.name);
        if !hash_ok {
            println!(
                "  Hash mismatch: got={} expected={}",
                hash,
                script.expected_hash.as_deref().unwrap_or_default()
            );
        }
    }
    ok
}
