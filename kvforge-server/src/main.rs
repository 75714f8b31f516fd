use clap::Parser;
use kvforge_server::config::ServerConfig;
use kvforge_server::event_loop;
use kvforge_server::router::Router;
use kvforge_store::persistence::{AppendLog, AppendLogReader};
use kvforge_store::UnifiedStore;

fn main() {
    let config = ServerConfig::parse();

    if let Err(e) = config.validate() {
        eprintln!("invalid configuration: {e}");
        std::process::exit(1);
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    if let Err(e) = run(&config) {
        log::error!("fatal error: {e}");
        std::process::exit(1);
    }
}

fn run(config: &ServerConfig) -> kvforge_core::Result<()> {
    let sync_mode = config.sync_mode()?;
    let store = UnifiedStore::new(config.capacity);
    let log = AppendLog::open(&config.aof_path, sync_mode)?;
    let mut router = Router::new(store, log);

    replay_aof(&config.aof_path, &mut router)?;

    event_loop::run(config, router)
}

/// Replays every well-formed record in the append-only log, logging and
/// skipping malformed lines rather than aborting startup.
fn replay_aof(path: &std::path::Path, router: &mut Router) -> kvforge_core::Result<()> {
    if !path.exists() {
        return Ok(());
    }

    let mut applied = 0usize;
    let mut skipped = 0usize;
    for entry in AppendLogReader::open(path)? {
        match entry {
            Ok(record) => {
                router.apply_replayed(record);
                applied += 1;
            }
            Err(line_number) => {
                log::warn!("skipping malformed append-only log entry at line {line_number}");
                skipped += 1;
            }
        }
    }

    log::info!("replayed {applied} records from {} ({skipped} skipped)", path.display());
    Ok(())
}
