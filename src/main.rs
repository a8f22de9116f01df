//! yamy -- cross-platform keyboard and pointer remapper.
//!
//! Entry point: CLI parsing, logger setup, loading the persisted active
//! setting, and starting the engine, the IPC notifier, and the capture
//! backend.

use std::collections::HashSet;
use std::process::ExitCode;
use std::sync::Arc;

use yamy::config::compiler::{Compiler, OsFileLoader};
use yamy::config::persist::PersistedState;
use yamy::engine::Engine;
use yamy::platform::{self, ActionExecutor, NullWindowSystem, WindowSystem};
use yamy::{config, ipc};

struct Args {
    debug: bool,
    show_version: bool,
    show_help: bool,
}

fn parse_args(argv: impl Iterator<Item = String>) -> Args {
    let mut args = Args { debug: false, show_version: false, show_help: false };
    for arg in argv.skip(1) {
        match arg.as_str() {
            "--debug" | "-d" => args.debug = true,
            "--version" | "-v" => args.show_version = true,
            "--help" | "-h" => args.show_help = true,
            other => log::warn!("yamy: ignoring unrecognized argument '{other}'"),
        }
    }
    args
}

fn print_help() {
    println!("yamy {}", env!("CARGO_PKG_VERSION"));
    println!("usage: yamy [--debug|-d] [--version|-v] [--help|-h]");
}

fn init_logger(debug: bool) {
    let forced_debug = std::env::var("YAMY_DEBUG").map(|v| v == "1").unwrap_or(false);
    let level = if debug || forced_debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

/// Loads the active persisted setting, compiling it with no seed symbols
/// beyond what the entry itself records. Falls back to an empty `Setting`
/// (Global keymap only, no bindings) if nothing is persisted yet or the
/// compile fails outright -- matching §7 "Config error: ... does not abort
/// the engine; the engine keeps running on the previous Setting," with "no
/// setting yet" standing in for "previous."
fn load_active_setting() -> config::Setting {
    let state = match config::persist::default_state_path() {
        Ok(path) => PersistedState::load(&path).unwrap_or_else(|e| {
            log::warn!("yamy: could not load persisted state: {e}");
            PersistedState::default()
        }),
        Err(e) => {
            log::warn!("yamy: {e}");
            PersistedState::default()
        }
    };

    let Some(entry) = state.active_entry() else {
        log::info!("yamy: no persisted setting; starting with an empty configuration");
        return empty_setting();
    };

    let source = match std::fs::read_to_string(&entry.path) {
        Ok(s) => s,
        Err(e) => {
            log::error!("yamy: could not read '{}': {e}", entry.path);
            return empty_setting();
        }
    };

    let symbols: HashSet<String> = entry.symbols.iter().cloned().collect();
    let loader = OsFileLoader;
    let compiler = Compiler::new(&loader);
    match compiler.compile(&source, symbols) {
        Ok(setting) => setting,
        Err(errors) => {
            for e in &errors {
                log::error!("yamy: config error in '{}': {e}", entry.path);
            }
            empty_setting()
        }
    }
}

fn empty_setting() -> config::Setting {
    let mut setting = config::Setting::default();
    let global = setting.keymaps.push(config::Keymap::new("Global"));
    setting.keymaps.global = Some(global);
    setting
}

fn main() -> ExitCode {
    let args = parse_args(std::env::args());

    if args.show_help {
        print_help();
        return ExitCode::SUCCESS;
    }
    if args.show_version {
        println!("yamy {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    init_logger(args.debug);
    log::info!("yamy {} starting", env!("CARGO_PKG_VERSION"));

    let setting = Arc::new(load_active_setting());

    let executor: Arc<dyn ActionExecutor> = match platform::create_action_executor() {
        Ok(e) => Arc::from(e),
        Err(e) => {
            log::error!("yamy: could not initialize the action executor: {e}");
            return ExitCode::FAILURE;
        }
    };
    let window_system: Arc<dyn WindowSystem> = Arc::new(NullWindowSystem);

    let engine = Arc::new(Engine::new(setting, executor, window_system));

    let capture = match platform::create_input_capture() {
        Ok(c) => c,
        Err(e) => {
            log::error!("yamy: capture backend unavailable: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = engine.start(capture) {
        log::error!("yamy: failed to start capture: {e}");
        return ExitCode::FAILURE;
    }

    let session = ipc::notifier::session_id();
    let notifier = match ipc::notifier::Notifier::start(engine.clone(), session) {
        Ok(n) => Some(n),
        Err(e) => {
            log::warn!("yamy: IPC notifier unavailable ({e}); focus/lock updates will not arrive");
            None
        }
    };

    log::info!("yamy: running; send SIGINT/SIGTERM to stop");
    // Blocks the main thread for the life of the process. There is no
    // signal-handling crate in the dependency stack, so shutdown is the
    // OS's default terminate-on-SIGINT/SIGTERM action rather than a
    // caught, graceful one; `Engine`'s `Drop` impl still runs `stop()`
    // for in-process callers (tests, a future embedding) that drop it
    // normally.
    loop {
        std::thread::park();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_args_recognizes_debug_flag() {
        let args = parse_args(vec!["yamy".to_string(), "--debug".to_string()].into_iter());
        assert!(args.debug);
        assert!(!args.show_version);
    }

    #[test]
    fn parse_args_recognizes_short_flags() {
        let args = parse_args(vec!["yamy".to_string(), "-v".to_string(), "-h".to_string()].into_iter());
        assert!(args.show_version);
        assert!(args.show_help);
    }

    #[test]
    fn empty_setting_has_a_global_keymap() {
        let setting = empty_setting();
        assert!(setting.keymaps.global.is_some());
    }
}
