//! Logger set-up for binaries and examples. Library code only uses the `log` macros.
use log::LevelFilter;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

/// Installs a terminal logger at the given level.
/// Returns false if a logger was already installed (e.g. by a previous example run).
pub fn init_logger(level: LevelFilter) -> bool {
    TermLogger::init(level, Config::default(), TerminalMode::Mixed, ColorChoice::Auto).is_ok()
}
