// system configuration and command line processing

use crate::internals::messages::DebugLevel;
use argh::FromArgs;

pub const VERSION: &str = "0.1.0";

#[derive(FromArgs)]
/// A self-contained Forth interpreter with a threaded inner engine,
/// a 64 KiB virtual data space, and an interactive REPL.
pub struct Config {
    /// optional command: `test` runs the built-in test harness and exits
    #[argh(positional)]
    pub command: Option<String>,

    /// diagnostic verbosity: error, warning, info or debug
    #[argh(option, default = "String::from(\"error\")")]
    pub debuglevel: String,

    /// print the version and exit
    #[argh(switch)]
    pub version: bool,
}

impl Config {
    pub fn debug_level(&self) -> DebugLevel {
        match self.debuglevel.as_str() {
            "debug" => DebugLevel::Debug,
            "info" => DebugLevel::Info,
            "warning" => DebugLevel::Warning,
            _ => DebugLevel::Error,
        }
    }
}
