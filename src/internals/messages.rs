// Messages and debug-level filtering
//
// A small diagnostic channel, separate from Forth-level output. Errors and
// warnings always print; info and debug are gated by the current level,
// which the DEBUG-ON / DEBUG-OFF words and --debuglevel can move.

use std::fmt::Debug;

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub enum DebugLevel {
    Error,
    Warning,
    Info,
    Debug,
}

pub struct Msg {
    level: DebugLevel,
}

impl Msg {
    pub fn new() -> Msg {
        Msg {
            level: DebugLevel::Error,
        }
    }

    pub fn set_level(&mut self, level: DebugLevel) {
        self.level = level;
    }

    pub fn get_level(&self) -> DebugLevel {
        self.level
    }

    /// error messages are always shown
    pub fn error<T: Debug>(&self, source: &str, text: &str, data: Option<T>) {
        self.print("ERROR", source, text, data);
    }

    pub fn warning<T: Debug>(&self, source: &str, text: &str, data: Option<T>) {
        if self.level >= DebugLevel::Warning {
            self.print("WARNING", source, text, data);
        }
    }

    pub fn info<T: Debug>(&self, source: &str, text: &str, data: Option<T>) {
        if self.level >= DebugLevel::Info {
            self.print("INFO", source, text, data);
        }
    }

    pub fn debug<T: Debug>(&self, source: &str, text: &str, data: Option<T>) {
        if self.level >= DebugLevel::Debug {
            self.print("DEBUG", source, text, data);
        }
    }

    fn print<T: Debug>(&self, tag: &str, source: &str, text: &str, data: Option<T>) {
        match data {
            Some(data) => println!("{tag} [{source}]: {text} {data:?}"),
            None => println!("{tag} [{source}]: {text}"),
        }
    }
}
