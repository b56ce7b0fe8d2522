// minforth main program

mod config;
mod context;
mod errors;
mod internals;
mod kernel;
mod runtime;

use config::Config;
use errors::ForthResult;
use runtime::ForthRuntime;
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

/// MS ( n -- ) sleep for n milliseconds. The reference host binding,
/// registered through the same surface a board port uses for its GPIO
/// and timer words.
fn f_ms(rt: &mut ForthRuntime) -> ForthResult {
    let n = rt.pop()?;
    if n > 0 {
        thread::sleep(Duration::from_millis(n as u64));
    }
    Ok(())
}

fn register_host_words(rt: &mut ForthRuntime) -> ForthResult {
    rt.register_primitive("MS", f_ms, "MS ( n -- ) Sleep for n milliseconds")
}

fn main() -> ExitCode {
    let config: Config = argh::from_env();

    if config.version {
        println!("minforth {}", config::VERSION);
        return ExitCode::SUCCESS;
    }

    match config.command.as_deref() {
        Some("test") => {
            let failures = internals::selftest::run_all_tests();
            if failures == 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Some(other) => {
            eprintln!("unknown command: {other} (try `test`, or no argument for the REPL)");
            ExitCode::from(2)
        }
        None => {
            let mut rt = ForthRuntime::new();
            rt.msg.set_level(config.debug_level());
            if let Err(e) = rt.cold_start() {
                eprintln!("cold start failed: {e}");
                return ExitCode::FAILURE;
            }
            if let Err(e) = register_host_words(&mut rt) {
                eprintln!("host word registration failed: {e}");
                return ExitCode::FAILURE;
            }
            rt.repl();
            ExitCode::SUCCESS
        }
    }
}
