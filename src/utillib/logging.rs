//! Leveled logging to stderr, with time stamp and source location.
//!
//! Use `warn!`, `info!` and `debug!` (exported at the crate root); the
//! level is set once from the command line via `LogLevelOpt`.

use std::{
    io::{StderrLock, Write, stderr},
    sync::atomic::{AtomicU8, Ordering},
};

use anyhow::{Result, bail};
use chrono::{Local, SecondsFormat};

/// Lock stderr and write the line prefix.
pub fn write_time(file: &str, line: u32, column: u32) -> StderrLock<'static> {
    let t_str = Local::now().to_rfc3339_opts(SecondsFormat::Millis, false);
    let mut lock = stderr().lock();
    write!(&mut lock, "{t_str}\t{file}:{line}:{column}\t").expect("stderr must not fail");
    lock
}

// Do *not* make the fields public here to force going through `TryFrom`.
#[derive(Debug, Default, clap::Args)]
pub struct LogLevelOpt {
    /// Show what is being done (which archives are extracted, which
    /// files are moved where)
    #[clap(short, long)]
    verbose: bool,

    /// Show information that helps debug this program (implies
    /// `--verbose`)
    #[clap(short, long)]
    debug: bool,

    /// Disable warnings, e.g. about skipped archives or ambiguous log
    /// file names. Conflicts with `--verbose` and `--debug`.
    #[clap(short, long)]
    quiet: bool,
}

impl TryFrom<LogLevelOpt> for LogLevel {
    type Error = anyhow::Error;

    fn try_from(value: LogLevelOpt) -> Result<Self> {
        let LogLevelOpt {
            verbose,
            debug,
            quiet,
        } = value;
        match (quiet, debug, verbose) {
            (true, false, false) => Ok(LogLevel::Quiet),
            (true, _, _) => {
                bail!("option `--quiet` conflicts with the options `--verbose` and `--debug`")
            }
            (false, true, _) => Ok(LogLevel::Debug),
            (false, false, true) => Ok(LogLevel::Info),
            (false, false, false) => Ok(LogLevel::Warn),
        }
    }
}

/// Ordered by amount of output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    /// Do not log anything
    Quiet = 0,
    /// The default, only `warn!` statements output anything.
    Warn = 1,
    /// Verbose execution, giving the user information about what is
    /// going on
    Info = 2,
    /// Highest amount of log statements, for debugging this program
    Debug = 3,
}

impl LogLevel {
    const ALL: [LogLevel; 4] = [
        LogLevel::Quiet,
        LogLevel::Warn,
        LogLevel::Info,
        LogLevel::Debug,
    ];

    fn from_level(level: u8) -> Option<Self> {
        Self::ALL.get(usize::from(level)).copied()
    }
}

static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Warn as u8);

pub fn set_log_level(val: LogLevel) {
    LOG_LEVEL.store(val as u8, Ordering::Relaxed);
}

#[inline]
pub fn log_level() -> LogLevel {
    LogLevel::from_level(LOG_LEVEL.load(Ordering::Relaxed))
        .expect("only valid levels are ever stored")
}

/// Shared implementation of the level macros.
#[doc(hidden)]
#[macro_export]
macro_rules! log_at {
    { $level:ident, $($arg:tt)* } => {
        if $crate::utillib::logging::log_level() >= $crate::utillib::logging::LogLevel::$level {
            use std::io::Write;
            let mut lock = $crate::utillib::logging::write_time(file!(), line!(), column!());
            writeln!(&mut lock, $($arg)*).expect("stderr must not fail");
        }
    }
}

#[macro_export]
macro_rules! warn {
    { $($arg:tt)* } => { $crate::log_at!(Warn, $($arg)*) }
}

#[macro_export]
macro_rules! info {
    { $($arg:tt)* } => { $crate::log_at!(Info, $($arg)*) }
}

#[macro_export]
macro_rules! debug {
    { $($arg:tt)* } => { $crate::log_at!(Debug, $($arg)*) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_levels() {
        for level in LogLevel::ALL {
            assert_eq!(LogLevel::from_level(level as u8), Some(level));
        }
        assert_eq!(LogLevel::from_level(4), None);
        assert!(LogLevel::Debug > LogLevel::Warn);
        assert!(LogLevel::Quiet < LogLevel::Warn);
    }

    #[test]
    fn t_level_opt() {
        let opt = |verbose, debug, quiet| LogLevelOpt {
            verbose,
            debug,
            quiet,
        };
        assert_eq!(
            LogLevel::try_from(opt(false, false, false)).unwrap(),
            LogLevel::Warn
        );
        assert_eq!(
            LogLevel::try_from(opt(true, false, false)).unwrap(),
            LogLevel::Info
        );
        assert_eq!(
            LogLevel::try_from(opt(true, true, false)).unwrap(),
            LogLevel::Debug
        );
        assert_eq!(
            LogLevel::try_from(opt(false, false, true)).unwrap(),
            LogLevel::Quiet
        );
        assert!(LogLevel::try_from(opt(true, false, true)).is_err());
    }
}
