//! ui::output
//!
//! Output formatting and display.
//!
//! # Design
//!
//! Command results go to stdout; notices, warnings and errors go to stderr.
//! Everything except errors respects the quiet flag. Structured logs are
//! separate and go through `tracing`.

use std::fmt::Display;

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Quiet mode - minimal output
    Quiet,
    /// Normal mode - standard output
    Normal,
    /// Debug mode - verbose output
    Debug,
}

impl Verbosity {
    /// Create verbosity from flags. Quiet wins over debug.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }

    /// Check whether normal messages are shown.
    pub fn shows_normal(self) -> bool {
        self != Verbosity::Quiet
    }
}

/// Print a message (respects quiet mode).
pub fn print(message: impl Display, verbosity: Verbosity) {
    if verbosity.shows_normal() {
        println!("{}", message);
    }
}

/// Print a debug message (only in debug mode).
pub fn debug(message: impl Display, verbosity: Verbosity) {
    if verbosity == Verbosity::Debug {
        eprintln!("[debug] {}", message);
    }
}

/// Print an error message (always shown).
pub fn error(message: impl Display) {
    eprintln!("error: {}", message);
}

/// Print a warning message (respects quiet mode).
pub fn warn(message: impl Display, verbosity: Verbosity) {
    if verbosity.shows_normal() {
        eprintln!("warning: {}", message);
    }
}

/// Print a success notice to stderr (respects quiet mode).
///
/// Kept off stdout so document content printed after it can be piped.
pub fn success(message: impl Display, verbosity: Verbosity) {
    if verbosity.shows_normal() {
        eprintln!("{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_wins_over_debug() {
        assert_eq!(Verbosity::from_flags(true, true), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(false, true), Verbosity::Debug);
        assert_eq!(Verbosity::from_flags(false, false), Verbosity::Normal);
    }

    #[test]
    fn shows_normal() {
        assert!(!Verbosity::Quiet.shows_normal());
        assert!(Verbosity::Normal.shows_normal());
        assert!(Verbosity::Debug.shows_normal());
    }
}
