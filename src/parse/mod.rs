//! Text parsers for semi-structured operator-tool output.
//!
//! Everything here is table-driven and fixture-tested: `last`/`lastb`
//! columns, syslog timestamps, and the idle-time grammar all vary across
//! distros, so the parsers tolerate per-line failures instead of assuming
//! one layout.

pub mod authlog;
pub mod time;
pub mod wtmp;
