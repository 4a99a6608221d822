//! An interactive shell with csh-style history expansion.
//!
//! The core is [`history::History`], the designator grammar in
//! [`designator`], lookup in [`resolver`] and the line rewriter
//! [`expansion::submit_line`]. The remaining modules form the read loop
//! that feeds lines through it.

pub mod builtins;
pub mod completion;
pub mod config;
pub mod designator;
pub mod error;
pub mod expansion;
pub mod history;
pub mod parser;
pub mod pipeline;
pub mod repl;
pub mod resolver;
pub mod util;

pub use error::{ExpansionError, ExpansionErrorKind};
pub use expansion::{submit_line, ExpandedLine};
pub use history::{History, HistoryEntry};

/// Installs the stderr log subscriber. `RUST_LOG` overrides the default
/// `warn` level.
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}
