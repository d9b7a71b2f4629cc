//! Command trait definition for CLI commands.
//!
//! Subcommands implement [`Command`]; dispatch goes through `enum_dispatch`.

use enum_dispatch::enum_dispatch;

/// Trait implemented by all fgdemux CLI commands.
///
/// The `command_line` parameter contains the full command invocation for @PG records.
#[enum_dispatch]
pub trait Command {
    #[allow(clippy::missing_errors_doc)]
    fn execute(&self, command_line: &str) -> anyhow::Result<()>;
}
