//! Shell completion support.
//!
//! Standard clap-generated completion scripts, plus a hidden helper that
//! prints playlist names so shells can complete the `scan` and `playlist`
//! arguments from the live player.

use crate::cli;
use crate::library;
use crate::player::ControlChannel;
use anyhow::Result;
use clap::Command;
use clap_complete::{generate, Generator, Shell as CompletionShell};
use std::io;

/// Generate shell completions for the given shell
pub fn generate_completions<G: Generator>(generator: G, cmd: &mut Command) {
    generate(generator, cmd, cmd.get_name().to_string(), &mut io::stdout());
}

/// Map CLI shell enum to clap_complete's shell type
#[must_use]
pub fn shell_to_completion_shell(shell: &cli::Shell) -> CompletionShell {
    match shell {
        cli::Shell::Bash => CompletionShell::Bash,
        cli::Shell::Zsh => CompletionShell::Zsh,
        cli::Shell::Fish => CompletionShell::Fish,
        cli::Shell::PowerShell => CompletionShell::PowerShell,
        cli::Shell::Elvish => CompletionShell::Elvish,
    }
}

/// Print playlist names, one per line, for use by completion scripts.
pub fn print_playlist_completions(channel: &dyn ControlChannel) -> Result<()> {
    for name in library::user_playlists(channel)? {
        println!("{name}");
    }
    Ok(())
}
