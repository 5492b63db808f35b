// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Completions command - shell completion scripts on stdout

use anyhow::Result;
use clap_complete::{generate, Shell};
use std::io;
use tracing::debug;

/// Write the completion script for `shell`
pub fn run(shell: Shell, cmd: &mut clap::Command) -> Result<()> {
    let name = cmd.get_name().to_string();
    generate(shell, cmd, name, &mut io::stdout());
    debug!(%shell, "completions.generated");
    Ok(())
}
