// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Command implementations

pub mod collect;
pub mod compact;
pub mod completions;
pub mod feed;
pub mod status;

/// Output options shared by every command
#[derive(Debug, Clone, Copy, Default)]
pub struct Output {
    /// Print machine-readable JSON instead of text
    pub json: bool,
    /// Colour human output
    pub color: bool,
}
