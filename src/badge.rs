// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! SVG badge summarising one artifact

use crate::types::ArtifactRecord;

/// Categories shown on a badge before truncation
pub const MAX_BADGE_CATEGORIES: usize = 3;

/// Escape text for use inside SVG elements and attributes
#[must_use]
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Comma-joined categories, truncated with `, ...`
#[must_use]
pub fn categories_text(categories: &[String]) -> String {
    let mut text = categories
        .iter()
        .take(MAX_BADGE_CATEGORIES)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if categories.len() > MAX_BADGE_CATEGORIES {
        text.push_str(", ...");
    }
    text
}

/// Render the fixed 800x240 badge for `record`
#[must_use]
pub fn render_badge(record: &ArtifactRecord) -> String {
    let rows = [
        ("GroupID:", escape_xml(&record.group_id)),
        ("ArtifactID:", escape_xml(&record.artifact_id)),
        ("Latest:", escape_xml(&record.latest_version)),
        ("Depends on:", record.dep_count.to_string()),
        ("Used by:", record.ref_count.to_string()),
    ];

    let mut svg = String::new();
    svg.push_str(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="800" height="240" viewBox="0 0 800 240">
  <linearGradient id="grad" x1="0%" y1="0%" x2="100%" y2="0%">
    <stop offset="0%" stop-color="#4a90e2"/>
    <stop offset="100%" stop-color="#9013fe"/>
  </linearGradient>
  <rect width="100%" height="100%" rx="5" ry="5" fill="url(#grad)"/>
  <g transform="translate(15, 15)">
"##,
    );

    for (i, (label, value)) in rows.iter().enumerate() {
        let y = 10 + 30 * i;
        svg.push_str(&format!(
            "    <text x=\"0\" y=\"{y}\" font-family=\"Arial\" font-size=\"18\" fill=\"white\" font-weight=\"bold\">{label}</text>\n"
        ));
        svg.push_str(&format!(
            "    <text x=\"120\" y=\"{y}\" font-family=\"Arial\" font-size=\"18\" fill=\"white\" font-weight=\"bold\">{value}</text>\n"
        ));
    }

    svg.push_str(&format!(
        r##"    <text x="0" y="160" font-family="Arial" font-size="18" fill="white" font-weight="bold">Categories:</text>
    <text x="10" y="190" font-family="Arial" font-size="10" fill="white" font-weight="bold">{}</text>
    <ellipse cx="600" cy="120" rx="140" ry="60" fill="#ff4081"/>
    <text x="600" y="120" text-anchor="middle" font-family="Arial" font-size="24" fill="white" font-weight="bold">MavenArtifactBadge</text>
  </g>
  <text x="720" y="225" font-family="Arial" font-size="3" fill="#d0d0d0">mavenfeed</text>
</svg>
"##,
        escape_xml(&categories_text(&record.categories))
    ));
    svg
}
