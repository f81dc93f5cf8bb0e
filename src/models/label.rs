//! Automatic package labels.
//!
//! A label is derived from the package name by the first strategy that applies:
//! initials of separator-delimited parts, then capital letters, then the first, middle
//! and last character. The result is lowercased and cut to
//! [`MAX_GENERATED_LABEL_LEN`] characters.

use crate::constants::MAX_GENERATED_LABEL_LEN;

const SEPARATORS: &[&str] = &["-", "_", ".", " ", "%20"];

/// Generate a short label for `name`.
///
/// ```
/// use proji_cli::models::generate_label;
///
/// assert_eq!(generate_label("rust-cli-app"), "rca");
/// assert_eq!(generate_label("AbcDefGhi"), "adg");
/// ```
#[must_use]
pub fn generate_label(name: &str) -> String {
    let name = name.trim();
    if name.chars().count() < 2 {
        return name.to_lowercase();
    }

    let label = from_separators(name)
        .or_else(|| from_upper_case(name))
        .unwrap_or_else(|| from_length(name));

    label.to_lowercase().chars().take(MAX_GENERATED_LABEL_LEN).collect()
}

fn from_separators(name: &str) -> Option<String> {
    SEPARATORS.iter().find_map(|separator| {
        let parts: Vec<&str> = name.split(separator).collect();
        if parts.len() <= 1 {
            return None;
        }
        Some(
            parts
                .iter()
                .take(MAX_GENERATED_LABEL_LEN + 1)
                .filter_map(|part| part.chars().next())
                .collect(),
        )
    })
}

fn from_upper_case(name: &str) -> Option<String> {
    let mut chars = name.chars();
    let first = chars.next()?.to_ascii_uppercase();
    let label: String =
        std::iter::once(first).chain(chars).filter(char::is_ascii_uppercase).collect();
    (label.len() >= 2).then_some(label)
}

fn from_length(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let len = chars.len();
    [chars[0], chars[len / 2], chars[len - 1]].iter().collect()
}
