//! Text normalization applied to every free-text field before comparison.

use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

/// Fold `s` into the comparison alphabet: lower-case ASCII letters, digits and
/// whitespace, trimmed at both ends.
///
/// Accented letters lose their marks (`ć` → `c`). Letters with no ASCII
/// decomposition (`đ`, `ł`, `ø`) and all punctuation are dropped. Interior
/// whitespace is left untouched.
///
/// ```
/// use memora_core::normalize::normalize;
///
/// assert_eq!(normalize("  Petrović, Jovan! "), "petrovic jovan");
/// assert_eq!(normalize("Ñuñoa"), "nunoa");
/// ```
pub fn normalize(s: &str) -> String {
  s.to_lowercase()
    .nfd()
    .filter(|c| !is_combining_mark(*c))
    .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace())
    .collect::<String>()
    .trim()
    .to_owned()
}

/// `true` when `s` is absent or normalizes to nothing.
pub(crate) fn is_blank(s: Option<&str>) -> bool {
  s.is_none_or(|s| s.trim().is_empty())
}
