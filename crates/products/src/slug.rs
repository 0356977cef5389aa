/// URL slug: lowercase ASCII alphanumerics separated by single dashes.
///
/// Punctuation is dropped rather than replaced, so `"Tom & Jerry's"` becomes
/// `"tom-jerrys"`. Remaining letters are transliterated to ASCII.
pub fn slugify(input: &str) -> String {
    let kept: String = input
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || matches!(c, '-' | '_'))
        .collect();
    slug::slugify(kept)
}
