//! Tokenization and edit-distance helpers for the inverted index.

/// ASCII characters in the Unicode punctuation categories.
///
/// Symbols such as `$`, `+` or `|` are deliberately absent: they belong to
/// the symbol categories and stay part of a term.
const ASCII_PUNCTUATION: &str = "!\"#%&'()*,-./:;?@[\\]_{}";

fn is_separator(c: char) -> bool {
    if c.is_whitespace() {
        return true;
    }
    if c.is_ascii() {
        return ASCII_PUNCTUATION.contains(c);
    }
    matches!(
        c,
        '\u{00A1}'
            | '\u{00A7}'
            | '\u{00AB}'
            | '\u{00B6}'
            | '\u{00B7}'
            | '\u{00BB}'
            | '\u{00BF}'
            | '\u{2010}'..='\u{2027}'
            | '\u{2030}'..='\u{205E}'
            | '\u{3001}'..='\u{3003}'
            | '\u{3008}'..='\u{3011}'
            | '\u{FF01}'..='\u{FF0F}'
    )
}

/// Split text into lowercase terms on whitespace and punctuation.
///
/// ```rust
/// use vault_search_core::text::tokenize;
///
/// assert_eq!(tokenize("Hello, World!"), vec!["hello", "world"]);
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(is_separator)
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Levenshtein distance between `a` and `b`, or `None` if it exceeds `max`.
///
/// Works on chars, not bytes. Stops early once every cell in a row is
/// already above `max`.
pub fn bounded_levenshtein(a: &str, b: &str, max: usize) -> Option<usize> {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.len().abs_diff(b.len()) > max {
        return None;
    }
    if a.is_empty() {
        return Some(b.len());
    }
    if b.is_empty() {
        return Some(a.len());
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        let mut row_min = curr[0];
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
            row_min = row_min.min(curr[j + 1]);
        }
        if row_min > max {
            return None;
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    let distance = prev[b.len()];
    (distance <= max).then_some(distance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_punctuation_and_case() {
        assert_eq!(
            tokenize("Rust's  ownership—model (v2)"),
            vec!["rust", "s", "ownership", "model", "v2"]
        );
    }

    #[test]
    fn test_tokenize_keeps_symbols() {
        assert_eq!(tokenize("c++ a|b"), vec!["c++", "a|b"]);
    }

    #[test]
    fn test_tokenize_empty() {
        assert!(tokenize("  ,, ").is_empty());
    }

    #[test]
    fn test_levenshtein_exact() {
        assert_eq!(bounded_levenshtein("kitten", "kitten", 0), Some(0));
    }

    #[test]
    fn test_levenshtein_classic() {
        assert_eq!(bounded_levenshtein("kitten", "sitting", 3), Some(3));
        assert_eq!(bounded_levenshtein("kitten", "sitting", 2), None);
    }

    #[test]
    fn test_levenshtein_length_gap() {
        assert_eq!(bounded_levenshtein("a", "abcd", 2), None);
        assert_eq!(bounded_levenshtein("", "ab", 2), Some(2));
    }

    #[test]
    fn test_levenshtein_unicode() {
        assert_eq!(bounded_levenshtein("café", "cafe", 1), Some(1));
    }
}
