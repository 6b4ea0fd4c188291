/// Longest common prefix of two strings, in bytes, on a character boundary of both.
pub fn common_prefix_len(a: &str, b: &str) -> usize {
    let mut len = a
        .as_bytes()
        .iter()
        .zip(b.as_bytes())
        .take_while(|(x, y)| x == y)
        .count();
    while !a.is_char_boundary(len) || !b.is_char_boundary(len) {
        len -= 1;
    }
    len
}

/// Longest common suffix of two strings, in bytes, on a character boundary of both.
pub fn common_suffix_len(a: &str, b: &str) -> usize {
    let mut len = a
        .as_bytes()
        .iter()
        .rev()
        .zip(b.as_bytes().iter().rev())
        .take_while(|(x, y)| x == y)
        .count();
    while !a.is_char_boundary(a.len() - len) || !b.is_char_boundary(b.len() - len) {
        len -= 1;
    }
    len
}

/// The text `new` inserts relative to `old`.
///
/// Strips the longest common prefix, then the longest common suffix of what
/// remains, so prefix and suffix never overlap. For
/// `new = {"city": "Paris", "days": 3}` and `old = {"city": "Paris"}` the
/// result is `, "days": 3`.
pub fn intermediate_diff<'a>(new: &'a str, old: &str) -> &'a str {
    let prefix = common_prefix_len(new, old);
    let new_rest = &new[prefix..];
    let suffix = common_suffix_len(new_rest, &old[prefix..]);
    &new_rest[..new_rest.len() - suffix]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inserted_member() {
        assert_eq!(
            intermediate_diff(r#"{"city": "Paris", "days": 3}"#, r#"{"city": "Paris"}"#),
            r#", "days": 3"#
        );
    }

    #[test]
    fn test_appended_text() {
        assert_eq!(
            intermediate_diff(r#"{"city": "Paris"#, r#"{"city": "Par"#),
            "is"
        );
        assert_eq!(intermediate_diff("abc", "abc"), "");
        assert_eq!(intermediate_diff("abc", ""), "abc");
    }

    #[test]
    fn test_prefix_and_suffix_never_overlap() {
        // "aa" vs "a": prefix "a", suffix bounded by the remaining tail of "a"
        assert_eq!(intermediate_diff("aa", "a"), "a");
        assert_eq!(intermediate_diff("abab", "ab"), "ab");
    }

    #[test]
    fn test_character_boundaries() {
        // é (c3 a9) and è (c3 a8) share a leading byte
        assert_eq!(intermediate_diff("café", "cafè"), "é");
        assert_eq!(common_prefix_len("é", "è"), 0);
        assert_eq!(common_suffix_len("aé", "bé"), "é".len());
    }
}
