/// Key preceding a suffix, if the name ends with the suffix and the key is not empty
pub(crate) fn key_before_suffix<'a>(name: &'a str, suffix: &str) -> Option<&'a str> {
    name.strip_suffix(suffix).filter(|key| !key.is_empty())
}

/// Remove the first matching ending, ignoring ASCII case.
pub(crate) fn remove_end_ignore_ascii_case<'a>(source: &'a str, endings: &[&str]) -> &'a str {
    for ending in endings {
        let Some(start) = source.len().checked_sub(ending.len()) else {
            continue;
        };
        if source.is_char_boundary(start) && source[start..].eq_ignore_ascii_case(ending) {
            return &source[..start];
        }
    }
    source
}
