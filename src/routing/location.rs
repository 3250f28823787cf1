/// Longest-prefix-with-boundary match between a location's configured path
/// and a normalised request URI.
///
/// A location `/images` matches `/images` and `/images/cat.jpg`, but not
/// `/imagesbackup/cat.jpg` — the character immediately after the prefix in
/// the URI must be `/`, `?`, `#`, or nothing at all.
pub fn matches(location_path: &str, uri: &str) -> bool {
    if location_path == "/" {
        return true;
    }
    if uri == location_path {
        return true;
    }
    if let Some(rest) = uri.strip_prefix(location_path) {
        matches!(rest.chars().next(), Some('/') | Some('?') | Some('#'))
    } else {
        false
    }
}

/// Picks the location with the longest matching path, preferring an exact
/// match over a boundary match at equal length. Returns its index.
pub fn best_match<'a, I>(locations: I, uri: &str) -> Option<usize>
where
    I: IntoIterator<Item = &'a str>,
{
    locations
        .into_iter()
        .enumerate()
        .filter(|(_, path)| matches(path, uri))
        .max_by_key(|(_, path)| path.len())
        .map(|(idx, _)| idx)
}
