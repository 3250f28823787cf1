/// Shared path normalisation: ensure a leading `/`, collapse runs of `/`.
/// Does not resolve `..` — escape protection is the static-file collaborator's job.
pub fn normalize_path(path: &str) -> String {
    let mut normalized = String::with_capacity(path.len() + 1);
    normalized.push('/');
    let mut prev_was_slash = true;
    for ch in path.chars() {
        if ch == '/' {
            if prev_was_slash {
                continue;
            }
            prev_was_slash = true;
        } else {
            prev_was_slash = false;
        }
        normalized.push(ch);
    }
    if normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }
    if normalized.is_empty() {
        normalized.push('/');
    }
    normalized
}
