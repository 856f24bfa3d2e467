//! Lexical path normalisation

/// Returns the canonical form of a URL path.
///
/// - a leading `/` is enforced, an empty path becomes `/`
/// - runs of `/` collapse into one
/// - `.` elements are dropped, `..` elements remove the previous element
///   but never climb above the root
/// - a trailing `/` (or a final `.`) is kept as a trailing slash
///
/// No filesystem access is involved.
pub fn clean_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }

    let mut segments: Vec<&str> = Vec::new();
    let mut trailing = false;

    for segment in path.split('/') {
        match segment {
            "" => {}
            "." => trailing = true,
            ".." => {
                segments.pop();
                trailing = false;
            }
            s => {
                segments.push(s);
                trailing = false;
            }
        }
    }
    trailing |= path.len() > 1 && path.ends_with('/');

    let mut cleaned = String::with_capacity(path.len() + 1);
    for segment in &segments {
        cleaned.push('/');
        cleaned.push_str(segment);
    }

    if cleaned.is_empty() {
        cleaned.push('/');
    } else if trailing {
        cleaned.push('/');
    }

    cleaned
}
