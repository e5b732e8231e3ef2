use std::path::Path;

/// Build the object key for a file at `relative` below the uploaded
/// directory.
///
/// Segments of both parts are joined with `/`. Backslashes count as
/// separators, empty and `.` segments are dropped, so the key never starts
/// with `/` and never contains `//`.
pub fn object_key(prefix: &str, relative: &Path) -> String {
    let relative = relative.to_string_lossy();
    prefix
        .split(['/', '\\'])
        .chain(relative.split(['/', '\\']))
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}
