// Identifier derivation: entry ids and slugs from collection-relative paths

/// Normalize a collection-relative path: forward slashes, no leading `./` or `/`.
pub fn normalize_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    let trimmed = path.trim_start_matches("./").trim_start_matches('/');
    trimmed.to_string()
}

/// Strip the final extension from the last path segment, if any.
pub fn strip_extension(path: &str) -> &str {
    let last_segment_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    match path[last_segment_start..].rfind('.') {
        // A leading dot is a hidden file, not an extension
        Some(0) | None => path,
        Some(dot) => &path[..last_segment_start + dot],
    }
}

/// Id of a content entry: the normalized relative path, extension kept.
pub fn content_id(path: &str) -> String {
    normalize_path(path)
}

/// Id of a data entry: the normalized relative path without its extension.
pub fn data_id(path: &str) -> String {
    strip_extension(&normalize_path(path)).to_string()
}

/// Derive the slug of a content entry from its id.
///
/// The extension is removed, then a trailing `index` segment is dropped when
/// it has a parent: `check/index.md` becomes `check`, `belogit.md` becomes
/// `belogit`. A top-level `index.md` keeps the slug `index`.
pub fn derive_slug(id: &str) -> String {
    let without_ext = strip_extension(id);
    match without_ext.strip_suffix("/index") {
        Some(parent) if !parent.is_empty() => parent.to_string(),
        _ => without_ext.to_string(),
    }
}

/// Check that a raw string is usable as a slug or id.
///
/// Returns a description of the problem when it is not.
pub fn check_identifier(raw: &str) -> Result<(), &'static str> {
    if raw.is_empty() {
        return Err("empty string");
    }
    if raw.trim() != raw {
        return Err("surrounding whitespace");
    }
    if raw.chars().any(|c| c.is_control()) {
        return Err("control characters");
    }
    if raw.contains('\\') {
        return Err("backslash");
    }
    if raw
        .split('/')
        .any(|seg| seg.is_empty() || seg == "." || seg == "..")
    {
        return Err("empty or relative path segment");
    }
    Ok(())
}
