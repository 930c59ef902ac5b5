//! Name validation and path composition

use crate::container::fold_key;
use crate::error::TreeError;
use crate::types::SEPARATOR;

/// Longest accepted entry name, in bytes
pub const MAX_NAME_LEN: usize = 255;

/// Check that `name` can be used for a node or item.
///
/// Rejects empty names, `.` and `..`, separators (`/` and `\`), control
/// characters and names longer than [`MAX_NAME_LEN`] bytes.
pub fn validate_name(name: &str) -> Result<(), TreeError> {
    let reason = if name.is_empty() {
        Some("name is empty")
    } else if name == "." || name == ".." {
        Some("name is reserved")
    } else if name.contains(SEPARATOR) || name.contains('\\') {
        Some("name contains a path separator")
    } else if name.chars().any(char::is_control) {
        Some("name contains a control character")
    } else if name.len() > MAX_NAME_LEN {
        Some("name is too long")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(TreeError::InvalidName {
            name: name.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

/// Path of a node named `name` below a node at `parent_path` (or unparented).
pub fn node_path(parent_path: Option<&str>, name: &str) -> String {
    match parent_path {
        Some(parent) => format!("{}{}{}", parent, name, SEPARATOR),
        None => format!("{}{}", name, SEPARATOR),
    }
}

/// Path of an item named `name` owned by the node at `category_path`.
pub fn item_path(category_path: Option<&str>, name: &str) -> String {
    match category_path {
        Some(category) => format!("{}{}", category, name),
        None => name.to_string(),
    }
}

/// Node paths are separator-terminated; accept lookups without the trailing separator.
pub fn normalize_node_path(path: &str) -> String {
    if path.ends_with(SEPARATOR) {
        path.to_string()
    } else {
        format!("{}{}", path, SEPARATOR)
    }
}

/// Rooted form of a lookup path; indexed paths always start at the root.
pub fn absolute_path(path: &str) -> String {
    if path.starts_with(SEPARATOR) {
        path.to_string()
    } else {
        format!("{}{}", SEPARATOR, path)
    }
}

/// Index key for a path
pub(crate) fn path_key(path: &str) -> String {
    fold_key(path)
}

/// Relative reference from the node path `base` to `target`.
///
/// `base` is treated as a directory. Segments are compared case-insensitively.
/// A trailing separator on `target` is preserved.
pub fn relative_path(base: &str, target: &str) -> String {
    let base_segments: Vec<&str> = base.split(SEPARATOR).filter(|s| !s.is_empty()).collect();
    let target_segments: Vec<&str> = target.split(SEPARATOR).filter(|s| !s.is_empty()).collect();

    let common = base_segments
        .iter()
        .zip(target_segments.iter())
        .take_while(|(a, b)| fold_key(a) == fold_key(b))
        .count();

    let mut parts: Vec<&str> = Vec::new();
    for _ in common..base_segments.len() {
        parts.push("..");
    }
    parts.extend(&target_segments[common..]);

    let mut relative = parts.join(&SEPARATOR.to_string());
    if target.ends_with(SEPARATOR) && !relative.is_empty() {
        relative.push(SEPARATOR);
    }
    relative
}
