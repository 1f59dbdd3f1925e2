//! Absolute-path resolution and component validation.

use alloc::borrow::ToOwned;
use alloc::string::String;
use alloc::sync::Arc;
use log::debug;

use crate::block_dev::BlockDevice;
use crate::consts::{MAX_NAME, MAX_PATH, ROOT_INODE};
use crate::dir;
use crate::error::{FsError, FsResult};
use crate::inode::InodeId;

/// Legal names are non-empty, at most `MAX_NAME - 1` bytes, and use only
/// ASCII letters, digits, `.`, `-` and `_`.
pub fn is_legal_name(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_NAME - 1 {
        return false;
    }
    name.bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'-' || b == b'_')
}

/// Outcome of walking an absolute path: the directory holding the final
/// component, that component's inode when it exists, and the component
/// itself. The bare root resolves to `{ parent: 0, child: Some(0), "" }`.
pub struct ResolvedPath {
    pub parent: InodeId,
    pub child: Option<InodeId>,
    pub last_name: String,
}

/// Walk `path` from the root. Repeated `/` collapse; every component must
/// validate, and every component but the last must name an existing
/// directory.
pub fn resolve(device: &Arc<dyn BlockDevice>, path: &str) -> FsResult<ResolvedPath> {
    if path.len() >= MAX_PATH || !path.starts_with('/') {
        debug!("resolve: '{}' is not a usable absolute path", path);
        return Err(FsError::General);
    }
    let mut parent = ROOT_INODE;
    let mut child = Some(ROOT_INODE);
    let mut last_name = String::new();
    for token in path.split('/').filter(|t| !t.is_empty()) {
        if !is_legal_name(token) {
            debug!("resolve: illegal component '{}'", token);
            return Err(FsError::General);
        }
        // the previous component must have been found
        let current = child.ok_or(FsError::General)?;
        parent = current;
        child = dir::find_child(device, current, token)?;
        last_name = token.to_owned();
    }
    Ok(ResolvedPath {
        parent,
        child,
        last_name,
    })
}

#[cfg(test)]
mod tests {
    use super::is_legal_name;

    #[test]
    fn name_charset() {
        assert!(is_legal_name("notes.txt"));
        assert!(is_legal_name("a-b_c.9"));
        assert!(is_legal_name("UPPER"));
        assert!(!is_legal_name(""));
        assert!(!is_legal_name("with space"));
        assert!(!is_legal_name("semi;colon"));
        assert!(!is_legal_name("sla/sh"));
        assert!(!is_legal_name("ünïcode"));
    }

    #[test]
    fn name_length() {
        assert!(is_legal_name("fifteen-chars15"));
        assert!(!is_legal_name("sixteen-chars-16"));
    }
}
