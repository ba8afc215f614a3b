//! Platform-specific file attribute probes.

use crate::plan::SkipReason;
use std::fs::Metadata;
use std::io;
use std::path::Path;

#[cfg(windows)]
const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
#[cfg(windows)]
const FILE_ATTRIBUTE_SYSTEM: u32 = 0x4;
#[cfg(windows)]
const ERROR_SHARING_VIOLATION: i32 = 32;
#[cfg(windows)]
const ERROR_LOCK_VIOLATION: i32 = 33;

/// Hidden by naming convention (leading dot) or, on Windows, by attribute.
pub fn is_hidden(path: &Path, metadata: &Metadata) -> bool {
    let dot_name = path
        .file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false);
    dot_name || has_hidden_attribute(metadata)
}

/// Flagged as an operating-system file.
pub fn is_system(metadata: &Metadata) -> bool {
    has_system_attribute(metadata)
}

/// A Windows shell shortcut, which is treated like a symlink.
pub fn is_shortcut(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("lnk"))
        .unwrap_or(false)
}

/// Maps a failed metadata read to the reason recorded for the entry.
pub fn skip_reason_for(error: &io::Error) -> SkipReason {
    if error.kind() == io::ErrorKind::PermissionDenied {
        return SkipReason::PermissionDenied;
    }
    if is_in_use(error) {
        return SkipReason::FileInUse;
    }
    SkipReason::UnknownError
}

/// True when the error says another process holds the file.
pub fn is_in_use(error: &io::Error) -> bool {
    if error.kind() == io::ErrorKind::ResourceBusy {
        return true;
    }
    #[cfg(windows)]
    {
        matches!(
            error.raw_os_error(),
            Some(ERROR_SHARING_VIOLATION) | Some(ERROR_LOCK_VIOLATION)
        )
    }
    #[cfg(not(windows))]
    {
        false
    }
}

#[cfg(windows)]
fn has_hidden_attribute(metadata: &Metadata) -> bool {
    use std::os::windows::fs::MetadataExt;
    metadata.file_attributes() & FILE_ATTRIBUTE_HIDDEN != 0
}

#[cfg(not(windows))]
fn has_hidden_attribute(_metadata: &Metadata) -> bool {
    false
}

#[cfg(windows)]
fn has_system_attribute(metadata: &Metadata) -> bool {
    use std::os::windows::fs::MetadataExt;
    metadata.file_attributes() & FILE_ATTRIBUTE_SYSTEM != 0
}

#[cfg(not(windows))]
fn has_system_attribute(_metadata: &Metadata) -> bool {
    false
}
