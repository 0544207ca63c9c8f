//! Tree-wide compression toggling
//!
//! A directory's compression attribute seeds the attribute of entries
//! created under it, so the root must change only after every descendant
//! already has: the walk is strictly children-first, root-last.

use crate::device::{status, status_to_error, platform_device, Device, TransactionContext};
use crate::entry::{enumerate, EntryFilter, EnumerateOptions};
use crate::{long_path, Result};
use std::path::Path;

/// Enable the compression attribute on a directory and its entries.
pub fn compress_tree<P: AsRef<Path>>(
    root: P,
    options: EnumerateOptions,
    filter: Option<&EntryFilter>,
) -> Result<()> {
    toggle_tree(
        platform_device().as_ref(),
        None,
        root.as_ref(),
        options,
        filter,
        true,
    )
}

/// Clear the compression attribute on a directory and its entries.
pub fn decompress_tree<P: AsRef<Path>>(
    root: P,
    options: EnumerateOptions,
    filter: Option<&EntryFilter>,
) -> Result<()> {
    toggle_tree(
        platform_device().as_ref(),
        None,
        root.as_ref(),
        options,
        filter,
        false,
    )
}

pub(crate) fn toggle_tree(
    device: &dyn Device,
    tx: Option<&TransactionContext>,
    root: &Path,
    mut options: EnumerateOptions,
    filter: Option<&EntryFilter>,
    enable: bool,
) -> Result<()> {
    let root_lp = long_path::resolve_full(root)?;

    // Long-path mode is an internal policy here, not caller-overridable.
    options.long_paths = true;

    for entry in enumerate(&root_lp, options, filter) {
        let entry = entry?;
        let code = device.toggle_compression(tx, &entry.path, enable);
        if code != status::OK {
            return Err(status_to_error(code, &entry.path));
        }
        tracing::debug!(path = %entry.path.display(), enable, "toggled compression");
    }

    // The root itself, strictly after its descendants.
    let code = device.toggle_compression(tx, &root_lp, enable);
    if code != status::OK {
        return Err(status_to_error(code, &root_lp));
    }

    tracing::info!(root = %root_lp.display(), enable, "toggled tree compression");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockDevice;
    use crate::FsError;
    use std::fs;

    #[test]
    fn test_root_toggled_last() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub/inner")).unwrap();
        fs::write(dir.path().join("a.txt"), b"a").unwrap();
        fs::write(dir.path().join("sub/b.txt"), b"b").unwrap();

        let device = MockDevice::default();
        toggle_tree(
            &device,
            None,
            dir.path(),
            EnumerateOptions::default(),
            None,
            true,
        )
        .unwrap();

        let toggles = device.toggles();
        // 4 descendants plus the root
        assert_eq!(toggles.len(), 5);
        let root_lp = long_path::resolve_full(dir.path()).unwrap();
        assert_eq!(toggles.last().unwrap().0, root_lp);
        // Every descendant strictly before the root
        assert!(toggles[..4].iter().all(|(path, _)| *path != root_lp));
        assert!(toggles.iter().all(|(_, enable)| *enable));
    }

    #[test]
    fn test_empty_tree_still_toggles_root() {
        let dir = tempfile::tempdir().unwrap();

        let device = MockDevice::default();
        toggle_tree(
            &device,
            None,
            dir.path(),
            EnumerateOptions::default(),
            None,
            false,
        )
        .unwrap();

        let toggles = device.toggles();
        assert_eq!(toggles.len(), 1);
        assert!(!toggles[0].1);
    }

    #[test]
    fn test_first_failure_aborts_walk() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.txt", "b.txt", "c.txt", "d.txt"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }

        let device = MockDevice {
            toggle_fail_at: Some((1, crate::status::ACCESS_DENIED)),
            ..Default::default()
        };

        let err = toggle_tree(
            &device,
            None,
            dir.path(),
            EnumerateOptions::default(),
            None,
            true,
        )
        .unwrap_err();

        assert!(matches!(err, FsError::AccessDenied(_)));
        // The failing call was the second and final one issued.
        assert_eq!(device.toggles().len(), 2);
    }

    #[test]
    fn test_filter_limits_descendants_not_root() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("keep.dat"), b"k").unwrap();
        fs::write(dir.path().join("skip.txt"), b"s").unwrap();

        let device = MockDevice::default();
        let filter =
            |e: &crate::EntryDescriptor| e.path.extension().map_or(false, |x| x == "dat");
        toggle_tree(
            &device,
            None,
            dir.path(),
            EnumerateOptions::default(),
            Some(&filter),
            true,
        )
        .unwrap();

        let toggles = device.toggles();
        assert_eq!(toggles.len(), 2);
        assert!(toggles[0].0.ends_with("keep.dat"));
    }

    #[test]
    fn test_missing_root_fails_before_any_toggle() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");

        let device = MockDevice::default();
        let err = toggle_tree(
            &device,
            None,
            &missing,
            EnumerateOptions::default(),
            None,
            true,
        )
        .unwrap_err();

        assert!(matches!(err, FsError::NotFound(_)));
        assert!(device.toggles().is_empty());
    }
}
