//! Reparse-point classification

use crate::device::{platform_device, status_to_error, Device, TransactionContext};
use crate::entry::EntryDescriptor;
use crate::{long_path, Result};
use std::path::Path;

/// Whether `path` refers to an existing directory junction (mount point).
///
/// A failed lookup and a missing object both answer `false`; callers that
/// need the difference go through [`describe`].
pub fn is_junction<P: AsRef<Path>>(path: P) -> bool {
    is_junction_core(platform_device().as_ref(), None, path.as_ref())
}

/// Fetch the descriptor of a single object. `Ok(None)` means the object is
/// absent; lookup failures are typed errors.
pub fn describe<P: AsRef<Path>>(path: P) -> Result<Option<EntryDescriptor>> {
    describe_core(platform_device().as_ref(), None, path.as_ref())
}

pub(crate) fn is_junction_core(
    device: &dyn Device,
    tx: Option<&TransactionContext>,
    path: &Path,
) -> bool {
    let resolved = match long_path::resolve_full(path) {
        Ok(resolved) => resolved,
        Err(_) => return false,
    };
    device
        .describe(tx, &resolved)
        .ok()
        .flatten()
        .map_or(false, |descriptor| descriptor.is_mount_point())
}

pub(crate) fn describe_core(
    device: &dyn Device,
    tx: Option<&TransactionContext>,
    path: &Path,
) -> Result<Option<EntryDescriptor>> {
    let resolved = long_path::resolve_full(path)?;
    device
        .describe(tx, &resolved)
        .map_err(|code| status_to_error(code, &resolved))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{DescribePlan, MockDevice};
    use crate::{EntryKind, FsError};

    #[test]
    fn test_mount_point_is_junction() {
        let device = MockDevice {
            describe_plan: DescribePlan::Found(EntryKind::MountPoint),
            ..Default::default()
        };
        assert!(is_junction_core(&device, None, "/mnt".as_ref()));
    }

    #[test]
    fn test_plain_directory_is_not_junction() {
        let device = MockDevice {
            describe_plan: DescribePlan::Found(EntryKind::Directory),
            ..Default::default()
        };
        assert!(!is_junction_core(&device, None, "/dir".as_ref()));
    }

    #[test]
    fn test_absent_object_is_not_junction() {
        let device = MockDevice {
            describe_plan: DescribePlan::Absent,
            ..Default::default()
        };
        assert!(!is_junction_core(&device, None, "/missing".as_ref()));
    }

    #[test]
    fn test_lookup_failure_masked_as_false() {
        let device = MockDevice {
            describe_plan: DescribePlan::Fail(crate::status::ACCESS_DENIED),
            ..Default::default()
        };
        assert!(!is_junction_core(&device, None, "/locked".as_ref()));
    }

    #[test]
    fn test_invalid_path_masked_as_false() {
        let device = MockDevice::default();
        assert!(!is_junction_core(&device, None, "".as_ref()));
    }

    #[test]
    fn test_describe_exposes_the_distinction() {
        let absent = MockDevice {
            describe_plan: DescribePlan::Absent,
            ..Default::default()
        };
        assert!(describe_core(&absent, None, "/missing".as_ref())
            .unwrap()
            .is_none());

        let failing = MockDevice {
            describe_plan: DescribePlan::Fail(crate::status::ACCESS_DENIED),
            ..Default::default()
        };
        assert!(matches!(
            describe_core(&failing, None, "/locked".as_ref()),
            Err(FsError::AccessDenied(_))
        ));
    }
}
