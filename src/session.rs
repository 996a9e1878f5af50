//! Camera session state: access permission and torch.
//!
//! This state belongs to the application shell, not the analysis pipeline.
//! The pipeline only runs while permission is granted.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::ingest::TorchControl;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PermissionState {
    Granted,
    Denied,
}

impl PermissionState {
    pub fn is_granted(self) -> bool {
        self == PermissionState::Granted
    }
}

/// Checks whether the process may use the camera.
pub trait PermissionProbe: Send {
    fn check(&self) -> PermissionState;
}

/// Probe with a fixed answer.
#[derive(Clone, Copy, Debug)]
pub struct StaticPermission(pub PermissionState);

impl PermissionProbe for StaticPermission {
    fn check(&self) -> PermissionState {
        self.0
    }
}

/// Probe that tries to open a device node or file with the access capture needs.
#[derive(Clone, Debug)]
pub struct DeviceAccessProbe {
    path: PathBuf,
    write: bool,
}

impl DeviceAccessProbe {
    pub fn read_only(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write: false,
        }
    }

    pub fn read_write(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write: true,
        }
    }
}

impl PermissionProbe for DeviceAccessProbe {
    fn check(&self) -> PermissionState {
        if self.path.is_dir() {
            return match std::fs::read_dir(&self.path) {
                Ok(_) => PermissionState::Granted,
                Err(_) => PermissionState::Denied,
            };
        }
        let opened = std::fs::OpenOptions::new()
            .read(true)
            .write(self.write)
            .open(&self.path);
        match opened {
            Ok(_) => PermissionState::Granted,
            Err(err) => {
                if err.kind() != ErrorKind::PermissionDenied {
                    log::debug!("camera probe {}: {}", self.path.display(), err);
                }
                PermissionState::Denied
            }
        }
    }
}

/// Result of a torch toggle request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TorchOutcome {
    On,
    Off,
    /// The device has no flash unit; nothing changed.
    Unavailable,
    /// The device refused the change; nothing changed.
    Failed,
}

/// Mutable camera session state owned by the application shell.
#[derive(Debug)]
pub struct CameraSession {
    permission: PermissionState,
    torch_on: bool,
}

impl CameraSession {
    pub fn new(permission: PermissionState) -> Self {
        Self {
            permission,
            torch_on: false,
        }
    }

    pub fn permission(&self) -> PermissionState {
        self.permission
    }

    pub fn torch_on(&self) -> bool {
        self.torch_on
    }

    /// Re-run the probe. Returns the new state when it changed.
    ///
    /// Losing permission switches a lit torch off.
    pub fn recheck(
        &mut self,
        probe: &dyn PermissionProbe,
        torch: &mut dyn TorchControl,
    ) -> Option<PermissionState> {
        let current = probe.check();
        if current == self.permission {
            return None;
        }
        log::info!("camera permission changed: {:?} -> {:?}", self.permission, current);
        self.permission = current;
        if !current.is_granted() && self.torch_on {
            if let Err(err) = torch.set_torch(false) {
                log::warn!("failed to switch torch off: {}", err);
            }
            self.torch_on = false;
        }
        Some(current)
    }

    /// Flip the torch. No-op when the device has no flash unit.
    pub fn toggle_torch(&mut self, torch: &mut dyn TorchControl) -> TorchOutcome {
        if !self.permission.is_granted() || !torch.has_flash_unit() {
            return TorchOutcome::Unavailable;
        }
        let wanted = !self.torch_on;
        match torch.set_torch(wanted) {
            Ok(()) => {
                self.torch_on = wanted;
                if wanted {
                    TorchOutcome::On
                } else {
                    TorchOutcome::Off
                }
            }
            Err(err) => {
                log::warn!("torch toggle failed: {}", err);
                TorchOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::NoTorch;
    use anyhow::Result;

    struct FakeTorch {
        lit: bool,
    }

    impl TorchControl for FakeTorch {
        fn has_flash_unit(&self) -> bool {
            true
        }

        fn set_torch(&mut self, on: bool) -> Result<()> {
            self.lit = on;
            Ok(())
        }
    }

    #[test]
    fn torch_toggles_when_flash_present() {
        let mut session = CameraSession::new(PermissionState::Granted);
        let mut torch = FakeTorch { lit: false };

        assert_eq!(session.toggle_torch(&mut torch), TorchOutcome::On);
        assert!(torch.lit && session.torch_on());
        assert_eq!(session.toggle_torch(&mut torch), TorchOutcome::Off);
        assert!(!torch.lit && !session.torch_on());
    }

    #[test]
    fn torch_without_flash_is_a_noop() {
        let mut session = CameraSession::new(PermissionState::Granted);
        assert_eq!(session.toggle_torch(&mut NoTorch), TorchOutcome::Unavailable);
        assert!(!session.torch_on());
    }

    #[test]
    fn recheck_reports_changes_only() {
        let mut session = CameraSession::new(PermissionState::Denied);
        assert_eq!(
            session.recheck(&StaticPermission(PermissionState::Denied), &mut NoTorch),
            None
        );
        assert_eq!(
            session.recheck(&StaticPermission(PermissionState::Granted), &mut NoTorch),
            Some(PermissionState::Granted)
        );
        assert!(session.permission().is_granted());
    }

    #[test]
    fn losing_permission_turns_torch_off() {
        let mut session = CameraSession::new(PermissionState::Granted);
        let mut torch = FakeTorch { lit: false };
        session.toggle_torch(&mut torch);
        assert!(torch.lit);

        session.recheck(&StaticPermission(PermissionState::Denied), &mut torch);
        assert!(!session.torch_on());
        assert!(!torch.lit);
    }

    #[test]
    fn device_probe_denies_missing_node() {
        let probe = DeviceAccessProbe::read_write("/dev/video-does-not-exist");
        assert_eq!(probe.check(), PermissionState::Denied);
    }

    #[test]
    fn device_probe_grants_readable_file() -> Result<()> {
        let file = tempfile::NamedTempFile::new()?;
        assert_eq!(
            DeviceAccessProbe::read_only(file.path()).check(),
            PermissionState::Granted
        );
        Ok(())
    }
}
