//! File transfer to a datacenter's FTPS host

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Failed to {operation} '{target}': {message}")]
    Failed {
        operation: &'static str,
        target: String,
        message: String,
    },

    #[error("Cannot find '{0}' on PATH")]
    ToolNotFound(String),

    #[error("File transfer was cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Moves OVF package files to and from a datacenter's FTPS host
#[async_trait]
pub trait FileTransfer: Send + Sync {
    /// Upload a local file; the remote name is the file name.
    async fn upload(
        &self,
        host: &str,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), TransferError>;

    /// Names of the remote files that make up package `prefix`
    async fn list(&self, host: &str, prefix: &str) -> Result<Vec<String>, TransferError>;

    async fn delete(&self, host: &str, name: &str) -> Result<(), TransferError>;
}

/// Whether `name` is one of package `prefix`'s files.
///
/// ovftool writes `<prefix>.ovf`, `<prefix>.mf` and `<prefix>-disk<N>.vmdk`, so a
/// sibling package such as `<prefix>-prod` never matches.
pub fn is_package_file(name: &str, prefix: &str) -> bool {
    let Some(rest) = name.strip_prefix(prefix) else {
        return false;
    };
    rest == ".ovf" || rest == ".mf" || rest.starts_with("-disk")
}

/// The three kinds of file an OVF package must contain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PackageFileKind {
    Manifest,
    Descriptor,
    Disk,
}

impl PackageFileKind {
    pub const ALL: [PackageFileKind; 3] = [
        PackageFileKind::Manifest,
        PackageFileKind::Descriptor,
        PackageFileKind::Disk,
    ];

    /// Classify a file by its extension (`.vmdk.gz` counts as a disk).
    pub fn of(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        if name.ends_with(".mf") {
            Some(PackageFileKind::Manifest)
        } else if name.ends_with(".ovf") {
            Some(PackageFileKind::Descriptor)
        } else if name.ends_with(".vmdk") || name.ends_with(".vmdk.gz") {
            Some(PackageFileKind::Disk)
        } else {
            None
        }
    }
}

impl std::fmt::Display for PackageFileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PackageFileKind::Manifest => write!(f, "manifest (.mf)"),
            PackageFileKind::Descriptor => write!(f, "descriptor (.ovf)"),
            PackageFileKind::Disk => write!(f, "disk image (.vmdk)"),
        }
    }
}

/// Files of an OVF package, grouped by kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OvfPackageFiles {
    pub manifest: Option<PathBuf>,
    pub descriptor: Option<PathBuf>,
    pub disks: Vec<PathBuf>,
}

impl OvfPackageFiles {
    pub fn classify<'a>(files: impl IntoIterator<Item = &'a PathBuf>) -> Self {
        let mut package = Self::default();
        for file in files {
            match PackageFileKind::of(file) {
                Some(PackageFileKind::Manifest) => package.manifest = Some(file.clone()),
                Some(PackageFileKind::Descriptor) => package.descriptor = Some(file.clone()),
                Some(PackageFileKind::Disk) => package.disks.push(file.clone()),
                None => {}
            }
        }
        package
    }

    /// Every kind the package lacks, in a fixed order.
    pub fn missing(&self) -> Vec<PackageFileKind> {
        let mut missing = Vec::new();
        if self.manifest.is_none() {
            missing.push(PackageFileKind::Manifest);
        }
        if self.descriptor.is_none() {
            missing.push(PackageFileKind::Descriptor);
        }
        if self.disks.is_empty() {
            missing.push(PackageFileKind::Disk);
        }
        missing
    }

    /// Package prefix: the descriptor's file stem.
    pub fn prefix(&self) -> Option<String> {
        self.descriptor
            .as_ref()
            .and_then(|p| p.file_stem())
            .map(|s| s.to_string_lossy().into_owned())
    }

    /// Manifest, descriptor, then disks.
    pub fn all(&self) -> Vec<&PathBuf> {
        self.manifest
            .iter()
            .chain(self.descriptor.iter())
            .chain(self.disks.iter())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_package() {
        let files = vec![
            PathBuf::from("/out/centos7.mf"),
            PathBuf::from("/out/centos7.ovf"),
            PathBuf::from("/out/centos7-disk1.vmdk.gz"),
            PathBuf::from("/out/notes.txt"),
        ];

        let package = OvfPackageFiles::classify(&files);
        assert!(package.missing().is_empty());
        assert_eq!(package.prefix().as_deref(), Some("centos7"));
        assert_eq!(package.all().len(), 3);
    }

    #[test]
    fn test_missing_manifest_only() {
        let files = vec![
            PathBuf::from("/out/centos7.ovf"),
            PathBuf::from("/out/centos7-disk1.vmdk"),
        ];

        let package = OvfPackageFiles::classify(&files);
        assert_eq!(package.missing(), vec![PackageFileKind::Manifest]);
    }

    #[test]
    fn test_package_file_names_ignore_sibling_packages() {
        assert!(is_package_file("centos7.ovf", "centos7"));
        assert!(is_package_file("centos7.mf", "centos7"));
        assert!(is_package_file("centos7-disk1.vmdk", "centos7"));
        assert!(!is_package_file("centos7-prod.ovf", "centos7"));
        assert!(!is_package_file("centos7-prod-disk1.vmdk", "centos7"));
        assert!(!is_package_file("centos7.ovf.bak", "centos7"));
        assert!(!is_package_file("centos.ovf", "centos7"));
    }

    #[test]
    fn test_missing_everything() {
        let package = OvfPackageFiles::classify(&Vec::new());
        assert_eq!(package.missing(), PackageFileKind::ALL.to_vec());
    }
}
