//! CloudImage orchestration engine
//!
//! A pipeline is an ordered list of [`Step`]s sharing one [`StateBag`]. The
//! [`Runner`] executes them in order and unwinds through every started
//! step's cleanup, in reverse, once the run is over. A successful run leaves
//! an [`Artifact`] behind.

pub mod artifact;
pub mod error;
pub mod runner;
pub mod state;
pub mod step;
pub mod transfer;
pub mod ui;

// Re-exports
pub use artifact::{
    Artifact, ArtifactRecord, BUILDER_ID_IMAGE, BUILDER_ID_OVF, BUILDER_ID_VMWARE, ImageArtifact,
    LocalFilesArtifact, RemoteOvfPackageArtifact, destroy_image,
};
pub use error::{ArtifactError, Result, StepError};
pub use runner::{CleanupFailure, RunOutcome, RunStatus, Runner};
pub use state::{PipelineSettings, RunSettings, StateBag, StateKey};
pub use step::{Step, StepAction};
pub use transfer::{
    FileTransfer, OvfPackageFiles, PackageFileKind, TransferError, is_package_file,
};
pub use ui::{RecordingUi, TracingUi, Ui, UiEvent};
