mod common;

use cloudimage_compute::testing::FakeCompute;
use cloudimage_core::{
    BUILDER_ID_IMAGE, BUILDER_ID_VMWARE, LocalFilesArtifact, PipelineSettings, RunStatus,
    StepError,
};
use cloudimage_steps::{Pipeline, ToolRunner};
use common::{MemoryTransfer, import_settings, state};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Shell script standing in for ovftool: writes a package next to the
/// requested `.ovf` path.
fn fake_ovftool(dir: &Path) -> ToolRunner {
    let script = dir.join("ovftool");
    fs::write(
        &script,
        "#!/bin/sh\n\
         for last; do :; done\n\
         base=\"${last%.ovf}\"\n\
         touch \"$base.ovf\" \"$base.mf\" \"$base-disk1.vmdk\"\n\
         echo 'Completed successfully'\n",
    )
    .unwrap();
    ToolRunner::new("sh").arg(script)
}

fn vmware_build(dir: &Path) -> LocalFilesArtifact {
    let build = dir.join("output-vmware-iso");
    fs::create_dir_all(&build).unwrap();
    fs::write(build.join("centos7.vmx"), "").unwrap();
    fs::write(build.join("centos7-disk1.vmdk"), "").unwrap();
    LocalFilesArtifact::from_directory(&build, BUILDER_ID_VMWARE).unwrap()
}

#[tokio::test]
async fn test_import_converts_uploads_and_imports() {
    let temp_dir = tempfile::tempdir().unwrap();
    let output_dir = temp_dir.path().join("ovf");
    let fake = Arc::new(FakeCompute::seeded());
    let transfer = Arc::new(MemoryTransfer::default());

    let pipeline = Pipeline::with_ovftool(fake_ovftool(temp_dir.path()), transfer.clone());
    let (mut state, ui) = state(&fake, PipelineSettings::Import(import_settings(&output_dir)));
    state.set_source_artifact(Box::new(vmware_build(temp_dir.path())));

    let outcome = pipeline.run(&mut state).await;

    assert_eq!(outcome.status, RunStatus::Succeeded);
    let artifact = outcome.artifact.unwrap();
    assert_eq!(artifact.builder_id(), BUILDER_ID_IMAGE);
    let image = fake.customer_image(&artifact.id()).unwrap();
    assert_eq!(image.name, "centos7-imported");

    let mut uploaded = transfer.files();
    uploaded.sort();
    assert_eq!(
        uploaded,
        vec!["centos7-disk1.vmdk", "centos7.mf", "centos7.ovf"]
    );
    assert!(ui.contains("[ovftool] Completed successfully"));

    // the converted package is removed once the run is over
    assert!(!output_dir.exists());
}

#[tokio::test]
async fn test_import_without_vmware_build_uploads_nothing() {
    let temp_dir = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeCompute::seeded());
    let transfer = Arc::new(MemoryTransfer::default());

    let pipeline = Pipeline::with_ovftool(fake_ovftool(temp_dir.path()), transfer.clone());
    let (mut state, _ui) = state(
        &fake,
        PipelineSettings::Import(import_settings(&temp_dir.path().join("ovf"))),
    );
    state.set_source_artifact(Box::new(LocalFilesArtifact::new(
        temp_dir.path(),
        Vec::new(),
        "virtualbox-iso",
    )));

    let outcome = pipeline.run(&mut state).await;

    assert_eq!(
        outcome.status,
        RunStatus::Halted {
            step: "convert-vmx-to-ovf"
        }
    );
    assert!(matches!(
        outcome.error,
        Some(StepError::UnexpectedArtifact { .. })
    ));
    assert!(transfer.files().is_empty());
    assert_eq!(fake.call_count("import_customer_image"), 0);
}
