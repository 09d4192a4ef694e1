use super::complete;
use crate::tool::ToolRunner;
use async_trait::async_trait;
use cloudimage_core::{
    Artifact, BUILDER_ID_OVF, BUILDER_ID_VMWARE, LocalFilesArtifact, Result, StateBag, StateKey,
    Step, StepAction, StepError,
};
use std::path::PathBuf;

/// Convert a local VMware build (`.vmx`) into an OVF package with ovftool.
///
/// The package replaces the source artifact. The output directory is
/// removed on cleanup when `cleanup_ovf` is set.
#[derive(Debug)]
pub struct ConvertVmxToOvf {
    ovftool: ToolRunner,
    output_dir: Option<PathBuf>,
}

impl ConvertVmxToOvf {
    /// `ovftool` must already be located.
    pub fn new(ovftool: ToolRunner) -> Self {
        Self {
            ovftool,
            output_dir: None,
        }
    }

    /// Directory the package is written to, once the step has run
    pub fn output_dir(&self) -> Option<&PathBuf> {
        self.output_dir.as_ref()
    }

    async fn execute(&mut self, state: &mut StateBag) -> Result<()> {
        let config = state.require_config()?;
        let token = config.token.clone();
        let settings = state.require_import_settings()?.clone();

        let source = state.require_source_artifact()?;
        if source.builder_id() != BUILDER_ID_VMWARE {
            return Err(StepError::UnexpectedArtifact {
                expected: BUILDER_ID_VMWARE.to_string(),
                actual: source.builder_id().to_string(),
            });
        }
        let vmx = source
            .file_with_extension("vmx")
            .ok_or(StepError::MissingArtifactFile(".vmx"))?
            .clone();

        let output_dir = settings
            .output_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(format!("cloudimage-ovf-{}", token)));
        tokio::fs::create_dir_all(&output_dir).await?;
        self.output_dir = Some(output_dir.clone());

        let ovf = output_dir.join(format!("{}.ovf", settings.ovf_package_prefix));

        state.ui().say(&format!(
            "Converting '{}' to OVF package '{}'...",
            vmx.display(),
            ovf.display()
        ));

        let args = [
            format!("--compress={}", settings.disk_compression),
            "--targetType=OVF".to_string(),
            vmx.display().to_string(),
            ovf.display().to_string(),
        ];
        let ui = state.ui().clone();
        self.ovftool
            .clone()
            .current_dir(&output_dir)
            .run(&args, state.cancel_token(), |_, line| {
                ui.message(&format!("[ovftool] {}", line))
            })
            .await?;

        let package = LocalFilesArtifact::from_directory(&output_dir, BUILDER_ID_OVF)?;
        state.ui().message(&format!(
            "Converted '{}' to OVF package ({} files).",
            vmx.display(),
            package.files().len()
        ));
        state.set_source_artifact(Box::new(package));
        Ok(())
    }
}

#[async_trait]
impl Step for ConvertVmxToOvf {
    fn name(&self) -> &'static str {
        "convert-vmx-to-ovf"
    }

    fn requires(&self) -> &'static [StateKey] {
        &[StateKey::Config, StateKey::SourceArtifact]
    }

    fn produces(&self) -> &'static [StateKey] {
        &[StateKey::SourceArtifact]
    }

    async fn run(&mut self, state: &mut StateBag) -> StepAction {
        let result = self.execute(state).await;
        complete(state, result)
    }

    async fn cleanup(&mut self, state: &mut StateBag) -> std::result::Result<(), StepError> {
        let cleanup_ovf = state
            .require_import_settings()
            .map(|s| s.cleanup_ovf)
            .unwrap_or(true);
        if !cleanup_ovf {
            return Ok(());
        }

        let Some(output_dir) = self.output_dir.take() else {
            return Ok(());
        };

        tracing::debug!("Removing OVF output directory '{}'", output_dir.display());
        match tokio::fs::remove_dir_all(&output_dir).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{import_settings, state_for};
    use cloudimage_compute::testing::FakeCompute;
    use cloudimage_core::{PipelineSettings, RecordingUi};
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;

    /// Stand-in for ovftool: writes the package files next to the `.ovf`
    /// path it is given and reports progress.
    fn fake_ovftool(dir: &Path) -> ToolRunner {
        let script = dir.join("ovftool");
        fs::write(
            &script,
            "#!/bin/sh\n\
             for last; do :; done\n\
             base=\"${last%.ovf}\"\n\
             echo \"Opening VMX source: $3\"\n\
             echo \"$1\" >&2\n\
             touch \"$base.ovf\" \"$base.mf\" \"$base-disk1.vmdk\"\n\
             echo 'Completed successfully'\n",
        )
        .unwrap();
        ToolRunner::new("sh").arg(script)
    }

    fn vmware_build(dir: &Path) -> LocalFilesArtifact {
        let build = dir.join("build");
        fs::create_dir_all(&build).unwrap();
        fs::write(build.join("centos7.vmx"), "").unwrap();
        fs::write(build.join("disk.vmdk"), "").unwrap();
        LocalFilesArtifact::from_directory(&build, BUILDER_ID_VMWARE).unwrap()
    }

    fn import_state(output_dir: &Path, cleanup_ovf: bool) -> (StateBag, Arc<RecordingUi>) {
        let mut settings = import_settings();
        settings.output_dir = Some(output_dir.to_path_buf());
        settings.cleanup_ovf = cleanup_ovf;
        state_for(
            Arc::new(FakeCompute::seeded()),
            PipelineSettings::Import(settings),
        )
    }

    #[tokio::test]
    async fn test_converts_and_replaces_source_artifact() {
        let temp_dir = tempfile::tempdir().unwrap();
        let output_dir = temp_dir.path().join("ovf");
        let (mut state, ui) = import_state(&output_dir, true);
        state.set_source_artifact(Box::new(vmware_build(temp_dir.path())));

        let mut step = ConvertVmxToOvf::new(fake_ovftool(temp_dir.path()));
        assert_eq!(step.run(&mut state).await, StepAction::Continue);

        let package = state.source_artifact().unwrap();
        assert_eq!(package.builder_id(), BUILDER_ID_OVF);
        assert_eq!(package.files().len(), 3);
        assert!(package.file_with_extension("mf").is_some());
        assert!(output_dir.join("centos7.ovf").exists());

        assert!(ui.contains("[ovftool] Completed successfully"));
        assert!(ui.contains("[ovftool] --compress=5"));

        step.cleanup(&mut state).await.unwrap();
        assert!(!output_dir.exists());
    }

    #[tokio::test]
    async fn test_keeps_output_when_cleanup_disabled() {
        let temp_dir = tempfile::tempdir().unwrap();
        let output_dir = temp_dir.path().join("ovf");
        let (mut state, _ui) = import_state(&output_dir, false);
        state.set_source_artifact(Box::new(vmware_build(temp_dir.path())));

        let mut step = ConvertVmxToOvf::new(fake_ovftool(temp_dir.path()));
        step.run(&mut state).await;
        step.cleanup(&mut state).await.unwrap();

        assert!(output_dir.join("centos7.mf").exists());
    }

    #[tokio::test]
    async fn test_rejects_non_vmware_artifact() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (mut state, _ui) = import_state(&temp_dir.path().join("ovf"), true);
        state.set_source_artifact(Box::new(LocalFilesArtifact::new(
            temp_dir.path(),
            Vec::new(),
            "virtualbox",
        )));

        let mut step = ConvertVmxToOvf::new(fake_ovftool(temp_dir.path()));
        assert_eq!(step.run(&mut state).await, StepAction::Halt);
        assert!(matches!(
            state.error(),
            Some(StepError::UnexpectedArtifact { actual, .. }) if actual == "virtualbox"
        ));
        assert!(step.output_dir().is_none());
    }

    #[tokio::test]
    async fn test_requires_vmx_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (mut state, _ui) = import_state(&temp_dir.path().join("ovf"), true);
        state.set_source_artifact(Box::new(LocalFilesArtifact::new(
            temp_dir.path(),
            vec![temp_dir.path().join("disk.vmdk")],
            BUILDER_ID_VMWARE,
        )));

        let mut step = ConvertVmxToOvf::new(fake_ovftool(temp_dir.path()));
        assert_eq!(step.run(&mut state).await, StepAction::Halt);
        assert!(matches!(
            state.error(),
            Some(StepError::MissingArtifactFile(".vmx"))
        ));
    }

    #[tokio::test]
    async fn test_tool_failure_halts() {
        let temp_dir = tempfile::tempdir().unwrap();
        let output_dir = temp_dir.path().join("ovf");
        let (mut state, _ui) = import_state(&output_dir, true);
        state.set_source_artifact(Box::new(vmware_build(temp_dir.path())));

        let mut step = ConvertVmxToOvf::new(ToolRunner::new("false"));
        assert_eq!(step.run(&mut state).await, StepAction::Halt);
        assert!(matches!(
            state.error(),
            Some(StepError::ProcessFailed { code: Some(1), .. })
        ));

        // the output directory was registered before the tool ran
        step.cleanup(&mut state).await.unwrap();
        assert!(!output_dir.exists());
    }
}
