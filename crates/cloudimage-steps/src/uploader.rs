//! FTPS file transfer through `curl`

use async_trait::async_trait;
use cloudimage_core::{FileTransfer, TransferError, is_package_file};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// [`FileTransfer`] backed by the `curl` executable
///
/// Credentials are passed on stdin as a curl config file so they never show
/// up in the process list.
pub struct CurlTransfer {
    curl: PathBuf,
    user: String,
    password: String,
}

impl CurlTransfer {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            curl: PathBuf::from("curl"),
            user: user.into(),
            password: password.into(),
        }
    }

    pub fn with_curl(mut self, curl: impl Into<PathBuf>) -> Self {
        self.curl = curl.into();
        self
    }

    fn credentials(&self) -> String {
        format!(
            "user = \"{}:{}\"\n",
            escape(&self.user),
            escape(&self.password)
        )
    }

    async fn curl(
        &self,
        operation: &'static str,
        target: &str,
        args: Vec<String>,
        cancel: Option<&CancellationToken>,
    ) -> Result<String, TransferError> {
        tracing::debug!("Running: curl {}", args.join(" "));

        let mut child = Command::new(&self.curl)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| match err.kind() {
                std::io::ErrorKind::NotFound => {
                    TransferError::ToolNotFound(self.curl.display().to_string())
                }
                _ => TransferError::Io(err),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(self.credentials().as_bytes()).await?;
        }

        let output = match cancel {
            Some(cancel) => tokio::select! {
                _ = cancel.cancelled() => return Err(TransferError::Cancelled),
                output = child.wait_with_output() => output?,
            },
            None => child.wait_with_output().await?,
        };

        if !output.status.success() {
            return Err(TransferError::Failed {
                operation,
                target: target.to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Common arguments: config from stdin, TLS required, quiet but with errors.
fn base_args() -> Vec<String> {
    ["--config", "-", "--ssl-reqd", "--silent", "--show-error"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn upload_args(host: &str, path: &Path) -> Vec<String> {
    let mut args = base_args();
    args.push("--upload-file".to_string());
    args.push(path.display().to_string());
    args.push(format!("ftp://{}/", host));
    args
}

fn list_args(host: &str) -> Vec<String> {
    let mut args = base_args();
    args.push("--list-only".to_string());
    args.push(format!("ftp://{}/", host));
    args
}

fn delete_args(host: &str, name: &str) -> Vec<String> {
    let mut args = base_args();
    args.push("--quote".to_string());
    args.push(format!("DELE {}", name));
    args.push(format!("ftp://{}/", host));
    args
}

/// Package `prefix`'s file names in a `--list-only` listing
fn parse_listing(listing: &str, prefix: &str) -> Vec<String> {
    listing
        .lines()
        .map(str::trim)
        .filter(|name| is_package_file(name, prefix))
        .map(str::to_string)
        .collect()
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[async_trait]
impl FileTransfer for CurlTransfer {
    async fn upload(
        &self,
        host: &str,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), TransferError> {
        let target = format!("{} on {}", path.display(), host);
        self.curl("upload", &target, upload_args(host, path), Some(cancel))
            .await?;
        Ok(())
    }

    async fn list(&self, host: &str, prefix: &str) -> Result<Vec<String>, TransferError> {
        let listing = self.curl("list", host, list_args(host), None).await?;
        Ok(parse_listing(&listing, prefix))
    }

    async fn delete(&self, host: &str, name: &str) -> Result<(), TransferError> {
        let target = format!("{} on {}", name, host);
        self.curl("delete", &target, delete_args(host, name), None)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_args_require_tls_and_hide_credentials() {
        let args = upload_args("ftps-au9.example.com", Path::new("/tmp/pkg/centos7.ovf"));
        assert!(args.contains(&"--ssl-reqd".to_string()));
        assert!(args.contains(&"/tmp/pkg/centos7.ovf".to_string()));
        assert_eq!(args.last().unwrap(), "ftp://ftps-au9.example.com/");
        assert!(!args.iter().any(|a| a.contains("--user")));
    }

    #[test]
    fn test_delete_args() {
        let args = delete_args("ftps-au9.example.com", "centos7.mf");
        let quote = args.iter().position(|a| a == "--quote").unwrap();
        assert_eq!(args[quote + 1], "DELE centos7.mf");
    }

    #[test]
    fn test_parse_listing_filters_by_prefix() {
        let listing = "centos7.mf\r\ncentos7.ovf\r\n\r\ncentos7-disk1.vmdk\r\nubuntu.ovf\r\n";
        assert_eq!(
            parse_listing(listing, "centos7"),
            vec!["centos7.mf", "centos7.ovf", "centos7-disk1.vmdk"]
        );
        assert!(list_args("h").contains(&"--list-only".to_string()));
    }

    #[test]
    fn test_parse_listing_skips_sibling_package() {
        let listing = "centos7.mf\ncentos7.ovf\ncentos7-disk1.vmdk\n\
                       centos7-prod.mf\ncentos7-prod.ovf\ncentos7-prod-disk1.vmdk";
        assert_eq!(
            parse_listing(listing, "centos7"),
            vec!["centos7.mf", "centos7.ovf", "centos7-disk1.vmdk"]
        );
    }

    #[test]
    fn test_credentials_are_quoted() {
        let transfer = CurlTransfer::new("packer", "p\"ss\\word");
        assert_eq!(transfer.credentials(), "user = \"packer:p\\\"ss\\\\word\"\n");
    }

    #[tokio::test]
    async fn test_missing_curl_binary() {
        let transfer = CurlTransfer::new("packer", "secret").with_curl("/nonexistent/curl");
        let err = transfer.list("ftps-au9.example.com", "centos7").await.unwrap_err();
        assert!(matches!(err, TransferError::ToolNotFound(_)));
    }
}
