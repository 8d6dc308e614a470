//! SFTP strategy: every operation is a short `sftp -b` batch script.

use super::listing::parse_listing;
use super::{Profile, RemoteFileEntry, TransferEngine, TransferError, TransferOutcome};
use crate::process::{CommandRunner, Invocation};
use crate::quoting::sftp_quote;
use crate::ssh::transfer_option_args;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

fn write_batch(commands: &str) -> TransferOutcome<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("sshdeck-sftp-")
        .suffix(".batch")
        .tempfile()
        .map_err(|_| TransferError::new("Failed to create temporary SFTP batch file"))?;
    file.write_all(commands.as_bytes())
        .and_then(|_| file.flush())
        .map_err(|_| TransferError::new("Failed to create temporary SFTP batch file"))?;
    Ok(file)
}

pub(super) fn list_batch(path: &str) -> String {
    format!("cd {}\nls -la\n", sftp_quote(path))
}

pub(super) fn upload_batch(local_path: &str, remote_directory: &str, is_directory: bool) -> String {
    let put = if is_directory { "put -r" } else { "put" };
    format!(
        "cd {}\n{} {}\n",
        sftp_quote(remote_directory),
        put,
        sftp_quote(local_path)
    )
}

pub(super) fn download_batch(remote_path: &str, local_path: &str, is_directory: bool) -> String {
    let get = if is_directory { "get -r" } else { "get" };
    format!("{} {} {}\n", get, sftp_quote(remote_path), sftp_quote(local_path))
}

impl<R: CommandRunner> TransferEngine<R> {
    /// `sftp -q -P <port> <opts> -b <batch> user@host`; the batch file is
    /// removed when this returns.
    fn run_sftp_batch(&self, profile: &Profile, commands: &str, fallback: &str) -> TransferOutcome<String> {
        self.require_host_and_user(profile)?;
        let connection = &profile.connection;
        let batch = write_batch(commands)?;

        let invocation = Invocation::new(&self.tools.sftp)
            .arg("-q")
            .arg("-P")
            .arg(connection.effective_port().to_string())
            .args(transfer_option_args(connection))
            .arg("-b")
            .arg(batch.path().to_string_lossy())
            .arg(connection.target());
        let invocation = self.authenticated(profile, invocation)?;

        let result = self.run_checked(&invocation, fallback)?;
        Ok(result.combined_output())
    }

    pub(super) fn sftp_list(&self, profile: &Profile, path: &str) -> TransferOutcome<Vec<RemoteFileEntry>> {
        let output = self.run_sftp_batch(profile, &list_batch(path), "SFTP list failed")?;
        Ok(parse_listing(&output, path))
    }

    pub(super) fn sftp_upload(
        &self,
        profile: &Profile,
        local_path: &Path,
        remote_directory: &str,
        is_directory: bool,
    ) -> TransferOutcome<()> {
        let batch = upload_batch(&local_path.to_string_lossy(), remote_directory, is_directory);
        self.run_sftp_batch(profile, &batch, "SFTP upload failed")
            .map(|_| ())
    }

    pub(super) fn sftp_download(
        &self,
        profile: &Profile,
        remote_path: &str,
        local_path: &Path,
        is_directory: bool,
    ) -> TransferOutcome<()> {
        let batch = download_batch(remote_path, &local_path.to_string_lossy(), is_directory);
        self.run_sftp_batch(profile, &batch, "SFTP download failed")
            .map(|_| ())
    }
}
