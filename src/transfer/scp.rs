//! SCP strategy. Listing goes through `ssh ... ls -la` since scp cannot list.

use super::listing::parse_listing;
use super::paths::join_remote_path;
use super::{scp_remote, Profile, RemoteFileEntry, TransferEngine, TransferError, TransferOutcome};
use crate::process::{CommandRunner, Invocation};
use crate::quoting::shell_quote;
use crate::ssh::transfer_option_args;
use std::path::Path;

impl<R: CommandRunner> TransferEngine<R> {
    /// `scp [-r] -P <port> <opts> <src> <dst>`
    fn run_scp(
        &self,
        profile: &Profile,
        source: String,
        destination: String,
        recursive: bool,
        fallback: &str,
    ) -> TransferOutcome<()> {
        self.require_host_and_user(profile)?;
        let connection = &profile.connection;

        let mut invocation = Invocation::new(&self.tools.scp);
        if recursive {
            invocation = invocation.arg("-r");
        }
        let invocation = invocation
            .arg("-P")
            .arg(connection.effective_port().to_string())
            .args(transfer_option_args(connection))
            .arg(source)
            .arg(destination);
        let invocation = self.authenticated(profile, invocation)?;

        self.run_checked(&invocation, fallback).map(|_| ())
    }

    pub(super) fn scp_list(&self, profile: &Profile, path: &str) -> TransferOutcome<Vec<RemoteFileEntry>> {
        let command = format!("LC_ALL=C ls -la {}", shell_quote(path));
        let result = self.remote_shell(profile, &command, "SCP browse failed")?;
        Ok(parse_listing(&result.combined_output(), path))
    }

    pub(super) fn scp_upload(
        &self,
        profile: &Profile,
        local_path: &Path,
        remote_directory: &str,
        is_directory: bool,
    ) -> TransferOutcome<()> {
        let name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| TransferError::new("Local path has no file name"))?;
        let destination = scp_remote(profile, &join_remote_path(remote_directory, &name));
        self.run_scp(
            profile,
            local_path.to_string_lossy().into_owned(),
            destination,
            is_directory,
            "SCP upload failed",
        )
    }

    pub(super) fn scp_download(
        &self,
        profile: &Profile,
        remote_path: &str,
        local_path: &Path,
        is_directory: bool,
    ) -> TransferOutcome<()> {
        self.run_scp(
            profile,
            scp_remote(profile, remote_path),
            local_path.to_string_lossy().into_owned(),
            is_directory,
            "SCP download failed",
        )
    }
}
