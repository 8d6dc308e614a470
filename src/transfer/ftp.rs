//! FTP strategy over `curl`.
//!
//! Credentials go through a throwaway `.netrc` (mode 0600) so they never
//! appear in the URL or argv.

use super::listing::{parse_listing, parse_name_only};
use super::paths::join_remote_path;
use super::{Profile, RemoteFileEntry, TransferEngine, TransferError, TransferOutcome};
use crate::process::{CommandResult, CommandRunner, Invocation};
use crate::quoting::{encode_path_segment, netrc_token};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

struct FtpCredentials {
    username: String,
    password: String,
}

/// `ftp(s)://host:port/<encoded path>`; `directory` forces a trailing slash
/// so curl lists instead of fetching.
pub(super) fn ftp_url(profile: &Profile, remote_path: &str, directory: bool) -> String {
    let scheme = if profile.file_transfer.ftp_use_tls { "ftps" } else { "ftp" };
    let host = profile.connection.trimmed_host();
    let port = profile.connection.effective_port();

    let mut path = ftp_path(remote_path);
    if directory && !path.ends_with('/') {
        path.push('/');
    }
    format!("{}://{}:{}{}", scheme, host, port, path)
}

fn ftp_path(remote_path: &str) -> String {
    let trimmed = remote_path.trim();
    let trimmed = trimmed.strip_prefix("./").unwrap_or(trimmed);
    if trimmed.is_empty() || trimmed == "." {
        return "/".to_string();
    }

    let encoded = trimmed
        .split('/')
        .map(encode_path_segment)
        .collect::<Vec<_>>()
        .join("/");
    if encoded.starts_with('/') {
        encoded
    } else {
        format!("/{}", encoded)
    }
}

/// Path as sent inside a `-Q` command
fn quote_path(path: &str) -> TransferOutcome<String> {
    if path.contains(['\r', '\n']) {
        return Err(TransferError::new("FTP path contains unsupported newline characters"));
    }
    let path = path.trim();
    Ok(path.strip_prefix("./").unwrap_or(path).to_string())
}

pub(super) fn netrc_contents(host: &str, username: &str, password: &str) -> String {
    format!(
        "machine {}\nlogin {}\npassword {}\n",
        host,
        netrc_token(username),
        netrc_token(password)
    )
}

fn write_netrc(contents: &str) -> TransferOutcome<NamedTempFile> {
    let prepare = || -> std::io::Result<NamedTempFile> {
        let mut file = tempfile::Builder::new().prefix("sshdeck-netrc-").tempfile()?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.as_file()
                .set_permissions(std::fs::Permissions::from_mode(0o600))?;
        }
        file.write_all(contents.as_bytes())?;
        file.flush()?;
        Ok(file)
    };
    prepare().map_err(|_| TransferError::new("Failed to prepare FTP credentials"))
}

impl<R: CommandRunner> TransferEngine<R> {
    fn ftp_credentials(&self, profile: &Profile) -> TransferOutcome<FtpCredentials> {
        let connection = &profile.connection;
        if connection.trimmed_host().is_empty() {
            return Err(TransferError::new("FTP requires host"));
        }
        let username = connection.trimmed_username();
        if username.is_empty() {
            return Err(TransferError::new("FTP requires username"));
        }
        let password = self
            .credentials
            .get_non_empty(&profile.id)?
            .ok_or_else(|| TransferError::new("FTP requires password in Keychain"))?;

        if username.contains(['\r', '\n']) || password.contains(['\r', '\n']) {
            return Err(TransferError::new(
                "FTP credentials contain unsupported newline characters",
            ));
        }
        Ok(FtpCredentials {
            username: username.to_string(),
            password,
        })
    }

    /// `curl -sS --netrc-file <f> (--ftp-pasv | --ftp-port -) <extra...>`
    fn run_curl(&self, profile: &Profile, extra: Vec<String>, fallback: &str) -> TransferOutcome<CommandResult> {
        let credentials = self.ftp_credentials(profile)?;
        let netrc = write_netrc(&netrc_contents(
            profile.connection.trimmed_host(),
            &credentials.username,
            &credentials.password,
        ))?;

        let mut invocation = Invocation::new(&self.tools.curl)
            .arg("-sS")
            .arg("--netrc-file")
            .arg(netrc.path().to_string_lossy());
        invocation = if profile.file_transfer.ftp_passive_mode {
            invocation.arg("--ftp-pasv")
        } else {
            invocation.arg("--ftp-port").arg("-")
        };
        let invocation = invocation.args(extra);

        let result = self.run_checked(&invocation, fallback);
        drop(netrc);
        result
    }

    pub(super) fn ftp_list(&self, profile: &Profile, path: &str) -> TransferOutcome<Vec<RemoteFileEntry>> {
        let url = ftp_url(profile, path, true);
        let result = self.run_curl(profile, vec![url.clone()], "FTP list failed")?;
        let entries = parse_listing(&result.stdout, path);
        if !entries.is_empty() {
            return Ok(entries);
        }

        tracing::debug!("Long FTP listing of {} parsed empty, retrying name-only", path);
        let fallback = self.run_curl(profile, vec!["--list-only".to_string(), url], "FTP list failed")?;
        Ok(parse_name_only(&fallback.stdout, path))
    }

    pub(super) fn ftp_upload(&self, profile: &Profile, local_path: &Path, remote_directory: &str) -> TransferOutcome<()> {
        let name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| TransferError::new("Local path has no file name"))?;
        let url = ftp_url(profile, &join_remote_path(remote_directory, &name), false);
        self.run_curl(
            profile,
            vec!["-T".to_string(), local_path.to_string_lossy().into_owned(), url],
            "FTP upload failed",
        )
        .map(|_| ())
    }

    pub(super) fn ftp_download(&self, profile: &Profile, remote_path: &str, local_path: &Path) -> TransferOutcome<()> {
        let url = ftp_url(profile, remote_path, false);
        self.run_curl(
            profile,
            vec!["-o".to_string(), local_path.to_string_lossy().into_owned(), url],
            "FTP download failed",
        )
        .map(|_| ())
    }

    /// First `max_bytes` of a remote file into `local_path`
    pub(super) fn ftp_read_range(
        &self,
        profile: &Profile,
        remote_path: &str,
        max_bytes: usize,
        local_path: &Path,
    ) -> TransferOutcome<()> {
        let url = ftp_url(profile, remote_path, false);
        self.run_curl(
            profile,
            vec![
                "--range".to_string(),
                format!("0-{}", max_bytes.saturating_sub(1)),
                "-o".to_string(),
                local_path.to_string_lossy().into_owned(),
                url,
            ],
            "Failed to read remote file",
        )
        .map(|_| ())
    }

    /// Issue raw FTP verbs (`MKD`, `RNFR`/`RNTO`, `DELE`, `RMD`) against the root URL
    pub(super) fn ftp_quote(&self, profile: &Profile, commands: &[(&str, &str)], fallback: &str) -> TransferOutcome<()> {
        let mut extra = Vec::with_capacity(commands.len() * 2 + 1);
        for (verb, path) in commands {
            extra.push("-Q".to_string());
            extra.push(format!("{} {}", verb, quote_path(path)?));
        }
        extra.push(ftp_url(profile, "/", true));
        self.run_curl(profile, extra, fallback).map(|_| ())
    }
}
