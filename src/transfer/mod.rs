pub mod commands;
mod ftp;
pub mod listing;
pub mod paths;
mod scp;
mod sftp;

use crate::config::settings::ToolSettings;
use crate::config::Profile;
use crate::error::AppError;
use crate::keychain::CredentialStore;
use crate::process::{CommandResult, CommandRunner, Invocation, SystemRunner};
use crate::quoting::shell_quote;
use crate::ssh::{transfer_option_args, AuthMethod};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Default number of bytes shown by a preview
pub const DEFAULT_PREVIEW_BYTES: usize = 65_536;

/// Bytes rendered as hex for binary previews
const BINARY_HEAD_BYTES: usize = 32;

fn default_root() -> String {
    ".".to_string()
}

fn default_refresh() -> i32 {
    3
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferBackend {
    #[default]
    Sftp,
    Scp,
    Ftp,
}

impl fmt::Display for TransferBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferBackend::Sftp => write!(f, "SFTP"),
            TransferBackend::Scp => write!(f, "SCP"),
            TransferBackend::Ftp => write!(f, "FTP"),
        }
    }
}

/// Per-host file transfer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTransferConfig {
    #[serde(default)]
    pub backend: TransferBackend,
    #[serde(default = "default_root")]
    pub remote_root_path: String,
    #[serde(default = "default_refresh")]
    pub auto_refresh_seconds: i32,
    #[serde(default = "default_true")]
    pub live_preview: bool,
    #[serde(default)]
    pub ftp_use_tls: bool,
    #[serde(default = "default_true")]
    pub ftp_passive_mode: bool,
}

impl Default for FileTransferConfig {
    fn default() -> Self {
        Self {
            backend: TransferBackend::default(),
            remote_root_path: default_root(),
            auto_refresh_seconds: default_refresh(),
            live_preview: true,
            ftp_use_tls: false,
            ftp_passive_mode: true,
        }
    }
}

/// One canonical listing row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFileEntry {
    pub name: String,
    /// Unique key within a listing
    pub full_path: String,
    pub is_directory: bool,
    pub size_text: String,
    pub modified_text: String,
}

impl RemoteFileEntry {
    pub fn id(&self) -> &str {
        &self.full_path
    }
}

/// Flat, user-facing failure of one transfer operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferError {
    pub message: String,
}

impl TransferError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for TransferError {}

impl From<AppError> for TransferError {
    fn from(err: AppError) -> Self {
        TransferError::new(err.to_string())
    }
}

impl From<TransferError> for AppError {
    fn from(err: TransferError) -> Self {
        AppError::Process(err.message)
    }
}

impl From<&str> for TransferError {
    fn from(message: &str) -> Self {
        TransferError::new(message)
    }
}

pub type TransferOutcome<T> = Result<T, TransferError>;

/// Operations the file browser needs from a backend
pub trait RemoteFiles: Send + Sync {
    fn list(&self, profile: &Profile, path: &str) -> TransferOutcome<Vec<RemoteFileEntry>>;

    fn preview(&self, profile: &Profile, remote_path: &str, max_bytes: usize) -> TransferOutcome<String>;

    fn upload(&self, profile: &Profile, local_path: &Path, remote_directory: &str) -> TransferOutcome<()>;

    fn download(
        &self,
        profile: &Profile,
        remote_path: &str,
        local_path: &Path,
        is_directory: bool,
    ) -> TransferOutcome<()>;

    fn mkdir(&self, profile: &Profile, path: &str) -> TransferOutcome<()>;

    fn rename(&self, profile: &Profile, from: &str, to: &str) -> TransferOutcome<()>;

    fn delete(&self, profile: &Profile, path: &str, is_directory: bool) -> TransferOutcome<()>;
}

/// Compiles transfer operations into sftp/scp/ssh/curl invocations and runs them
pub struct TransferEngine<R: CommandRunner = SystemRunner> {
    runner: R,
    credentials: Arc<dyn CredentialStore>,
    tools: ToolSettings,
}

impl TransferEngine<SystemRunner> {
    pub fn system(credentials: Arc<dyn CredentialStore>, tools: ToolSettings) -> Self {
        Self::new(SystemRunner, credentials, tools)
    }
}

impl<R: CommandRunner> TransferEngine<R> {
    pub fn new(runner: R, credentials: Arc<dyn CredentialStore>, tools: ToolSettings) -> Self {
        Self {
            runner,
            credentials,
            tools,
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn list(&self, profile: &Profile, path: &str) -> TransferOutcome<Vec<RemoteFileEntry>> {
        let path = paths::normalize_remote_path(path);
        let entries = match profile.file_transfer.backend {
            TransferBackend::Sftp => self.sftp_list(profile, &path),
            TransferBackend::Scp => self.scp_list(profile, &path),
            TransferBackend::Ftp => self.ftp_list(profile, &path),
        }?;
        tracing::info!(
            "Listed {} entries in {} on {} ({})",
            entries.len(),
            path,
            profile.connection.trimmed_host(),
            profile.file_transfer.backend
        );
        Ok(entries)
    }

    pub fn upload(&self, profile: &Profile, local_path: &Path, remote_directory: &str) -> TransferOutcome<()> {
        let metadata = std::fs::metadata(local_path)
            .map_err(|_| TransferError::new("Local path does not exist"))?;
        let remote_directory = paths::normalize_remote_path(remote_directory);
        let is_directory = metadata.is_dir();

        match profile.file_transfer.backend {
            TransferBackend::Sftp => self.sftp_upload(profile, local_path, &remote_directory, is_directory),
            TransferBackend::Scp => self.scp_upload(profile, local_path, &remote_directory, is_directory),
            TransferBackend::Ftp => {
                if is_directory {
                    return Err(TransferError::new(
                        "FTP folder upload is not supported. Use SFTP/SCP or upload files.",
                    ));
                }
                self.ftp_upload(profile, local_path, &remote_directory)
            }
        }?;
        tracing::info!("Uploaded {} to {}", local_path.display(), remote_directory);
        Ok(())
    }

    pub fn download(
        &self,
        profile: &Profile,
        remote_path: &str,
        local_path: &Path,
        is_directory: bool,
    ) -> TransferOutcome<()> {
        let remote_path = paths::normalize_remote_path(remote_path);
        match profile.file_transfer.backend {
            TransferBackend::Sftp => self.sftp_download(profile, &remote_path, local_path, is_directory),
            TransferBackend::Scp => self.scp_download(profile, &remote_path, local_path, is_directory),
            TransferBackend::Ftp => {
                if is_directory {
                    return Err(TransferError::new(
                        "FTP folder download is not supported. Use SFTP/SCP or download files.",
                    ));
                }
                self.ftp_download(profile, &remote_path, local_path)
            }
        }?;
        tracing::info!("Downloaded {} to {}", remote_path, local_path.display());
        Ok(())
    }

    pub fn mkdir(&self, profile: &Profile, path: &str) -> TransferOutcome<()> {
        let path = required_path(path)?;
        match profile.file_transfer.backend {
            TransferBackend::Sftp | TransferBackend::Scp => self
                .remote_shell(
                    profile,
                    &format!("mkdir -p {}", shell_quote(&path)),
                    "Failed to create remote folder",
                )
                .map(|_| ()),
            TransferBackend::Ftp => self.ftp_quote(profile, &[("MKD", path.as_str())], "FTP mkdir failed"),
        }
    }

    pub fn rename(&self, profile: &Profile, from: &str, to: &str) -> TransferOutcome<()> {
        let from = required_path(from)?;
        let to = required_path(to)?;
        match profile.file_transfer.backend {
            TransferBackend::Sftp | TransferBackend::Scp => self
                .remote_shell(
                    profile,
                    &format!("mv {} {}", shell_quote(&from), shell_quote(&to)),
                    "Failed to rename remote item",
                )
                .map(|_| ()),
            TransferBackend::Ftp => self.ftp_quote(
                profile,
                &[("RNFR", from.as_str()), ("RNTO", to.as_str())],
                "FTP rename failed",
            ),
        }
    }

    pub fn delete(&self, profile: &Profile, path: &str, is_directory: bool) -> TransferOutcome<()> {
        let path = required_path(path)?;
        if matches!(path.as_str(), "." | "/" | "~") {
            return Err(TransferError::new("Refusing to delete the root folder"));
        }
        match profile.file_transfer.backend {
            TransferBackend::Sftp | TransferBackend::Scp => self
                .remote_shell(
                    profile,
                    &format!("rm -rf {}", shell_quote(&path)),
                    "Failed to delete remote item",
                )
                .map(|_| ()),
            TransferBackend::Ftp => {
                let verb = if is_directory { "RMD" } else { "DELE" };
                self.ftp_quote(profile, &[(verb, path.as_str())], "FTP delete failed")
            }
        }
    }

    /// First `max_bytes` of a remote file, rendered for display
    pub fn preview(&self, profile: &Profile, remote_path: &str, max_bytes: usize) -> TransferOutcome<String> {
        let max_bytes = max_bytes.max(1);
        let temp = tempfile::Builder::new()
            .prefix("sshdeck-preview-")
            .tempfile()
            .map_err(|_| TransferError::new("Failed to create temporary preview file"))?;

        match profile.file_transfer.backend {
            TransferBackend::Ftp => self.ftp_read_range(profile, remote_path, max_bytes, temp.path())?,
            _ => self.download(profile, remote_path, temp.path(), false)?,
        }

        let data = std::fs::read(temp.path())
            .map_err(|_| TransferError::new("Failed to read downloaded preview file"))?;
        Ok(render_preview(&data, max_bytes))
    }

    // ---------------------------------------------------------------------
    // Shared helpers for the ssh-family backends
    // ---------------------------------------------------------------------

    fn require_host_and_user(&self, profile: &Profile) -> TransferOutcome<()> {
        let connection = &profile.connection;
        if connection.trimmed_host().is_empty() || connection.trimmed_username().is_empty() {
            return Err(TransferError::new("Host or username is empty"));
        }
        Ok(())
    }

    /// Attach the stored password when the host uses password auth
    fn authenticated(&self, profile: &Profile, invocation: Invocation) -> TransferOutcome<Invocation> {
        if profile.connection.auth_method != AuthMethod::Password {
            return Ok(invocation);
        }
        match self.credentials.get_non_empty(&profile.id)? {
            Some(password) => Ok(invocation.with_credential(password)),
            None => Err(TransferError::new("Password for this host is missing in Keychain")),
        }
    }

    /// Run and turn a nonzero exit into a failure carrying the output
    fn run_checked(&self, invocation: &Invocation, fallback: &str) -> TransferOutcome<CommandResult> {
        let result = self.runner.run(invocation);
        if result.succeeded() {
            Ok(result)
        } else {
            Err(TransferError::new(result.message_or(fallback)))
        }
    }

    /// `ssh <opts> -p <port> user@host <command>`
    fn remote_shell(&self, profile: &Profile, command: &str, fallback: &str) -> TransferOutcome<CommandResult> {
        self.require_host_and_user(profile)?;
        let connection = &profile.connection;
        let invocation = Invocation::new(&self.tools.ssh)
            .args(transfer_option_args(connection))
            .arg("-p")
            .arg(connection.effective_port().to_string())
            .arg(connection.target())
            .arg(command);
        let invocation = self.authenticated(profile, invocation)?;
        self.run_checked(&invocation, fallback)
    }
}

impl<R: CommandRunner> RemoteFiles for TransferEngine<R> {
    fn list(&self, profile: &Profile, path: &str) -> TransferOutcome<Vec<RemoteFileEntry>> {
        TransferEngine::list(self, profile, path)
    }

    fn preview(&self, profile: &Profile, remote_path: &str, max_bytes: usize) -> TransferOutcome<String> {
        TransferEngine::preview(self, profile, remote_path, max_bytes)
    }

    fn upload(&self, profile: &Profile, local_path: &Path, remote_directory: &str) -> TransferOutcome<()> {
        TransferEngine::upload(self, profile, local_path, remote_directory)
    }

    fn download(
        &self,
        profile: &Profile,
        remote_path: &str,
        local_path: &Path,
        is_directory: bool,
    ) -> TransferOutcome<()> {
        TransferEngine::download(self, profile, remote_path, local_path, is_directory)
    }

    fn mkdir(&self, profile: &Profile, path: &str) -> TransferOutcome<()> {
        TransferEngine::mkdir(self, profile, path)
    }

    fn rename(&self, profile: &Profile, from: &str, to: &str) -> TransferOutcome<()> {
        TransferEngine::rename(self, profile, from, to)
    }

    fn delete(&self, profile: &Profile, path: &str, is_directory: bool) -> TransferOutcome<()> {
        TransferEngine::delete(self, profile, path, is_directory)
    }
}

fn required_path(path: &str) -> TransferOutcome<String> {
    let path = path.trim();
    if path.is_empty() {
        return Err(TransferError::new("Remote path is empty"));
    }
    Ok(path.to_string())
}

/// `user@host:'<path>'` for scp
fn scp_remote(profile: &Profile, path: &str) -> String {
    format!("{}:{}", profile.connection.target(), shell_quote(path))
}

/// Text for a preview pane.
///
/// Data containing a NUL byte is shown as a size line plus a hex dump of the
/// first bytes; anything else is decoded as lossy UTF-8.
pub fn render_preview(data: &[u8], max_bytes: usize) -> String {
    let clipped = &data[..data.len().min(max_bytes)];
    if clipped.contains(&0) {
        let head = clipped
            .iter()
            .take(BINARY_HEAD_BYTES)
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(" ");
        return format!("Binary file\nSize: {} bytes\nHead: {}", clipped.len(), head);
    }
    String::from_utf8_lossy(clipped).into_owned()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::keychain::MemoryCredentialStore;
    use crate::process::tests::RecordingRunner;
    use crate::ssh::ConnectionConfig;

    pub(crate) fn profile(backend: TransferBackend) -> Profile {
        let mut connection = ConnectionConfig::new("files.example.com", "alice");
        connection.port = 2222;
        connection.key_path = "/keys/id".to_string();
        let mut profile = Profile::new("files", connection);
        profile.id = "host-1".to_string();
        profile.file_transfer.backend = backend;
        profile
    }

    pub(crate) fn engine(results: Vec<CommandResult>) -> TransferEngine<RecordingRunner> {
        engine_with_store(results, MemoryCredentialStore::new())
    }

    pub(crate) fn engine_with_store(
        results: Vec<CommandResult>,
        store: MemoryCredentialStore,
    ) -> TransferEngine<RecordingRunner> {
        TransferEngine::new(
            RecordingRunner::with_results(results),
            Arc::new(store),
            ToolSettings::default(),
        )
    }

    pub(crate) fn failed(stderr: &str) -> CommandResult {
        CommandResult {
            exit_code: 1,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn test_render_preview_text() {
        assert_eq!(render_preview(b"hello world", 5), "hello");
        assert_eq!(render_preview(b"hi", 100), "hi");
    }

    #[test]
    fn test_render_preview_binary() {
        let mut data = vec![0x7Fu8, b'E', b'L', b'F', 0, 1];
        data.extend(std::iter::repeat(0xAB).take(64));
        let rendered = render_preview(&data, 1000);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "Binary file");
        assert_eq!(lines[1], "Size: 70 bytes");
        assert!(lines[2].starts_with("Head: 7F 45 4C 46 00 01 AB"));
        assert_eq!(lines[2].trim_start_matches("Head: ").split(' ').count(), 32);
    }

    #[test]
    fn test_render_preview_nul_after_clip_is_text() {
        assert_eq!(render_preview(b"abc\0def", 3), "abc");
    }

    #[test]
    fn test_mkdir_rename_delete_use_remote_shell() {
        let engine = engine(vec![]);
        let p = profile(TransferBackend::Scp);
        engine.mkdir(&p, "/srv/new dir").unwrap();
        engine.rename(&p, "/srv/a", "/srv/it's").unwrap();
        engine.delete(&p, "/srv/old", true).unwrap();

        let calls = engine.runner().calls();
        assert_eq!(calls.len(), 3);
        for call in &calls {
            assert_eq!(call.program, "ssh");
            let port = call.args.iter().position(|a| a == "-p").unwrap();
            assert_eq!(call.args[port + 1], "2222");
            assert_eq!(call.args[port + 2], "alice@files.example.com");
        }
        assert_eq!(calls[0].args.last().unwrap(), "mkdir -p '/srv/new dir'");
        assert_eq!(calls[1].args.last().unwrap(), "mv '/srv/a' '/srv/it'\\''s'");
        assert_eq!(calls[2].args.last().unwrap(), "rm -rf '/srv/old'");
    }

    #[test]
    fn test_delete_refuses_root() {
        let engine = engine(vec![]);
        let p = profile(TransferBackend::Sftp);
        assert!(engine.delete(&p, "/", true).is_err());
        assert!(engine.runner().calls().is_empty());
    }

    #[test]
    fn test_remote_shell_failure_message() {
        let engine = engine(vec![failed("mkdir: cannot create directory: Permission denied")]);
        let p = profile(TransferBackend::Sftp);
        let err = engine.mkdir(&p, "/root/x").unwrap_err();
        assert_eq!(err.message, "mkdir: cannot create directory: Permission denied");

        let engine = super::tests::engine(vec![failed("")]);
        let err = engine.mkdir(&p, "/root/x").unwrap_err();
        assert_eq!(err.message, "Failed to create remote folder");
    }

    #[test]
    fn test_password_auth_requires_credential() {
        let mut p = profile(TransferBackend::Sftp);
        p.connection.auth_method = AuthMethod::Password;

        let engine = engine(vec![]);
        let err = engine.mkdir(&p, "/x").unwrap_err();
        assert_eq!(err.message, "Password for this host is missing in Keychain");
        assert!(engine.runner().calls().is_empty());

        let engine = engine_with_store(vec![], MemoryCredentialStore::with_secrets([("host-1", "pw")]));
        engine.mkdir(&p, "/x").unwrap();
        let calls = engine.runner().calls();
        assert_eq!(calls[0].credential(), Some("pw"));
        assert!(!calls[0].args.iter().any(|a| a.contains("pw")));
        assert!(!calls[0].env.iter().any(|(_, v)| v == "pw"));
    }

    #[test]
    fn test_missing_host_rejected_before_spawn() {
        let mut p = profile(TransferBackend::Scp);
        p.connection.host = String::new();
        let engine = engine(vec![]);
        assert_eq!(engine.list(&p, "/").unwrap_err().message, "Host or username is empty");
        assert!(engine.runner().calls().is_empty());
    }

    #[test]
    fn test_upload_missing_local_path() {
        let engine = engine(vec![]);
        let p = profile(TransferBackend::Sftp);
        let err = engine
            .upload(&p, Path::new("/nonexistent/sshdeck/file.txt"), "/srv")
            .unwrap_err();
        assert_eq!(err.message, "Local path does not exist");
    }

    #[test]
    fn test_preview_downloads_and_renders() {
        let p = profile(TransferBackend::Scp);
        let engine = engine(vec![]);
        // the fake runner never writes the file, so the preview is empty text
        assert_eq!(engine.preview(&p, "/etc/motd", 16).unwrap(), "");
        let calls = engine.runner().calls();
        assert_eq!(calls[0].program, "scp");
        assert!(calls[0].args.contains(&"alice@files.example.com:'/etc/motd'".to_string()));
    }
}
