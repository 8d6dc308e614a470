use crate::config::Profile;
use crate::error::{AppError, AppResult};
use crate::logging::LogBuffer;
use crate::transfer::paths::{file_name, join_remote_path, normalize_remote_path, parent_path};
use crate::transfer::{RemoteFileEntry, RemoteFiles, TransferOutcome};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

pub const MIN_REFRESH_SECONDS: i64 = 1;
pub const MAX_REFRESH_SECONDS: i64 = 60;

const NO_HOST: &str = "Select a host";

/// Auto-refresh period for a configured number of seconds, clamped to [1, 60]
pub fn clamp_refresh_interval(seconds: i32) -> Duration {
    let seconds = i64::from(seconds).clamp(MIN_REFRESH_SECONDS, MAX_REFRESH_SECONDS);
    Duration::from_secs(seconds as u64)
}

/// Mutating operations dispatched by the browser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileOperation {
    Upload,
    Download,
    CreateFolder,
    Rename,
    Delete,
}

impl FileOperation {
    fn title(self) -> &'static str {
        match self {
            FileOperation::Upload => "Upload",
            FileOperation::Download => "Download",
            FileOperation::CreateFolder => "Create folder",
            FileOperation::Rename => "Rename",
            FileOperation::Delete => "Delete",
        }
    }
}

/// What changed after applying worker results
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServiceEvent {
    Listed { path: String, count: usize },
    ListFailed { path: String, message: String },
    Previewed { path: String },
    PreviewFailed { path: String, message: String },
    Completed { operation: FileOperation, message: String },
    Failed { operation: FileOperation, message: String },
    /// A superseded result was dropped without touching state
    Discarded { path: String },
    Tick,
}

type Job = Box<dyn FnOnce() + Send + 'static>;

enum Completion {
    Listed {
        generation: u64,
        host_id: String,
        path: String,
        result: TransferOutcome<Vec<RemoteFileEntry>>,
    },
    Previewed {
        generation: u64,
        host_id: String,
        path: String,
        result: TransferOutcome<String>,
    },
    Operation {
        host_id: String,
        operation: FileOperation,
        subject: String,
        result: TransferOutcome<()>,
    },
    Tick {
        host_id: String,
    },
}

/// Repeating tick source; stops when dropped
struct RefreshTimer {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl RefreshTimer {
    fn start(
        interval: Duration,
        host_id: String,
        completions: mpsc::UnboundedSender<Completion>,
    ) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let thread = thread::Builder::new()
            .name("sshdeck-refresh".to_string())
            .spawn(move || loop {
                let deadline = Instant::now() + interval;
                // park_timeout may wake early, so wait out the full deadline
                loop {
                    if flag.load(Ordering::Acquire) {
                        return;
                    }
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    thread::park_timeout(deadline - now);
                }
                let tick = Completion::Tick {
                    host_id: host_id.clone(),
                };
                if completions.send(tick).is_err() {
                    return;
                }
            })?;

        Ok(Self {
            stop,
            thread: Some(thread),
        })
    }
}

impl Drop for RefreshTimer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            thread.thread().unpark();
        }
    }
}

/// Stateful controller behind a remote file browser.
///
/// Backend calls run one at a time on a dedicated worker thread. Results come
/// back through [`RemoteFileService::poll`], which applies them in completion
/// order and drops any listing or preview that a newer request, a path change
/// or a host switch has superseded. Nothing is killed on supersession; the
/// stale result is simply ignored.
pub struct RemoteFileService {
    backend: Arc<dyn RemoteFiles>,
    jobs: mpsc::UnboundedSender<Job>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions: mpsc::UnboundedReceiver<Completion>,
    timer: Option<RefreshTimer>,

    profile: Option<Profile>,
    path: String,
    entries: Vec<RemoteFileEntry>,
    selected: Option<String>,
    preview: String,
    status: String,

    list_generation: u64,
    preview_generation: u64,
    in_flight: usize,
    listings_in_flight: usize,

    auto_refresh: bool,
    live_preview: bool,
    interval: Duration,
    preview_max_bytes: usize,
    logs: LogBuffer,
}

impl RemoteFileService {
    pub fn new(
        backend: Arc<dyn RemoteFiles>,
        preview_max_bytes: usize,
        log_capacity: usize,
    ) -> AppResult<Self> {
        let (jobs, mut job_rx) = mpsc::unbounded_channel::<Job>();
        let (completions_tx, completions) = mpsc::unbounded_channel();

        thread::Builder::new()
            .name("sshdeck-files".to_string())
            .spawn(move || {
                while let Some(job) = job_rx.blocking_recv() {
                    job();
                }
                tracing::debug!("File worker stopped");
            })
            .map_err(|e| AppError::Process(format!("Failed to start file worker: {}", e)))?;

        Ok(Self {
            backend,
            jobs,
            completions_tx,
            completions,
            timer: None,
            profile: None,
            path: ".".to_string(),
            entries: Vec::new(),
            selected: None,
            preview: String::new(),
            status: NO_HOST.to_string(),
            list_generation: 0,
            preview_generation: 0,
            in_flight: 0,
            listings_in_flight: 0,
            auto_refresh: true,
            live_preview: true,
            interval: clamp_refresh_interval(3),
            preview_max_bytes,
            logs: LogBuffer::new(log_capacity),
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn entries(&self) -> &[RemoteFileEntry] {
        &self.entries
    }

    pub fn selected(&self) -> Option<&RemoteFileEntry> {
        let id = self.selected.as_deref()?;
        self.entries.iter().find(|e| e.id() == id)
    }

    pub fn preview(&self) -> &str {
        &self.preview
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn busy(&self) -> bool {
        self.in_flight > 0
    }

    pub fn auto_refresh(&self) -> bool {
        self.auto_refresh
    }

    pub fn live_preview(&self) -> bool {
        self.live_preview
    }

    pub fn refresh_interval(&self) -> Duration {
        self.interval
    }

    pub fn timer_running(&self) -> bool {
        self.timer.is_some()
    }

    /// Activity log lines, oldest first
    pub fn logs(&self) -> Vec<String> {
        self.logs.lines()
    }

    // =========================================================================
    // Host and navigation
    // =========================================================================

    /// Switch to another host (or none). In-flight results for the previous
    /// host are discarded when they arrive.
    pub fn activate(&mut self, profile: Option<Profile>) {
        self.list_generation += 1;
        self.preview_generation += 1;
        self.entries.clear();
        self.selected = None;
        self.preview.clear();

        let Some(profile) = profile else {
            self.profile = None;
            self.status = NO_HOST.to_string();
            self.timer = None;
            return;
        };

        let root = profile.file_transfer.remote_root_path.trim();
        self.path = if root.is_empty() { ".".to_string() } else { root.to_string() };
        self.live_preview = profile.file_transfer.live_preview;
        self.interval = clamp_refresh_interval(profile.file_transfer.auto_refresh_seconds);
        self.logs.info(format!(
            "Selected host {}, protocol {}",
            profile.name, profile.file_transfer.backend
        ));
        self.profile = Some(profile);

        self.restart_timer();
        self.refresh();
    }

    /// Dispatch a listing of the current path
    pub fn refresh(&mut self) -> bool {
        let Some(profile) = self.profile.clone() else {
            self.status = NO_HOST.to_string();
            return false;
        };

        self.path = normalize_remote_path(&self.path);
        self.list_generation += 1;
        let generation = self.list_generation;
        let path = self.path.clone();
        let backend = Arc::clone(&self.backend);
        let completions = self.completions_tx.clone();

        let dispatched = self.dispatch(move || {
            let result = backend.list(&profile, &path);
            let _ = completions.send(Completion::Listed {
                generation,
                host_id: profile.id,
                path,
                result,
            });
        });
        if dispatched {
            self.listings_in_flight += 1;
        }
        dispatched
    }

    pub fn set_path(&mut self, path: &str) -> bool {
        self.path = normalize_remote_path(path);
        self.clear_selection();
        self.refresh()
    }

    pub fn go_up(&mut self) -> bool {
        let parent = parent_path(&self.path);
        self.set_path(&parent)
    }

    /// Enter a directory or select and preview a file
    pub fn open(&mut self, full_path: &str) -> bool {
        let Some(entry) = self.entries.iter().find(|e| e.id() == full_path).cloned() else {
            return false;
        };
        if entry.is_directory {
            self.set_path(&entry.full_path)
        } else {
            self.selected = Some(entry.full_path);
            self.refresh_preview()
        }
    }

    /// Change the selection; unknown paths clear it
    pub fn select(&mut self, full_path: Option<&str>) {
        let entry = full_path.and_then(|p| self.entries.iter().find(|e| e.id() == p).cloned());
        match entry {
            Some(entry) => {
                self.selected = Some(entry.full_path);
                self.preview_generation += 1;
                self.preview.clear();
                if !entry.is_directory && self.live_preview {
                    self.refresh_preview();
                }
            }
            None => self.clear_selection(),
        }
    }

    /// Dispatch a preview of the selected file
    pub fn refresh_preview(&mut self) -> bool {
        let Some(profile) = self.profile.clone() else {
            return false;
        };
        let Some(entry) = self.selected().cloned() else {
            return false;
        };
        if entry.is_directory {
            return false;
        }

        self.preview_generation += 1;
        let generation = self.preview_generation;
        let max_bytes = self.preview_max_bytes;
        let backend = Arc::clone(&self.backend);
        let completions = self.completions_tx.clone();

        self.dispatch(move || {
            let result = backend.preview(&profile, &entry.full_path, max_bytes);
            let _ = completions.send(Completion::Previewed {
                generation,
                host_id: profile.id,
                path: entry.full_path,
                result,
            });
        })
    }

    // =========================================================================
    // Settings
    // =========================================================================

    pub fn set_auto_refresh(&mut self, enabled: bool) {
        self.auto_refresh = enabled;
        self.restart_timer();
        self.logs.info(if enabled {
            "Auto refresh enabled"
        } else {
            "Auto refresh disabled"
        });
    }

    /// Set the auto-refresh period in seconds (clamped to [1, 60])
    pub fn set_interval(&mut self, seconds: i32) {
        self.interval = clamp_refresh_interval(seconds);
        self.restart_timer();
    }

    pub fn set_live_preview(&mut self, enabled: bool) {
        self.live_preview = enabled;
        self.logs.info(if enabled {
            "Live preview enabled"
        } else {
            "Live preview disabled"
        });
        if enabled {
            self.refresh_preview();
        }
    }

    // =========================================================================
    // Transfers and remote edits
    // =========================================================================

    /// Upload a local file or folder into the current directory
    pub fn upload(&mut self, local_path: &Path) -> bool {
        let name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| local_path.display().to_string());
        let local = local_path.to_path_buf();
        let remote_directory = self.path.clone();
        self.run_operation(FileOperation::Upload, name, move |backend, profile| {
            backend.upload(profile, &local, &remote_directory)
        })
    }

    /// Download the selected entry to `local_path`
    pub fn download(&mut self, local_path: &Path) -> bool {
        let Some(entry) = self.selected().cloned() else {
            self.status = "Select a file to download".to_string();
            return false;
        };
        let local: PathBuf = local_path.to_path_buf();
        self.run_operation(FileOperation::Download, entry.name.clone(), move |backend, profile| {
            backend.download(profile, &entry.full_path, &local, entry.is_directory)
        })
    }

    /// Create a folder; relative names resolve against the current path
    pub fn mkdir(&mut self, name: &str) -> bool {
        let path = self.resolve(name);
        self.run_operation(FileOperation::CreateFolder, path.clone(), move |backend, profile| {
            backend.mkdir(profile, &path)
        })
    }

    pub fn rename(&mut self, from: &str, to: &str) -> bool {
        let from = self.resolve(from);
        let to = self.resolve(to);
        let subject = format!("{} -> {}", file_name(&from), file_name(&to));
        self.run_operation(FileOperation::Rename, subject, move |backend, profile| {
            backend.rename(profile, &from, &to)
        })
    }

    pub fn delete(&mut self, path: &str) -> bool {
        let path = self.resolve(path);
        let is_directory = self
            .entries
            .iter()
            .find(|e| e.full_path == path)
            .map(|e| e.is_directory)
            .unwrap_or(false);
        self.run_operation(FileOperation::Delete, path.clone(), move |backend, profile| {
            backend.delete(profile, &path, is_directory)
        })
    }

    // =========================================================================
    // Result delivery
    // =========================================================================

    /// Apply every completed result, in completion order
    pub fn poll(&mut self) -> Vec<ServiceEvent> {
        let mut events = Vec::new();
        loop {
            match self.completions.try_recv() {
                Ok(completion) => self.apply(completion, &mut events),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    tracing::warn!("File service completion channel closed");
                    break;
                }
            }
        }
        events
    }

    /// Poll until at least one event arrives or `timeout` passes
    pub fn wait(&mut self, timeout: Duration) -> Vec<ServiceEvent> {
        let deadline = Instant::now() + timeout;
        loop {
            let events = self.poll();
            if !events.is_empty() || Instant::now() >= deadline {
                return events;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    /// Poll until no job is in flight or `timeout` passes
    pub fn settle(&mut self, timeout: Duration) -> Vec<ServiceEvent> {
        let deadline = Instant::now() + timeout;
        let mut events = self.poll();
        while self.busy() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
            events.extend(self.poll());
        }
        events
    }

    fn apply(&mut self, completion: Completion, events: &mut Vec<ServiceEvent>) {
        match completion {
            Completion::Listed {
                generation,
                host_id,
                path,
                result,
            } => {
                self.finish_job();
                self.listings_in_flight = self.listings_in_flight.saturating_sub(1);
                if generation != self.list_generation
                    || !self.is_active_host(&host_id)
                    || path != self.path
                {
                    tracing::debug!("Discarding stale listing of {}", path);
                    events.push(ServiceEvent::Discarded { path });
                    return;
                }
                self.apply_listing(path, result, events);
            }
            Completion::Previewed {
                generation,
                host_id,
                path,
                result,
            } => {
                self.finish_job();
                if generation != self.preview_generation
                    || !self.is_active_host(&host_id)
                    || self.selected.as_deref() != Some(path.as_str())
                {
                    tracing::debug!("Discarding stale preview of {}", path);
                    events.push(ServiceEvent::Discarded { path });
                    return;
                }
                match result {
                    Ok(content) => {
                        self.preview = content;
                        events.push(ServiceEvent::Previewed { path });
                    }
                    Err(e) => {
                        self.preview = format!("Preview error: {}", e.message);
                        events.push(ServiceEvent::PreviewFailed {
                            path,
                            message: e.message,
                        });
                    }
                }
            }
            Completion::Operation {
                host_id,
                operation,
                subject,
                result,
            } => {
                self.finish_job();
                if !self.is_active_host(&host_id) {
                    events.push(ServiceEvent::Discarded { path: subject });
                    return;
                }
                match result {
                    Ok(()) => {
                        let message = format!("{} completed", operation.title());
                        self.status = message.clone();
                        self.logs.info(format!("{}: {}", message, subject));
                        events.push(ServiceEvent::Completed { operation, message });
                        self.refresh();
                    }
                    Err(e) => {
                        self.status = e.message.clone();
                        self.logs
                            .error(format!("{} failed: {}", operation.title(), e.message));
                        events.push(ServiceEvent::Failed {
                            operation,
                            message: e.message,
                        });
                    }
                }
            }
            Completion::Tick { host_id } => {
                if !self.auto_refresh || !self.is_active_host(&host_id) {
                    return;
                }
                events.push(ServiceEvent::Tick);
                // a slow listing still running absorbs the tick
                if self.listings_in_flight == 0 {
                    self.refresh();
                }
            }
        }
    }

    fn apply_listing(
        &mut self,
        path: String,
        result: TransferOutcome<Vec<RemoteFileEntry>>,
        events: &mut Vec<ServiceEvent>,
    ) {
        let entries = match result {
            Ok(entries) => entries,
            Err(e) => {
                // previous entries stay visible
                self.status = e.message.clone();
                self.logs.error(format!("List failed: {}", e.message));
                events.push(ServiceEvent::ListFailed {
                    path,
                    message: e.message,
                });
                return;
            }
        };

        let count = entries.len();
        self.entries = entries;
        self.status = format!("{} item(s) in {}", count, path);
        self.logs.info(format!("Listed {} item(s) in {}", count, path));

        let still_present = self
            .selected
            .as_deref()
            .map(|id| self.entries.iter().any(|e| e.id() == id))
            .unwrap_or(false);
        if !still_present {
            self.clear_selection();
        }

        events.push(ServiceEvent::Listed { path, count });

        if self.live_preview {
            self.refresh_preview();
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn dispatch(&mut self, job: impl FnOnce() + Send + 'static) -> bool {
        match self.jobs.send(Box::new(job)) {
            Ok(()) => {
                self.in_flight += 1;
                true
            }
            Err(_) => {
                self.status = "File worker is not running".to_string();
                tracing::error!("File worker queue closed");
                false
            }
        }
    }

    fn run_operation<F>(&mut self, operation: FileOperation, subject: String, work: F) -> bool
    where
        F: FnOnce(&dyn RemoteFiles, &Profile) -> TransferOutcome<()> + Send + 'static,
    {
        let Some(profile) = self.profile.clone() else {
            self.status = NO_HOST.to_string();
            return false;
        };

        self.status = format!("{} started: {}", operation.title(), subject);
        self.logs.info(self.status.clone());

        let backend = Arc::clone(&self.backend);
        let completions = self.completions_tx.clone();
        self.dispatch(move || {
            let result = work(backend.as_ref(), &profile);
            let _ = completions.send(Completion::Operation {
                host_id: profile.id,
                operation,
                subject,
                result,
            });
        })
    }

    fn restart_timer(&mut self) {
        self.timer = None;

        if !self.auto_refresh {
            return;
        }
        let Some(host_id) = self.profile.as_ref().map(|p| p.id.clone()) else {
            return;
        };

        match RefreshTimer::start(self.interval, host_id, self.completions_tx.clone()) {
            Ok(timer) => self.timer = Some(timer),
            Err(e) => self
                .logs
                .error(format!("Failed to start auto refresh: {}", e)),
        }
    }

    fn resolve(&self, name: &str) -> String {
        let name = name.trim();
        if name.starts_with('/') || name.starts_with('~') {
            name.to_string()
        } else {
            join_remote_path(&self.path, name)
        }
    }

    fn clear_selection(&mut self) {
        self.selected = None;
        self.preview_generation += 1;
        self.preview.clear();
    }

    fn finish_job(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    fn is_active_host(&self, host_id: &str) -> bool {
        self.profile.as_ref().map(|p| p.id == host_id).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssh::ConnectionConfig;
    use crate::transfer::TransferError;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    const WAIT: Duration = Duration::from_secs(5);

    fn entry(dir: &str, name: &str, is_directory: bool) -> RemoteFileEntry {
        RemoteFileEntry {
            name: name.to_string(),
            full_path: join_remote_path(dir, name),
            is_directory,
            size_text: "1".to_string(),
            modified_text: "Jan 1 00:00".to_string(),
        }
    }

    #[derive(Default)]
    struct FakeFiles {
        listings: Mutex<HashMap<String, Vec<RemoteFileEntry>>>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeFiles {
        fn with_listings(listings: Vec<(&str, Vec<RemoteFileEntry>)>) -> Arc<Self> {
            let fake = Self::default();
            *fake.listings.lock() = listings
                .into_iter()
                .map(|(path, entries)| (path.to_string(), entries))
                .collect();
            Arc::new(fake)
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().push(call);
        }
    }

    impl RemoteFiles for FakeFiles {
        fn list(&self, profile: &Profile, path: &str) -> TransferOutcome<Vec<RemoteFileEntry>> {
            self.record(format!("list {} {}", profile.id, path));
            self.listings
                .lock()
                .get(path)
                .cloned()
                .ok_or_else(|| TransferError::new("No such directory"))
        }

        fn preview(&self, _profile: &Profile, remote_path: &str, _max: usize) -> TransferOutcome<String> {
            self.record(format!("preview {}", remote_path));
            Ok(format!("contents of {}", remote_path))
        }

        fn upload(&self, _profile: &Profile, local: &Path, dir: &str) -> TransferOutcome<()> {
            self.record(format!("upload {} {}", local.display(), dir));
            Ok(())
        }

        fn download(&self, _profile: &Profile, remote: &str, _local: &Path, dir: bool) -> TransferOutcome<()> {
            self.record(format!("download {} {}", remote, dir));
            Ok(())
        }

        fn mkdir(&self, _profile: &Profile, path: &str) -> TransferOutcome<()> {
            self.record(format!("mkdir {}", path));
            Ok(())
        }

        fn rename(&self, _profile: &Profile, from: &str, to: &str) -> TransferOutcome<()> {
            self.record(format!("rename {} {}", from, to));
            Ok(())
        }

        fn delete(&self, _profile: &Profile, path: &str, dir: bool) -> TransferOutcome<()> {
            self.record(format!("delete {} {}", path, dir));
            if path == "/srv/locked" {
                return Err(TransferError::new("Permission denied"));
            }
            Ok(())
        }
    }

    fn host(id: &str, root: &str) -> Profile {
        let mut profile = Profile::new(id, ConnectionConfig::new("files.example.com", "alice"));
        profile.id = id.to_string();
        profile.file_transfer.remote_root_path = root.to_string();
        profile.file_transfer.auto_refresh_seconds = 60;
        profile
    }

    fn service(fake: &Arc<FakeFiles>) -> RemoteFileService {
        let backend: Arc<dyn RemoteFiles> = fake.clone();
        RemoteFileService::new(backend, 1024, 50).unwrap()
    }

    fn srv_listing() -> Vec<RemoteFileEntry> {
        vec![
            entry("/srv", "logs", true),
            entry("/srv", "a.txt", false),
            entry("/srv", "locked", false),
        ]
    }

    #[test]
    fn test_clamp_refresh_interval() {
        assert_eq!(clamp_refresh_interval(0), Duration::from_secs(1));
        assert_eq!(clamp_refresh_interval(-5), Duration::from_secs(1));
        assert_eq!(clamp_refresh_interval(3), Duration::from_secs(3));
        assert_eq!(clamp_refresh_interval(600), Duration::from_secs(60));
    }

    #[test]
    fn test_no_host_selected() {
        let fake = FakeFiles::with_listings(vec![]);
        let mut service = service(&fake);
        assert!(!service.refresh());
        assert_eq!(service.status(), "Select a host");
        assert!(!service.mkdir("x"));
        assert!(fake.calls().is_empty());
    }

    #[test]
    fn test_activate_lists_root() {
        let fake = FakeFiles::with_listings(vec![("/srv", srv_listing())]);
        let mut service = service(&fake);
        service.activate(Some(host("h1", "/srv")));
        assert!(service.busy());

        let events = service.settle(WAIT);
        assert_eq!(
            events,
            vec![ServiceEvent::Listed {
                path: "/srv".to_string(),
                count: 3
            }]
        );
        assert!(!service.busy());
        assert_eq!(service.entries().len(), 3);
        assert_eq!(service.status(), "3 item(s) in /srv");
        assert!(service.timer_running());
        assert!(service.logs().iter().any(|l| l.ends_with("Listed 3 item(s) in /srv")));
    }

    #[test]
    fn test_stale_listing_is_discarded() {
        let fake = FakeFiles::with_listings(vec![
            ("/x", vec![entry("/x", "old.txt", false)]),
            ("/y", vec![entry("/y", "new.txt", false), entry("/y", "b", true)]),
        ]);
        let mut service = service(&fake);
        service.activate(Some(host("h1", "/x")));
        service.set_path("/y");

        let events = service.settle(WAIT);
        assert_eq!(
            events,
            vec![
                ServiceEvent::Discarded {
                    path: "/x".to_string()
                },
                ServiceEvent::Listed {
                    path: "/y".to_string(),
                    count: 2
                },
            ]
        );
        assert_eq!(service.path(), "/y");
        assert!(service.entries().iter().all(|e| e.full_path.starts_with("/y/")));
    }

    #[test]
    fn test_host_switch_discards_previous_host() {
        let fake = FakeFiles::with_listings(vec![
            ("/srv", srv_listing()),
            ("/data", vec![entry("/data", "d.csv", false)]),
        ]);
        let mut service = service(&fake);
        service.activate(Some(host("h1", "/srv")));
        service.activate(Some(host("h2", "/data")));

        let events = service.settle(WAIT);
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], ServiceEvent::Discarded { path } if path == "/srv"));
        assert_eq!(service.profile().map(|p| p.id.as_str()), Some("h2"));
        assert_eq!(service.entries().len(), 1);
        assert_eq!(fake.calls(), vec!["list h1 /srv", "list h2 /data"]);
    }

    #[test]
    fn test_failed_listing_keeps_entries() {
        let fake = FakeFiles::with_listings(vec![("/srv", srv_listing())]);
        let mut service = service(&fake);
        service.activate(Some(host("h1", "/srv")));
        service.settle(WAIT);

        service.set_path("/missing");
        let events = service.settle(WAIT);
        assert!(matches!(&events[0], ServiceEvent::ListFailed { message, .. } if message == "No such directory"));
        assert_eq!(service.entries().len(), 3);
        assert_eq!(service.status(), "No such directory");
    }

    #[test]
    fn test_open_file_previews_and_directory_navigates() {
        let fake = FakeFiles::with_listings(vec![
            ("/srv", srv_listing()),
            ("/srv/logs", vec![entry("/srv/logs", "app.log", false)]),
        ]);
        let mut service = service(&fake);
        service.activate(Some(host("h1", "/srv")));
        service.settle(WAIT);

        assert!(service.open("/srv/a.txt"));
        service.settle(WAIT);
        assert_eq!(service.preview(), "contents of /srv/a.txt");

        assert!(service.open("/srv/logs"));
        service.settle(WAIT);
        assert_eq!(service.path(), "/srv/logs");
        assert!(service.selected().is_none());
        assert_eq!(service.preview(), "");

        assert!(service.go_up());
        service.settle(WAIT);
        assert_eq!(service.path(), "/srv");
        assert!(!service.open("/srv/nope"));
    }

    #[test]
    fn test_selection_survives_refresh_only_if_present() {
        let fake = FakeFiles::with_listings(vec![("/srv", srv_listing())]);
        let mut service = service(&fake);
        service.activate(Some(host("h1", "/srv")));
        service.set_live_preview(false);
        service.settle(WAIT);

        service.select(Some("/srv/a.txt"));
        service.refresh();
        service.settle(WAIT);
        assert_eq!(service.selected().map(|e| e.name.as_str()), Some("a.txt"));

        fake.listings
            .lock()
            .insert("/srv".to_string(), vec![entry("/srv", "logs", true)]);
        service.refresh();
        service.settle(WAIT);
        assert!(service.selected().is_none());
    }

    #[test]
    fn test_stale_preview_is_discarded() {
        let fake = FakeFiles::with_listings(vec![("/srv", srv_listing())]);
        let mut service = service(&fake);
        service.activate(Some(host("h1", "/srv")));
        service.settle(WAIT);

        service.select(Some("/srv/a.txt"));
        service.select(Some("/srv/locked"));
        let events = service.settle(WAIT);
        assert!(events.contains(&ServiceEvent::Discarded {
            path: "/srv/a.txt".to_string()
        }));
        assert_eq!(service.preview(), "contents of /srv/locked");
    }

    #[test]
    fn test_operations_refresh_on_success() {
        let fake = FakeFiles::with_listings(vec![("/srv", srv_listing())]);
        let mut service = service(&fake);
        service.activate(Some(host("h1", "/srv")));
        service.settle(WAIT);

        assert!(service.mkdir("new"));
        let events = service.settle(WAIT);
        assert!(matches!(
            &events[0],
            ServiceEvent::Completed { operation: FileOperation::CreateFolder, .. }
        ));
        assert!(matches!(&events[1], ServiceEvent::Listed { .. }));

        service.rename("a.txt", "b.txt");
        service.settle(WAIT);
        service.delete("logs");
        service.settle(WAIT);
        service.upload(Path::new("/tmp/report.pdf"));
        service.settle(WAIT);

        let calls = fake.calls();
        assert!(calls.contains(&"mkdir /srv/new".to_string()));
        assert!(calls.contains(&"rename /srv/a.txt /srv/b.txt".to_string()));
        assert!(calls.contains(&"delete /srv/logs true".to_string()));
        assert!(calls.contains(&"upload /tmp/report.pdf /srv".to_string()));
        assert_eq!(calls.iter().filter(|c| c.starts_with("list")).count(), 5);
    }

    #[test]
    fn test_failed_operation_reports_message() {
        let fake = FakeFiles::with_listings(vec![("/srv", srv_listing())]);
        let mut service = service(&fake);
        service.activate(Some(host("h1", "/srv")));
        service.settle(WAIT);

        service.delete("/srv/locked");
        let events = service.settle(WAIT);
        assert_eq!(
            events,
            vec![ServiceEvent::Failed {
                operation: FileOperation::Delete,
                message: "Permission denied".to_string()
            }]
        );
        assert_eq!(service.status(), "Permission denied");
        assert!(service.logs().iter().any(|l| l.ends_with("Delete failed: Permission denied")));
    }

    #[test]
    fn test_download_requires_selection() {
        let fake = FakeFiles::with_listings(vec![("/srv", srv_listing())]);
        let mut service = service(&fake);
        service.activate(Some(host("h1", "/srv")));
        service.settle(WAIT);

        assert!(!service.download(Path::new("/tmp/out")));
        assert_eq!(service.status(), "Select a file to download");

        service.select(Some("/srv/logs"));
        assert!(service.download(Path::new("/tmp/out")));
        service.settle(WAIT);
        assert!(fake.calls().contains(&"download /srv/logs true".to_string()));
    }

    #[test]
    fn test_timer_ticks_trigger_listing() {
        let fake = FakeFiles::with_listings(vec![("/srv", srv_listing())]);
        let mut service = service(&fake);
        service.activate(Some(host("h1", "/srv")));
        service.set_interval(0);
        assert_eq!(service.refresh_interval(), Duration::from_secs(1));
        service.settle(WAIT);

        let deadline = Instant::now() + WAIT;
        let mut ticked = false;
        while !ticked && Instant::now() < deadline {
            ticked = service.wait(WAIT).contains(&ServiceEvent::Tick);
        }
        assert!(ticked);
        service.settle(WAIT);
        assert!(fake.calls().iter().filter(|c| c.starts_with("list")).count() >= 2);
    }

    #[test]
    fn test_disable_auto_refresh_stops_timer() {
        let fake = FakeFiles::with_listings(vec![("/srv", srv_listing())]);
        let mut service = service(&fake);
        service.activate(Some(host("h1", "/srv")));
        assert!(service.timer_running());

        service.set_auto_refresh(false);
        assert!(!service.timer_running());
        service.set_auto_refresh(true);
        assert!(service.timer_running());

        service.activate(None);
        assert!(!service.timer_running());
        assert_eq!(service.status(), "Select a host");
    }

    #[test]
    fn test_host_switch_keeps_auto_refresh_choice() {
        let fake = FakeFiles::with_listings(vec![("/srv", srv_listing()), ("/data", vec![])]);
        let mut service = service(&fake);
        service.activate(Some(host("h1", "/srv")));
        service.set_auto_refresh(false);

        service.activate(Some(host("h2", "/data")));
        assert!(!service.auto_refresh());
        assert!(!service.timer_running());

        service.set_auto_refresh(true);
        service.activate(Some(host("h1", "/srv")));
        assert!(service.timer_running());
    }
}
