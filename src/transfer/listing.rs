//! Turns `ls -la`, Windows FTP and bare-name listings into [`RemoteFileEntry`] values.

use super::paths::join_remote_path;
use super::RemoteFileEntry;
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;

/// `01-02-23  03:04PM  <DIR>  Logs` / `01-02-23  03:04PM  1234  a.txt`
static WINDOWS_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{2}-\d{2}-\d{2}\s+\d{2}:\d{2}[AP]M\s+(<DIR>|\d+)\s+(.+)$").unwrap()
});

const NOISE_PREFIXES: &[&str] = &["sftp>", "Connected to", "spawn ", "total "];

/// Size text used for directories and unknown sizes
const NO_SIZE: &str = "-";

/// Parse a long-format listing of `current_path`.
///
/// Never fails: lines matching neither grammar are dropped.
pub fn parse_listing(raw: &str, current_path: &str) -> Vec<RemoteFileEntry> {
    let mut entries: Vec<RemoteFileEntry> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !is_noise(line))
        .filter_map(|line| {
            parse_unix_line(line, current_path).or_else(|| parse_windows_line(line, current_path))
        })
        .filter(|entry| is_listable(&entry.name))
        .collect();
    sort_entries(&mut entries);
    entries
}

/// Parse a name-only listing: one name per line, trailing `/` marks a directory.
pub fn parse_name_only(raw: &str, current_path: &str) -> Vec<RemoteFileEntry> {
    let mut entries: Vec<RemoteFileEntry> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !is_noise(line))
        .filter_map(|line| {
            let (name, is_directory) = match line.strip_suffix('/') {
                Some(name) => (name, true),
                None => (line, false),
            };
            if !is_listable(name) {
                return None;
            }
            Some(entry(current_path, name, is_directory, NO_SIZE, ""))
        })
        .collect();
    sort_entries(&mut entries);
    entries
}

/// Directories first, then case-insensitive name order
pub fn sort_entries(entries: &mut [RemoteFileEntry]) {
    entries.sort_by(compare_entries);
}

fn compare_entries(a: &RemoteFileEntry, b: &RemoteFileEntry) -> Ordering {
    b.is_directory
        .cmp(&a.is_directory)
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        .then_with(|| a.name.cmp(&b.name))
}

fn is_noise(line: &str) -> bool {
    NOISE_PREFIXES.iter().any(|prefix| line.starts_with(prefix))
}

fn is_listable(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".."
}

fn entry(
    current_path: &str,
    name: &str,
    is_directory: bool,
    size_text: &str,
    modified_text: &str,
) -> RemoteFileEntry {
    RemoteFileEntry {
        name: name.to_string(),
        full_path: join_remote_path(current_path, name),
        is_directory,
        size_text: size_text.to_string(),
        modified_text: modified_text.to_string(),
    }
}

fn parse_unix_line(line: &str, current_path: &str) -> Option<RemoteFileEntry> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 9 {
        return None;
    }

    let kind = fields[0].chars().next()?;
    if !matches!(kind, 'd' | '-' | 'l') {
        return None;
    }

    let joined = fields[8..].join(" ");
    // symlinks list as `name -> target`
    let name = match joined.find(" -> ") {
        Some(index) => &joined[..index],
        None => joined.as_str(),
    };

    Some(entry(
        current_path,
        name,
        kind == 'd',
        fields[4],
        &fields[5..8].join(" "),
    ))
}

fn parse_windows_line(line: &str, current_path: &str) -> Option<RemoteFileEntry> {
    let captures = WINDOWS_LINE.captures(line)?;
    let marker = captures.get(1)?.as_str();
    let name = captures.get(2)?.as_str().trim();

    let is_directory = marker == "<DIR>";
    let size = if is_directory { NO_SIZE } else { marker };
    Some(entry(current_path, name, is_directory, size, ""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(entries: &[RemoteFileEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn test_unix_directory_line() {
        let entries = parse_listing("drwxr-xr-x 2 u g 4096 Jan 1 00:00 sub", "/home");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "sub");
        assert!(entries[0].is_directory);
        assert_eq!(entries[0].full_path, "/home/sub");
        assert_eq!(entries[0].size_text, "4096");
        assert_eq!(entries[0].modified_text, "Jan 1 00:00");
    }

    #[test]
    fn test_unix_symlink_and_spaces() {
        let raw = "lrwxrwxrwx 1 u g 11 Mar 3 2023 current -> releases/42\n\
                   -rw-r--r-- 1 u g 10 Mar 3 12:00 my notes.txt";
        let entries = parse_listing(raw, "/srv");
        assert_eq!(names(&entries), vec!["current", "my notes.txt"]);
        assert!(!entries[0].is_directory);
        assert_eq!(entries[1].full_path, "/srv/my notes.txt");
    }

    #[test]
    fn test_sftp_session_noise_dropped() {
        let raw = "Connected to example.com.\n\
                   sftp> cd \"/var\"\n\
                   sftp> ls -la\n\
                   total 12\n\
                   drwxr-xr-x 3 root root 4096 Jan 1 00:00 .\n\
                   drwxr-xr-x 20 root root 4096 Jan 1 00:00 ..\n\
                   drwxr-xr-x 2 root root 4096 Jan 1 00:00 log\n\
                   Permission denied\n";
        let entries = parse_listing(raw, "/var");
        assert_eq!(names(&entries), vec!["log"]);
    }

    #[test]
    fn test_windows_lines() {
        let raw = "01-02-23 03:04PM <DIR> Logs\n01-02-23  11:30AM   1234 report final.txt";
        let entries = parse_listing(raw, "/");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "Logs");
        assert!(entries[0].is_directory);
        assert_eq!(entries[0].size_text, "-");
        assert_eq!(entries[0].full_path, "/Logs");
        assert_eq!(entries[1].name, "report final.txt");
        assert_eq!(entries[1].size_text, "1234");
        assert!(!entries[1].is_directory);
    }

    #[test]
    fn test_name_only_fallback() {
        let entries = parse_name_only("a.txt\nsub/\n", ".");
        assert_eq!(names(&entries), vec!["sub", "a.txt"]);
        assert!(entries[0].is_directory);
        assert_eq!(entries[0].full_path, "./sub");
        assert_eq!(entries[1].size_text, "-");
    }

    #[test]
    fn test_name_only_drops_dot_entries() {
        let entries = parse_name_only(".\n..\n./\nfile", "/x");
        assert_eq!(names(&entries), vec!["file"]);
    }

    #[test]
    fn test_long_format_ignores_bare_names() {
        assert!(parse_listing("a.txt\nsub/", ".").is_empty());
    }

    #[test]
    fn test_sort_order() {
        let mut entries = vec![
            entry(".", "b.txt", false, "1", ""),
            entry(".", "A", true, "-", ""),
            entry(".", "a.txt", false, "1", ""),
        ];
        sort_entries(&mut entries);
        assert_eq!(names(&entries), vec!["A", "a.txt", "b.txt"]);
    }

    #[test]
    fn test_sort_dirs_first_case_insensitive() {
        let raw = "-rw-r--r-- 1 u g 1 Jan 1 00:00 Zeta\n\
                   drwxr-xr-x 2 u g 1 Jan 1 00:00 beta\n\
                   -rw-r--r-- 1 u g 1 Jan 1 00:00 alpha\n\
                   drwxr-xr-x 2 u g 1 Jan 1 00:00 Alpha";
        let entries = parse_listing(raw, ".");
        assert_eq!(names(&entries), vec!["Alpha", "beta", "alpha", "Zeta"]);
        let first_file = entries.iter().position(|e| !e.is_directory).unwrap();
        assert!(entries[first_file..].iter().all(|e| !e.is_directory));
    }

    #[test]
    fn test_unparseable_input_is_empty() {
        assert!(parse_listing("", "/").is_empty());
        assert!(parse_listing("garbage line here\n???", "/").is_empty());
    }
}
