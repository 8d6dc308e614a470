//! Escaping helpers shared by the argument builders and transfer strategies.

/// Quote a value for a POSIX shell.
///
/// The result is always a single word: `'...'` with every embedded `'`
/// written as `'\''`.
pub fn shell_quote(value: &str) -> String {
    if value.is_empty() {
        return "''".to_string();
    }
    format!("'{}'", value.replace('\'', "'\\''"))
}

/// Quote every element and join with spaces.
pub fn shell_join<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    parts
        .into_iter()
        .map(|p| shell_quote(p.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Double-quote a path for an `sftp -b` batch line.
pub fn sftp_quote(value: &str) -> String {
    format!("\"{}\"", escape_backslash_and_quote(value))
}

/// Double-quote a `.netrc` login/password token.
pub fn netrc_token(value: &str) -> String {
    format!("\"{}\"", escape_backslash_and_quote(value))
}

fn escape_backslash_and_quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Percent-encode one URL path segment.
///
/// Only RFC 3986 unreserved characters pass through, so `/` is encoded too;
/// segments are joined by the caller.
pub fn encode_path_segment(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal POSIX word reader: enough to undo `shell_quote`.
    fn shell_unquote(word: &str) -> String {
        let mut out = String::new();
        let mut in_single = false;
        let mut chars = word.chars();
        while let Some(c) = chars.next() {
            match c {
                '\'' => in_single = !in_single,
                '\\' if !in_single => {
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                }
                _ => out.push(c),
            }
        }
        out
    }

    #[test]
    fn test_shell_quote_empty() {
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn test_shell_quote_single_quote_round_trip() {
        for original in ["it's", "'", "a'b'c", "plain", "sp ace", "$(rm -rf /)", "''"] {
            let quoted = shell_quote(original);
            assert_eq!(shell_unquote(&quoted), original, "quoted form: {}", quoted);
        }
    }

    #[test]
    fn test_shell_join() {
        assert_eq!(shell_join(["ssh", "-p", "22", "a b"]), "'ssh' '-p' '22' 'a b'");
    }

    #[test]
    fn test_sftp_quote_escapes() {
        assert_eq!(sftp_quote(r#"my "dir"\x"#), r#""my \"dir\"\\x""#);
    }

    #[test]
    fn test_netrc_token() {
        assert_eq!(netrc_token("p\"w"), "\"p\\\"w\"");
    }

    #[test]
    fn test_encode_path_segment() {
        assert_eq!(encode_path_segment("my file#1.txt"), "my%20file%231.txt");
        assert_eq!(encode_path_segment("a/b"), "a%2Fb");
        assert_eq!(encode_path_segment("ok-_.~"), "ok-_.~");
        assert_eq!(encode_path_segment("a+b&c"), "a%2Bb%26c");
        assert_eq!(encode_path_segment("ü"), "%C3%BC");
    }
}
