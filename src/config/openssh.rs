//! Import and export of OpenSSH client config (`~/.ssh/config`) text.
//!
//! Decoding understands `Host` blocks only: directives before the first
//! `Host`, inside `Match` blocks, or under wildcard-only `Host` lines are
//! skipped, and `Include` is ignored. The first occurrence of a scalar
//! directive wins, as in ssh itself.

use super::Profile;
use crate::error::{AppError, AppResult};
use crate::ssh::{
    clamp_port, non_empty_lines, proxy_command, AddressFamily, AuthMethod, ConnectionConfig,
    LogVerbosity, ProxyType, RequestTty, SessionOptions, StrictHostKeyChecking,
};
use std::collections::{HashMap, HashSet};

const GENERATED_HEADER: &str = "# Generated by sshdeck";
const NAME_COMMENT: &str = "# Name:";
const INDENT: &str = "    ";

// =============================================================================
// Tokenizer
// =============================================================================

/// Cut a `#` comment that starts outside quotes
fn strip_comment(line: &str) -> &str {
    let mut in_single = false;
    let mut in_double = false;
    let mut escaped = false;
    for (index, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if !in_single => escaped = true,
            '"' if !in_single => in_double = !in_double,
            '\'' if !in_double => in_single = !in_single,
            '#' if !in_single && !in_double => return &line[..index],
            _ => {}
        }
    }
    line
}

/// Split a value into words, honouring single/double quotes and `\` escapes
/// of `\`, `"`, `'` and space outside single quotes.
fn split_words(value: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut in_single = false;
    let mut in_double = false;
    let mut chars = value.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if !in_single && matches!(chars.peek(), Some('\\' | '"' | '\'' | ' ')) => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
                in_word = true;
            }
            '"' if !in_single => {
                in_double = !in_double;
                in_word = true;
            }
            '\'' if !in_double => {
                in_single = !in_single;
                in_word = true;
            }
            c if c.is_whitespace() && !in_single && !in_double => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if in_word {
        words.push(current);
    }
    words
}

/// `Key Value`, `Key=Value` or `Key = Value`; keyword is lower-cased
fn split_directive(line: &str) -> Option<(String, &str)> {
    let end = line
        .find(|c: char| c.is_whitespace() || c == '=')
        .unwrap_or(line.len());
    let keyword = &line[..end];
    if keyword.is_empty() {
        return None;
    }
    let rest = line[end..].trim_start();
    let rest = rest.strip_prefix('=').unwrap_or(rest).trim_start();
    Some((keyword.to_ascii_lowercase(), rest))
}

// =============================================================================
// Decode
// =============================================================================

#[derive(Debug, Clone)]
struct Directive {
    words: Vec<String>,
    /// Rest of the line with the comment removed, for command-valued directives
    raw: String,
}

#[derive(Debug, Default)]
struct HostBlock {
    aliases: Vec<String>,
    display_name: Option<String>,
    directives: HashMap<String, Vec<Directive>>,
}

impl HostBlock {
    fn first(&self, key: &str) -> Option<&Directive> {
        self.directives.get(key).and_then(|values| values.first())
    }

    /// First directive's words joined by a space
    fn value(&self, key: &str) -> Option<String> {
        self.first(key)
            .map(|d| d.words.join(" "))
            .filter(|v| !v.is_empty())
    }

    fn raw(&self, key: &str) -> Option<String> {
        self.first(key)
            .map(|d| unquote_whole(d.raw.trim()))
            .filter(|v| !v.is_empty())
    }

    fn flag(&self, key: &str) -> Option<bool> {
        self.value(key).and_then(|v| parse_bool(&v))
    }

    fn number(&self, key: &str) -> Option<i32> {
        self.value(key).and_then(|v| v.parse().ok())
    }

    /// Every word of every occurrence
    fn all_words(&self, key: &str) -> Vec<String> {
        self.directives
            .get(key)
            .map(|values| values.iter().flat_map(|d| d.words.clone()).collect())
            .unwrap_or_default()
    }

    fn forwards(&self, key: &str) -> String {
        self.directives
            .get(key)
            .map(|values| {
                values
                    .iter()
                    .filter(|d| !d.words.is_empty())
                    .map(|d| d.words.join(":"))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default()
    }
}

/// A value written as one quoted word loses its quotes and escapes;
/// anything else is kept verbatim.
fn unquote_whole(value: &str) -> String {
    if value.starts_with(['"', '\'']) {
        if let [word] = split_words(value).as_slice() {
            return word.clone();
        }
    }
    value.to_string()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "yes" | "true" | "on" => Some(true),
        "no" | "false" | "off" => Some(false),
        _ => None,
    }
}

fn is_concrete_alias(alias: &str) -> bool {
    !alias.is_empty() && !alias.contains(['*', '?']) && !alias.starts_with('!')
}

fn parse_blocks(text: &str) -> Vec<HostBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<HostBlock> = None;

    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(name) = trimmed.strip_prefix(NAME_COMMENT) {
            if let Some(block) = current.as_mut() {
                let name = name.trim();
                if !name.is_empty() {
                    block.display_name = Some(name.to_string());
                }
            }
            continue;
        }

        let line = strip_comment(trimmed).trim();
        let Some((keyword, rest)) = split_directive(line) else {
            continue;
        };

        match keyword.as_str() {
            "host" => {
                blocks.extend(current.take());
                let aliases: Vec<String> = split_words(rest)
                    .into_iter()
                    .filter(|alias| is_concrete_alias(alias))
                    .collect();
                if !aliases.is_empty() {
                    current = Some(HostBlock {
                        aliases,
                        ..HostBlock::default()
                    });
                }
            }
            "match" => blocks.extend(current.take()),
            "include" => {}
            _ => {
                if let Some(block) = current.as_mut() {
                    block.directives.entry(keyword).or_default().push(Directive {
                        words: split_words(rest),
                        raw: rest.to_string(),
                    });
                }
            }
        }
    }
    blocks.extend(current);
    blocks
}

fn infer_auth(block: &HostBlock, connection: &mut ConnectionConfig) {
    if let Some(identity) = block.value("identityfile") {
        connection.auth_method = AuthMethod::Key;
        connection.key_path = identity;
        return;
    }

    let password = block.flag("passwordauthentication") == Some(true);
    let pubkey_off = block.flag("pubkeyauthentication") == Some(false);
    if password && pubkey_off {
        connection.auth_method = AuthMethod::Password;
        connection.key_path = String::new();
    } else {
        connection.auth_method = AuthMethod::Key;
    }
}

fn apply_options(block: &HostBlock, options: &mut SessionOptions) {
    if let Some(mode) = block
        .value("stricthostkeychecking")
        .and_then(|v| StrictHostKeyChecking::from_config_value(&v))
    {
        options.strict_host_key_checking = mode;
    }
    if let Some(mode) = block.value("requesttty").and_then(|v| RequestTty::from_config_value(&v)) {
        options.request_tty = mode;
    }
    if let Some(family) = block
        .value("addressfamily")
        .and_then(|v| AddressFamily::from_config_value(&v))
    {
        options.address_family = family;
    }
    if let Some(timeout) = block.number("connecttimeout") {
        options.connect_timeout_seconds = timeout.max(0);
    }
    if let Some(interval) = block.number("serveraliveinterval") {
        options.keepalive_interval_seconds = interval.max(0);
    }
    if let Some(count) = block.number("serveralivecountmax") {
        options.keepalive_count_max = count.max(1);
    }

    let text = |key: &str| block.value(key).unwrap_or_default();
    options.user_known_hosts_file = text("userknownhostsfile");
    options.bind_address = text("bindaddress");
    options.kex_algorithms = text("kexalgorithms");
    options.ciphers = text("ciphers");
    options.macs = text("macs");
    options.host_key_algorithms = text("hostkeyalgorithms");
    options.rekey_limit = text("rekeylimit");
    options.remote_command = block.raw("remotecommand").unwrap_or_default();

    if let Some(command) = block.raw("proxycommand") {
        if !command.eq_ignore_ascii_case("none") {
            options.proxy_type = ProxyType::Command;
            options.proxy_command = command;
        }
    }

    if let Some(level) = block.value("loglevel") {
        options.log_verbosity = LogVerbosity::from_log_level(&level);
        options.logging_enabled = options.log_verbosity != LogVerbosity::None;
    }

    let flags: [(&str, &mut bool); 9] = [
        ("forwardagent", &mut options.forward_agent),
        ("tcpkeepalive", &mut options.tcp_keepalive),
        ("pubkeyauthentication", &mut options.enable_pubkey_auth),
        ("passwordauthentication", &mut options.enable_password_auth),
        ("gssapiauthentication", &mut options.enable_gssapi_auth),
        ("gssapidelegatecredentials", &mut options.gssapi_delegate_credentials),
        ("compression", &mut options.compression),
        ("forwardx11", &mut options.x11_forwarding),
        ("kbdinteractiveauthentication", &mut options.enable_kbd_interactive_auth),
    ];
    for (key, target) in flags {
        if let Some(value) = block.flag(key) {
            *target = value;
        }
    }
    if block.first("kbdinteractiveauthentication").is_none() {
        if let Some(value) = block.flag("challengeresponseauthentication") {
            options.enable_kbd_interactive_auth = value;
        }
    }

    if block
        .value("sessiontype")
        .is_some_and(|v| v.eq_ignore_ascii_case("none"))
    {
        options.no_shell = true;
    }

    options.send_env = block.all_words("sendenv").join("\n");
    options.set_env = block.all_words("setenv").join("\n");
    options.local_forwards = block.forwards("localforward");
    options.remote_forwards = block.forwards("remoteforward");
    options.dynamic_forwards = block.forwards("dynamicforward");
}

fn build_profiles(block: &HostBlock) -> Vec<Profile> {
    block
        .aliases
        .iter()
        .map(|alias| {
            let mut connection = ConnectionConfig::new(
                block.value("hostname").unwrap_or_else(|| alias.clone()),
                block.value("user").unwrap_or_default(),
            );
            connection.port = block
                .value("port")
                .and_then(|p| p.parse::<i64>().ok())
                .map(|p| i32::from(clamp_port(p)))
                .unwrap_or(22);
            infer_auth(block, &mut connection);
            apply_options(block, &mut connection.options);

            let name = match (&block.display_name, block.aliases.len()) {
                (Some(name), 1) => name.clone(),
                _ => alias.clone(),
            };
            Profile::new(name, connection)
        })
        .collect()
}

/// Parse OpenSSH config text into profiles, one per concrete alias.
pub fn decode(text: &str) -> AppResult<Vec<Profile>> {
    let profiles: Vec<Profile> = parse_blocks(text).iter().flat_map(build_profiles).collect();
    if profiles.is_empty() {
        return Err(AppError::EmptyConfig);
    }
    tracing::info!("Decoded {} hosts from OpenSSH config", profiles.len());
    Ok(profiles)
}

// =============================================================================
// Encode
// =============================================================================

fn quote_if_needed(value: &str) -> String {
    if !value.contains(|c: char| c.is_whitespace() || c == '#' || c == '"') {
        return value.to_string();
    }
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

/// Lower-cased alias made of `[a-z0-9._-]` runs joined by `-`
fn sanitize_alias(name: &str, fallback: &str) -> String {
    let source = if name.trim().is_empty() { fallback } else { name.trim() };
    let alias = source
        .to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || matches!(c, '-' | '_' | '.')))
        .filter(|piece| !piece.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    if alias.is_empty() {
        "host".to_string()
    } else {
        alias
    }
}

fn unique_alias(profile: &Profile, used: &mut HashSet<String>) -> String {
    let host = profile.connection.trimmed_host();
    let base = sanitize_alias(&profile.name, if host.is_empty() { "host" } else { host });
    let mut candidate = base.clone();
    let mut suffix = 2;
    while !used.insert(candidate.clone()) {
        candidate = format!("{}-{}", base, suffix);
        suffix += 1;
    }
    candidate
}

/// `listen:target` model line to OpenSSH's `listen target`
fn forward_words(line: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (index, c) in line.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            ':' if depth == 0 => {
                parts.push(&line[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    parts.push(&line[start..]);

    match parts.len() {
        3 => vec![parts[0].to_string(), parts[1..].join(":")],
        4 => vec![parts[..2].join(":"), parts[2..].join(":")],
        _ => vec![line.to_string()],
    }
}

struct BlockWriter {
    lines: Vec<String>,
}

impl BlockWriter {
    fn line(&mut self, key: &str, value: impl AsRef<str>) {
        self.lines.push(format!("{}{} {}", INDENT, key, value.as_ref()));
    }

    fn quoted(&mut self, key: &str, value: &str) {
        let value = value.trim();
        if !value.is_empty() {
            self.line(key, quote_if_needed(value));
        }
    }

    fn words(&mut self, key: &str, words: &[String]) {
        let joined = words
            .iter()
            .map(|w| quote_if_needed(w))
            .collect::<Vec<_>>()
            .join(" ");
        self.line(key, joined);
    }
}

fn write_settings(out: &mut BlockWriter, options: &SessionOptions, auth: AuthMethod) {
    out.line("RequestTTY", options.request_tty.config_value());
    out.line("StrictHostKeyChecking", options.strict_host_key_checking.value());
    out.line("TCPKeepAlive", yes_no(options.tcp_keepalive));
    out.line("ForwardAgent", yes_no(options.forward_agent));
    out.line("KbdInteractiveAuthentication", yes_no(options.enable_kbd_interactive_auth));
    // Pubkey/Password lines are written with the auth method
    if auth == AuthMethod::Key {
        out.line("PasswordAuthentication", yes_no(options.enable_password_auth));
    }
    out.line("GSSAPIAuthentication", yes_no(options.enable_gssapi_auth));
    out.line("GSSAPIDelegateCredentials", yes_no(options.gssapi_delegate_credentials));
    out.line("Compression", yes_no(options.compression));
    out.line("ForwardX11", yes_no(options.x11_forwarding));

    if options.connect_timeout_seconds > 0 {
        out.line("ConnectTimeout", options.connect_timeout_seconds.to_string());
    }
    if options.keepalive_interval_seconds > 0 {
        out.line("ServerAliveInterval", options.keepalive_interval_seconds.to_string());
        out.line("ServerAliveCountMax", options.keepalive_count_max.max(1).to_string());
    }
    if let Some(family) = options.address_family.value() {
        out.line("AddressFamily", family);
    }

    out.quoted("UserKnownHostsFile", &options.user_known_hosts_file);
    out.quoted("BindAddress", &options.bind_address);
    out.quoted("KexAlgorithms", &options.kex_algorithms);
    out.quoted("Ciphers", &options.ciphers);
    out.quoted("MACs", &options.macs);
    out.quoted("HostKeyAlgorithms", &options.host_key_algorithms);
    out.quoted("RekeyLimit", &options.rekey_limit);

    let remote_command = options.remote_command.trim();
    out.quoted("RemoteCommand", remote_command);
    let proxy = match options.proxy_type {
        ProxyType::Command => Some(options.proxy_command.trim().to_string()).filter(|c| !c.is_empty()),
        _ => proxy_command(options),
    };
    if let Some(proxy) = proxy {
        out.quoted("ProxyCommand", &proxy);
    }

    let set_env = non_empty_lines(&options.set_env);
    if !set_env.is_empty() {
        out.words("SetEnv", &set_env);
    }
    for pattern in non_empty_lines(&options.send_env) {
        out.quoted("SendEnv", &pattern);
    }
    for (key, field) in [
        ("LocalForward", &options.local_forwards),
        ("RemoteForward", &options.remote_forwards),
        ("DynamicForward", &options.dynamic_forwards),
    ] {
        for line in non_empty_lines(field) {
            out.words(key, &forward_words(&line));
        }
    }

    if options.logging_enabled || options.log_verbosity != LogVerbosity::None {
        out.line("LogLevel", options.log_verbosity.log_level());
    }
    if options.no_shell && remote_command.is_empty() {
        out.line("SessionType", "none");
    }
}

/// Render profiles as OpenSSH config text.
pub fn encode(profiles: &[Profile]) -> String {
    let mut used = HashSet::new();
    let mut blocks = Vec::with_capacity(profiles.len());

    for profile in profiles {
        let connection = &profile.connection;
        let alias = unique_alias(profile, &mut used);
        let mut out = BlockWriter {
            lines: vec![format!("Host {}", quote_if_needed(&alias))],
        };

        let name = profile.name.trim();
        if !name.is_empty() && name != alias {
            out.lines.push(format!("{}{} {}", INDENT, NAME_COMMENT, name));
        }
        out.quoted("HostName", connection.trimmed_host());
        out.quoted("User", connection.trimmed_username());
        out.line("Port", connection.effective_port().to_string());

        match connection.auth_method {
            AuthMethod::Password => {
                out.line("PubkeyAuthentication", "no");
                out.line("PasswordAuthentication", "yes");
            }
            AuthMethod::Key => {
                out.line("PubkeyAuthentication", "yes");
                out.quoted("IdentityFile", &connection.key_path);
            }
        }

        write_settings(&mut out, &connection.options, connection.auth_method);
        blocks.push(out.lines.join("\n"));
    }

    format!("{}\n\n{}\n", GENERATED_HEADER, blocks.join("\n\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_words_quotes_and_escapes() {
        assert_eq!(split_words("a  'b c' \"d \\\"e\\\"\""), vec!["a", "b c", "d \"e\""]);
        assert_eq!(split_words("KEY=\"x y\""), vec!["KEY=x y"]);
        assert_eq!(split_words("a\\ b"), vec!["a b"]);
        assert_eq!(split_words("''"), vec![""]);
        assert!(split_words("   ").is_empty());
    }

    #[test]
    fn test_strip_comment_respects_quotes() {
        assert_eq!(strip_comment("User bob # admin"), "User bob ");
        assert_eq!(strip_comment("IdentityFile \"~/keys/#1\""), "IdentityFile \"~/keys/#1\"");
    }

    #[test]
    fn test_split_directive_forms() {
        assert_eq!(split_directive("Port 2222"), Some(("port".to_string(), "2222")));
        assert_eq!(split_directive("Port=2222"), Some(("port".to_string(), "2222")));
        assert_eq!(split_directive("Port = 2222"), Some(("port".to_string(), "2222")));
        assert_eq!(split_directive(""), None);
    }

    #[test]
    fn test_decode_basic_hosts() {
        let text = "\
# global defaults
ServerAliveInterval 30

Host web web-alias *.internal !bad
    HostName web.example.com   # primary
    User deploy
    Port 2200
    IdentityFile \"~/.ssh/id web\"

Host *
    User nobody
";
        let profiles = decode(text).unwrap();
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[0].name, "web");
        assert_eq!(profiles[1].name, "web-alias");
        for profile in &profiles {
            let c = &profile.connection;
            assert_eq!(c.host, "web.example.com");
            assert_eq!(c.username, "deploy");
            assert_eq!(c.port, 2200);
            assert_eq!(c.auth_method, AuthMethod::Key);
            assert_eq!(c.key_path, "~/.ssh/id web");
            // directives before the first Host are not applied
            assert_eq!(c.options.keepalive_interval_seconds, 0);
        }
        assert_ne!(profiles[0].id, profiles[1].id);
    }

    #[test]
    fn test_decode_hostname_defaults_to_alias() {
        let profiles = decode("Host nas\n  User admin\n").unwrap();
        assert_eq!(profiles[0].connection.host, "nas");
        assert_eq!(profiles[0].connection.port, 22);
    }

    #[test]
    fn test_decode_password_inference() {
        let profiles = decode(
            "Host a\n  PasswordAuthentication yes\n  PubkeyAuthentication no\n\
             Host b\n  PasswordAuthentication yes\n",
        )
        .unwrap();
        assert_eq!(profiles[0].connection.auth_method, AuthMethod::Password);
        assert!(profiles[0].connection.key_path.is_empty());
        assert!(!profiles[0].connection.options.enable_pubkey_auth);
        assert_eq!(profiles[1].connection.auth_method, AuthMethod::Key);
    }

    #[test]
    fn test_decode_empty_config() {
        assert!(matches!(decode(""), Err(AppError::EmptyConfig)));
        assert!(matches!(decode("Host *\n  User x\n"), Err(AppError::EmptyConfig)));
        assert!(matches!(decode("User x\nPort 22\n"), Err(AppError::EmptyConfig)));
    }

    #[test]
    fn test_decode_match_and_include() {
        let text = "\
Include ~/.ssh/config.d/*
Host db
    User postgres
Match host db exec \"true\"
    User root
    Port 5432
";
        let profiles = decode(text).unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].connection.username, "postgres");
        assert_eq!(profiles[0].connection.port, 22);
    }

    #[test]
    fn test_decode_first_value_wins() {
        let profiles = decode("Host a\n  User first\n  User second\n").unwrap();
        assert_eq!(profiles[0].connection.username, "first");
    }

    #[test]
    fn test_decode_options() {
        let text = "\
Host box
    HostName=10.0.0.5
    StrictHostKeyChecking no
    RequestTTY no
    AddressFamily inet6
    ConnectTimeout 7
    ServerAliveInterval 20
    ServerAliveCountMax 0
    ForwardAgent yes
    TCPKeepAlive no
    ChallengeResponseAuthentication no
    GSSAPIAuthentication no
    Compression yes
    ForwardX11 yes
    Ciphers aes256-gcm@openssh.com,chacha20-poly1305@openssh.com
    RemoteCommand tmux new -A -s main
    ProxyCommand ssh -W %h:%p jump # via jump
    LogLevel DEBUG3
    SessionType none
    SendEnv LANG LC_*
    SendEnv EDITOR
    SetEnv FOO=1 BAR=\"two words\"
    LocalForward 8080 localhost:80
    RemoteForward 127.0.0.1:9000 [::1]:9000
    DynamicForward 1080
";
        let profiles = decode(text).unwrap();
        let c = &profiles[0].connection;
        let o = &c.options;
        assert_eq!(c.host, "10.0.0.5");
        assert_eq!(o.strict_host_key_checking, StrictHostKeyChecking::Off);
        assert_eq!(o.request_tty, RequestTty::Disabled);
        assert_eq!(o.address_family, AddressFamily::Ipv6);
        assert_eq!(o.connect_timeout_seconds, 7);
        assert_eq!(o.keepalive_interval_seconds, 20);
        assert_eq!(o.keepalive_count_max, 1);
        assert!(o.forward_agent);
        assert!(!o.tcp_keepalive);
        assert!(!o.enable_kbd_interactive_auth);
        assert!(!o.enable_gssapi_auth);
        assert!(o.compression);
        assert!(o.x11_forwarding);
        assert_eq!(o.ciphers, "aes256-gcm@openssh.com,chacha20-poly1305@openssh.com");
        assert_eq!(o.remote_command, "tmux new -A -s main");
        assert_eq!(o.proxy_type, ProxyType::Command);
        assert_eq!(o.proxy_command, "ssh -W %h:%p jump");
        assert_eq!(o.log_verbosity, LogVerbosity::Debug3);
        assert!(o.logging_enabled);
        assert!(o.no_shell);
        assert_eq!(o.send_env, "LANG\nLC_*\nEDITOR");
        assert_eq!(o.set_env, "FOO=1\nBAR=two words");
        assert_eq!(o.local_forwards, "8080:localhost:80");
        assert_eq!(o.remote_forwards, "127.0.0.1:9000:[::1]:9000");
        assert_eq!(o.dynamic_forwards, "1080");
    }

    #[test]
    fn test_decode_proxy_none_ignored() {
        let profiles = decode("Host a\n  ProxyCommand none\n").unwrap();
        assert_eq!(profiles[0].connection.options.proxy_type, ProxyType::None);
    }

    #[test]
    fn test_forward_words() {
        assert_eq!(forward_words("8080:localhost:80"), vec!["8080", "localhost:80"]);
        assert_eq!(
            forward_words("127.0.0.1:8080:db:5432"),
            vec!["127.0.0.1:8080", "db:5432"]
        );
        assert_eq!(forward_words("[::1]:80:web:80"), vec!["[::1]:80", "web:80"]);
        assert_eq!(forward_words("1080"), vec!["1080"]);
    }

    #[test]
    fn test_sanitize_alias() {
        assert_eq!(sanitize_alias("My Server (prod)", "h"), "my-server-prod");
        assert_eq!(sanitize_alias("  ", "db.example.com"), "db.example.com");
        assert_eq!(sanitize_alias("!!!", "h"), "host");
    }

    #[test]
    fn test_encode_unique_aliases_and_name_comment() {
        let profiles = vec![
            Profile::new("Prod Web", ConnectionConfig::new("a.example.com", "u")),
            Profile::new("prod web", ConnectionConfig::new("b.example.com", "u")),
            Profile::new("prod-web", ConnectionConfig::new("c.example.com", "u")),
        ];
        let text = encode(&profiles);
        assert!(text.starts_with("# Generated by sshdeck\n\nHost prod-web\n    # Name: Prod Web\n"));
        assert!(text.contains("Host prod-web-2\n"));
        assert!(text.contains("Host prod-web-3\n    # Name: prod-web\n    HostName c.example.com\n"));
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn test_encode_password_auth_has_no_duplicate_directives() {
        let mut connection = ConnectionConfig::new("h", "u");
        connection.auth_method = AuthMethod::Password;
        let text = encode(&[Profile::new("h", connection)]);
        assert_eq!(text.matches("PasswordAuthentication").count(), 1);
        assert_eq!(text.matches("PubkeyAuthentication").count(), 1);
        assert!(text.contains("    PubkeyAuthentication no\n    PasswordAuthentication yes\n"));
        assert!(!text.contains("IdentityFile"));
    }

    #[test]
    fn test_encode_quotes_values() {
        let mut connection = ConnectionConfig::new("h", "u");
        connection.key_path = "~/My Keys/id \"x\"".to_string();
        let text = encode(&[Profile::new("h", connection)]);
        assert!(text.contains("    IdentityFile \"~/My Keys/id \\\"x\\\"\"\n"));
    }

    #[test]
    fn test_encode_generated_proxy() {
        let mut connection = ConnectionConfig::new("h", "u");
        connection.options.proxy_type = ProxyType::Socks5;
        connection.options.proxy_host = "p".to_string();
        connection.options.proxy_port = 1080;
        let text = encode(&[Profile::new("h", connection)]);
        assert!(text.contains("    ProxyCommand \"nc -x p:1080 -X 5 %h %p\"\n"));
    }

    #[test]
    fn test_round_trip() {
        let mut connection = ConnectionConfig::new("files.example.com", "alice");
        connection.port = 2022;
        connection.key_path = "~/.ssh/id_ed25519".to_string();
        let o = &mut connection.options;
        o.local_forwards = "8080:localhost:80\n# note\n\n127.0.0.1:5433:db:5432".to_string();
        o.remote_forwards = "9000:localhost:9000".to_string();
        o.dynamic_forwards = "1080".to_string();
        o.send_env = "LANG\nLC_*".to_string();
        o.set_env = "FOO=bar\nGREETING=hello world".to_string();
        o.remote_command = "htop".to_string();
        o.log_verbosity = LogVerbosity::Verbose;
        o.logging_enabled = true;
        o.keepalive_interval_seconds = 15;
        let original = Profile::new("Files", connection);

        let decoded = decode(&encode(&[original.clone()])).unwrap();
        assert_eq!(decoded.len(), 1);
        let c = &decoded[0].connection;
        let expected = &original.connection;
        assert_eq!(decoded[0].name, "Files");
        assert_eq!(c.host, expected.host);
        assert_eq!(c.username, expected.username);
        assert_eq!(c.port, expected.port);
        assert_eq!(c.key_path, expected.key_path);
        assert_eq!(c.auth_method, expected.auth_method);
        assert_eq!(c.options.local_forwards, "8080:localhost:80\n127.0.0.1:5433:db:5432");
        assert_eq!(c.options.remote_forwards, expected.options.remote_forwards);
        assert_eq!(c.options.dynamic_forwards, expected.options.dynamic_forwards);
        assert_eq!(c.options.send_env, expected.options.send_env);
        assert_eq!(c.options.set_env, expected.options.set_env);
        assert_eq!(c.options.remote_command, "htop");
        assert_eq!(c.options.log_verbosity, LogVerbosity::Verbose);
        assert_eq!(c.options.keepalive_interval_seconds, 15);
        assert_eq!(c.options.keepalive_count_max, 3);
    }

    #[test]
    fn test_command_directives_survive_round_trip() {
        let mut connection = ConnectionConfig::new("jump.example.com", "ops");
        connection.options.remote_command = r#"echo a#b && printf "%s\n" "x""#.to_string();
        connection.options.proxy_type = ProxyType::Command;
        connection.options.proxy_command = r#"ssh -W %h:%p bastion # "edge""#.to_string();
        let profile = Profile::new("jump", connection.clone());

        let text = encode(&[profile]);
        assert!(text.contains(r#"    RemoteCommand "echo a#b && printf \"%s\\n\" \"x\"""#));

        let decoded = decode(&text).unwrap();
        let o = &decoded[0].connection.options;
        assert_eq!(o.remote_command, connection.options.remote_command);
        assert_eq!(o.proxy_type, ProxyType::Command);
        assert_eq!(o.proxy_command, connection.options.proxy_command);
    }
}
