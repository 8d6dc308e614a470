use crate::transfer::paths::expand_local_path;
use serde::{Deserialize, Serialize};

/// Clamp any user-entered port into the valid TCP range
pub fn clamp_port(port: i64) -> u16 {
    port.clamp(1, 65535) as u16
}

fn default_port() -> i32 {
    22
}

fn default_key_path() -> String {
    "~/.ssh/id_rsa".to_string()
}

/// Per-host connection configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: i32,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub auth_method: AuthMethod,
    #[serde(default = "default_key_path")]
    pub key_path: String,
    #[serde(default)]
    pub options: SessionOptions,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            protocol: Protocol::default(),
            host: String::new(),
            port: default_port(),
            username: String::new(),
            auth_method: AuthMethod::default(),
            key_path: default_key_path(),
            options: SessionOptions::default(),
        }
    }
}

impl ConnectionConfig {
    pub fn new(host: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            ..Self::default()
        }
    }

    /// Port clamped to [1, 65535]
    pub fn effective_port(&self) -> u16 {
        clamp_port(self.port as i64)
    }

    pub fn trimmed_host(&self) -> &str {
        self.host.trim()
    }

    pub fn trimmed_username(&self) -> &str {
        self.username.trim()
    }

    /// Key path with a leading `~/` resolved against the home directory
    pub fn expanded_key_path(&self) -> String {
        expand_local_path(self.key_path.trim())
    }

    /// `user@host`
    pub fn target(&self) -> String {
        format!("{}@{}", self.trimmed_username(), self.trimmed_host())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Ssh,
    Telnet,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    #[default]
    Key,
    Password,
}

/// TTY allocation mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestTty {
    #[default]
    Force,
    Auto,
    Disabled,
}

impl RequestTty {
    pub fn flag(self) -> &'static str {
        match self {
            RequestTty::Force => "-tt",
            RequestTty::Auto => "-t",
            RequestTty::Disabled => "-T",
        }
    }

    /// `RequestTTY` directive value
    pub fn config_value(self) -> &'static str {
        match self {
            RequestTty::Force => "force",
            RequestTty::Auto => "auto",
            RequestTty::Disabled => "no",
        }
    }

    pub fn from_config_value(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "force" => Some(RequestTty::Force),
            "auto" | "yes" => Some(RequestTty::Auto),
            "no" => Some(RequestTty::Disabled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrictHostKeyChecking {
    #[default]
    AcceptNew,
    Strict,
    Off,
}

impl StrictHostKeyChecking {
    pub fn value(self) -> &'static str {
        match self {
            StrictHostKeyChecking::AcceptNew => "accept-new",
            StrictHostKeyChecking::Strict => "yes",
            StrictHostKeyChecking::Off => "no",
        }
    }

    pub fn from_config_value(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "accept-new" => Some(StrictHostKeyChecking::AcceptNew),
            "yes" | "ask" => Some(StrictHostKeyChecking::Strict),
            "no" | "off" => Some(StrictHostKeyChecking::Off),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    #[default]
    Auto,
    Ipv4,
    Ipv6,
}

impl AddressFamily {
    /// Directive value, `None` when ssh should decide
    pub fn value(self) -> Option<&'static str> {
        match self {
            AddressFamily::Auto => None,
            AddressFamily::Ipv4 => Some("inet"),
            AddressFamily::Ipv6 => Some("inet6"),
        }
    }

    pub fn from_config_value(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "any" => Some(AddressFamily::Auto),
            "inet" => Some(AddressFamily::Ipv4),
            "inet6" => Some(AddressFamily::Ipv6),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyType {
    #[default]
    None,
    Socks4,
    Socks5,
    Http,
    Command,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogVerbosity {
    #[default]
    None,
    Verbose,
    Debug2,
    Debug3,
}

impl LogVerbosity {
    pub fn flags(self) -> &'static [&'static str] {
        match self {
            LogVerbosity::None => &[],
            LogVerbosity::Verbose => &["-v"],
            LogVerbosity::Debug2 => &["-vv"],
            LogVerbosity::Debug3 => &["-vvv"],
        }
    }

    /// `LogLevel` directive value
    pub fn log_level(self) -> &'static str {
        match self {
            LogVerbosity::None => "INFO",
            LogVerbosity::Verbose => "VERBOSE",
            LogVerbosity::Debug2 => "DEBUG2",
            LogVerbosity::Debug3 => "DEBUG3",
        }
    }

    pub fn from_log_level(value: &str) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "VERBOSE" => LogVerbosity::Verbose,
            "DEBUG" | "DEBUG1" | "DEBUG2" => LogVerbosity::Debug2,
            "DEBUG3" => LogVerbosity::Debug3,
            _ => LogVerbosity::None,
        }
    }
}

/// Tunable session options.
///
/// Multi-line fields (forwards, SendEnv, SetEnv) hold one entry per line;
/// blank lines and lines starting with `#` are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    pub terminal_type: String,
    pub locale_charset: String,
    pub request_tty: RequestTty,

    pub connect_timeout_seconds: i32,
    pub keepalive_interval_seconds: i32,
    pub keepalive_count_max: i32,
    pub tcp_keepalive: bool,
    pub address_family: AddressFamily,
    pub bind_address: String,

    pub strict_host_key_checking: StrictHostKeyChecking,
    pub user_known_hosts_file: String,

    pub enable_pubkey_auth: bool,
    pub enable_password_auth: bool,
    pub enable_kbd_interactive_auth: bool,
    pub enable_gssapi_auth: bool,
    pub gssapi_delegate_credentials: bool,
    pub forward_agent: bool,
    pub compression: bool,
    pub x11_forwarding: bool,
    pub x11_display: String,

    pub kex_algorithms: String,
    pub ciphers: String,
    pub macs: String,
    pub host_key_algorithms: String,
    pub rekey_limit: String,

    pub remote_command: String,
    pub no_shell: bool,

    pub local_forwards: String,
    pub remote_forwards: String,
    pub dynamic_forwards: String,
    pub send_env: String,
    pub set_env: String,

    pub proxy_type: ProxyType,
    pub proxy_host: String,
    pub proxy_port: i32,
    pub proxy_username: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub proxy_password: String,
    pub proxy_command: String,

    pub logging_enabled: bool,
    pub log_file_path: String,
    pub log_verbosity: LogVerbosity,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            terminal_type: "xterm-256color".to_string(),
            locale_charset: "UTF-8".to_string(),
            request_tty: RequestTty::Force,
            connect_timeout_seconds: 15,
            keepalive_interval_seconds: 0,
            keepalive_count_max: 3,
            tcp_keepalive: true,
            address_family: AddressFamily::Auto,
            bind_address: String::new(),
            strict_host_key_checking: StrictHostKeyChecking::AcceptNew,
            user_known_hosts_file: String::new(),
            enable_pubkey_auth: true,
            enable_password_auth: true,
            enable_kbd_interactive_auth: true,
            enable_gssapi_auth: true,
            gssapi_delegate_credentials: false,
            forward_agent: false,
            compression: false,
            x11_forwarding: false,
            x11_display: String::new(),
            kex_algorithms: String::new(),
            ciphers: String::new(),
            macs: String::new(),
            host_key_algorithms: String::new(),
            rekey_limit: String::new(),
            remote_command: String::new(),
            no_shell: false,
            local_forwards: String::new(),
            remote_forwards: String::new(),
            dynamic_forwards: String::new(),
            send_env: String::new(),
            set_env: String::new(),
            proxy_type: ProxyType::None,
            proxy_host: String::new(),
            proxy_port: 0,
            proxy_username: String::new(),
            proxy_password: String::new(),
            proxy_command: String::new(),
            logging_enabled: false,
            log_file_path: String::new(),
            log_verbosity: LogVerbosity::None,
        }
    }
}

/// Trimmed, non-empty, non-comment lines of a multi-line field
pub fn non_empty_lines(value: &str) -> Vec<String> {
    value
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
