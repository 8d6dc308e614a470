pub mod commands;
pub mod session;

pub use session::*;

use crate::error::{AppError, AppResult};
use crate::process::Invocation;
use crate::quoting::shell_join;

/// Client executables used to build invocations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientPrograms {
    pub ssh: String,
    pub telnet: Option<String>,
}

impl Default for ClientPrograms {
    fn default() -> Self {
        Self {
            ssh: "ssh".to_string(),
            telnet: None,
        }
    }
}

/// Build the invocation for an interactive session.
///
/// Password credentials are attached by [`commands::session_invocation`],
/// not here.
pub fn build_invocation(config: &ConnectionConfig, programs: &ClientPrograms) -> AppResult<Invocation> {
    let invocation = match config.protocol {
        Protocol::Ssh => Invocation::new(&programs.ssh).args(build_ssh_args(config)?),
        Protocol::Telnet => {
            let telnet = programs
                .telnet
                .clone()
                .ok_or_else(|| AppError::Validation("Telnet client not found".to_string()))?;
            Invocation::new(telnet).args(build_telnet_args(config)?)
        }
    };

    let invocation = session_environment(&config.options)
        .into_iter()
        .fold(invocation, |inv, (key, value)| inv.env(key, value));

    tracing::debug!("Built session command: {}", invocation.display_line());
    Ok(invocation)
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn push_option(args: &mut Vec<String>, key: &str, value: impl AsRef<str>) {
    args.push("-o".to_string());
    args.push(format!("{}={}", key, value.as_ref()));
}

/// Authentication methods ssh should try, in preference order.
///
/// The selected auth method is always enabled regardless of its toggle.
pub fn preferred_authentications(config: &ConnectionConfig) -> Vec<&'static str> {
    let options = &config.options;
    let mut methods = Vec::new();
    if options.enable_pubkey_auth || config.auth_method == AuthMethod::Key {
        methods.push("publickey");
    }
    if options.enable_kbd_interactive_auth {
        methods.push("keyboard-interactive");
    }
    if options.enable_password_auth || config.auth_method == AuthMethod::Password {
        methods.push("password");
    }
    if options.enable_gssapi_auth {
        methods.push("gssapi-with-mic");
    }
    methods
}

/// Full `ssh` argument vector for an interactive session
pub fn build_ssh_args(config: &ConnectionConfig) -> AppResult<Vec<String>> {
    let host = config.trimmed_host();
    let user = config.trimmed_username();
    if host.is_empty() {
        return Err(AppError::Validation("Host is empty".to_string()));
    }
    if user.is_empty() {
        return Err(AppError::Validation("Username is empty".to_string()));
    }

    let options = &config.options;
    let mut args = vec![options.request_tty.flag().to_string()];
    args.push("-p".to_string());
    args.push(config.effective_port().to_string());
    if options.compression {
        args.push("-C".to_string());
    }

    let key_auth = config.auth_method == AuthMethod::Key;
    let password_auth = config.auth_method == AuthMethod::Password;
    push_option(&mut args, "StrictHostKeyChecking", options.strict_host_key_checking.value());
    push_option(&mut args, "TCPKeepAlive", yes_no(options.tcp_keepalive));
    push_option(&mut args, "Compression", yes_no(options.compression));
    push_option(&mut args, "ForwardAgent", yes_no(options.forward_agent));
    push_option(&mut args, "PubkeyAuthentication", yes_no(options.enable_pubkey_auth || key_auth));
    push_option(
        &mut args,
        "PasswordAuthentication",
        yes_no(options.enable_password_auth || password_auth),
    );
    push_option(
        &mut args,
        "KbdInteractiveAuthentication",
        yes_no(options.enable_kbd_interactive_auth),
    );
    push_option(&mut args, "GSSAPIAuthentication", yes_no(options.enable_gssapi_auth));
    push_option(
        &mut args,
        "GSSAPIDelegateCredentials",
        yes_no(options.gssapi_delegate_credentials),
    );

    if options.connect_timeout_seconds > 0 {
        push_option(&mut args, "ConnectTimeout", options.connect_timeout_seconds.to_string());
    }
    if options.keepalive_interval_seconds > 0 {
        push_option(
            &mut args,
            "ServerAliveInterval",
            options.keepalive_interval_seconds.to_string(),
        );
        push_option(
            &mut args,
            "ServerAliveCountMax",
            options.keepalive_count_max.max(1).to_string(),
        );
    }
    if let Some(family) = options.address_family.value() {
        push_option(&mut args, "AddressFamily", family);
    }
    let known_hosts = options.user_known_hosts_file.trim();
    if !known_hosts.is_empty() {
        push_option(
            &mut args,
            "UserKnownHostsFile",
            crate::transfer::paths::expand_local_path(known_hosts),
        );
    }

    let bind = options.bind_address.trim();
    if !bind.is_empty() {
        args.push("-b".to_string());
        args.push(bind.to_string());
    }
    if options.x11_forwarding {
        args.push("-X".to_string());
    }

    let preferred = preferred_authentications(config);
    if !preferred.is_empty() {
        push_option(&mut args, "PreferredAuthentications", preferred.join(","));
    }

    for (key, value) in [
        ("KexAlgorithms", &options.kex_algorithms),
        ("Ciphers", &options.ciphers),
        ("MACs", &options.macs),
        ("HostKeyAlgorithms", &options.host_key_algorithms),
        ("RekeyLimit", &options.rekey_limit),
    ] {
        let value = value.trim();
        if !value.is_empty() {
            push_option(&mut args, key, value);
        }
    }

    for pattern in non_empty_lines(&options.send_env) {
        push_option(&mut args, "SendEnv", pattern);
    }
    for pair in non_empty_lines(&options.set_env) {
        if pair.contains('=') {
            push_option(&mut args, "SetEnv", pair);
        }
    }

    for (flag, lines) in [
        ("-L", &options.local_forwards),
        ("-R", &options.remote_forwards),
        ("-D", &options.dynamic_forwards),
    ] {
        for spec in non_empty_lines(lines) {
            args.push(flag.to_string());
            args.push(spec);
        }
    }

    if let Some(proxy) = proxy_command(options) {
        push_option(&mut args, "ProxyCommand", proxy);
    }

    args.extend(options.log_verbosity.flags().iter().map(|f| f.to_string()));
    let log_path = options.log_file_path.trim();
    if options.logging_enabled && !log_path.is_empty() {
        args.push("-E".to_string());
        args.push(crate::transfer::paths::expand_local_path(log_path));
    }

    if key_auth {
        let key = config.expanded_key_path();
        if key.is_empty() {
            return Err(AppError::Validation("Private key path is empty".to_string()));
        }
        push_option(&mut args, "IdentitiesOnly", "yes");
        args.push("-i".to_string());
        args.push(key);
    }

    let remote_command = options.remote_command.trim();
    if options.no_shell && remote_command.is_empty() {
        args.push("-N".to_string());
    }

    args.push(config.target());
    if !remote_command.is_empty() {
        args.push(remote_command.to_string());
    }

    Ok(args)
}

/// Reduced option set used by the transfer backends (sftp, scp, ssh one-shots)
pub fn transfer_option_args(config: &ConnectionConfig) -> Vec<String> {
    let options = &config.options;
    let mut args = Vec::new();
    push_option(&mut args, "StrictHostKeyChecking", options.strict_host_key_checking.value());
    if options.connect_timeout_seconds > 0 {
        push_option(&mut args, "ConnectTimeout", options.connect_timeout_seconds.to_string());
    }
    let known_hosts = options.user_known_hosts_file.trim();
    if !known_hosts.is_empty() {
        push_option(
            &mut args,
            "UserKnownHostsFile",
            crate::transfer::paths::expand_local_path(known_hosts),
        );
    }
    if let Some(proxy) = proxy_command(options) {
        push_option(&mut args, "ProxyCommand", proxy);
    }
    if config.auth_method == AuthMethod::Key {
        let key = config.expanded_key_path();
        if !key.is_empty() {
            push_option(&mut args, "IdentitiesOnly", "yes");
            args.push("-i".to_string());
            args.push(key);
        }
    }
    args
}

/// `telnet [-l user] host port`
pub fn build_telnet_args(config: &ConnectionConfig) -> AppResult<Vec<String>> {
    let host = config.trimmed_host();
    if host.is_empty() {
        return Err(AppError::Validation("Host is empty".to_string()));
    }

    let mut args = Vec::new();
    let user = config.trimmed_username();
    if !user.is_empty() {
        args.push("-l".to_string());
        args.push(user.to_string());
    }
    args.push(host.to_string());
    args.push(config.effective_port().to_string());
    Ok(args)
}

/// ProxyCommand for the configured proxy, if any
pub fn proxy_command(options: &SessionOptions) -> Option<String> {
    match options.proxy_type {
        ProxyType::None => None,
        ProxyType::Command => {
            let template = options.proxy_command.trim();
            if template.is_empty() {
                return None;
            }
            let command = template
                .replace("%proxy_user%", options.proxy_username.trim())
                .replace("%proxy_password%", &options.proxy_password);
            Some(command)
        }
        kind => {
            let host = options.proxy_host.trim();
            if host.is_empty() || options.proxy_port <= 0 {
                return None;
            }
            let endpoint = format!("{}:{}", host, options.proxy_port.min(65535));
            let user = options.proxy_username.trim();
            let command = match kind {
                ProxyType::Socks4 | ProxyType::Socks5 => {
                    let version = if kind == ProxyType::Socks4 { "4" } else { "5" };
                    if user.is_empty() {
                        format!("nc -x {} -X {} %h %p", endpoint, version)
                    } else {
                        format!("nc -x {} -X {} -P {} %h %p", endpoint, version, user)
                    }
                }
                // the http CONNECT wrapper never carries a proxy user
                _ => format!("nc -x {} -X connect %h %p", endpoint),
            };
            Some(command)
        }
    }
}

/// Environment overrides for an interactive session
pub fn session_environment(options: &SessionOptions) -> Vec<(String, String)> {
    let terminal_type = options.terminal_type.trim();
    let mut env = vec![
        (
            "TERM".to_string(),
            if terminal_type.is_empty() {
                "xterm-256color".to_string()
            } else {
                terminal_type.to_string()
            },
        ),
        ("COLORTERM".to_string(), "truecolor".to_string()),
        ("LANG".to_string(), "en_US.UTF-8".to_string()),
    ];

    let charset = options.locale_charset.trim();
    if !charset.is_empty() {
        env.push(("LC_CTYPE".to_string(), format!("en_US.{}", charset)));
    }
    let display = options.x11_display.trim();
    if !display.is_empty() {
        env.push(("DISPLAY".to_string(), display.to_string()));
    }
    for line in non_empty_lines(&options.set_env) {
        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            if !key.is_empty() {
                env.push((key.to_string(), value.trim().to_string()));
            }
        }
    }
    env
}

/// One shell-escaped command line for launching in an external terminal.
///
/// Only key authentication is supported here because there is no pty driver
/// on the far side to answer a password prompt.
pub fn build_terminal_command(config: &ConnectionConfig, programs: &ClientPrograms) -> AppResult<String> {
    let host = config.trimmed_host();
    let user = config.trimmed_username();

    if config.protocol == Protocol::Telnet {
        let telnet = programs.telnet.as_deref().unwrap_or("telnet");
        let mut parts = vec![telnet.to_string()];
        parts.extend(build_telnet_args(config)?);
        return Ok(shell_join(parts));
    }

    if host.is_empty() || user.is_empty() {
        return Err(AppError::Validation("Host and username are required".to_string()));
    }
    if config.auth_method == AuthMethod::Password {
        return Err(AppError::Validation(
            "External terminal mode supports only key auth. Switch to key auth or connect directly."
                .to_string(),
        ));
    }
    let key = config.expanded_key_path();
    if key.is_empty() {
        return Err(AppError::Validation(
            "Private key path is required for external terminal mode".to_string(),
        ));
    }

    let mut parts = vec![
        programs.ssh.clone(),
        "-p".to_string(),
        config.effective_port().to_string(),
        "-o".to_string(),
        format!(
            "StrictHostKeyChecking={}",
            config.options.strict_host_key_checking.value()
        ),
        "-o".to_string(),
        "IdentitiesOnly=yes".to_string(),
        "-i".to_string(),
        key,
        config.target(),
    ];
    let remote_command = config.options.remote_command.trim();
    if !remote_command.is_empty() {
        parts.push(remote_command.to_string());
    }
    Ok(shell_join(parts))
}
