use super::{build_invocation, build_terminal_command, AuthMethod, ClientPrograms};
use crate::config::Profile;
use crate::error::{AppError, AppResult};
use crate::keychain::CredentialStore;
use crate::process::{pty, Invocation};
use crate::state::AppState;
use std::process::Command;

/// Session invocation with the stored password attached for password auth
pub fn session_invocation(
    profile: &Profile,
    store: &dyn CredentialStore,
    programs: &ClientPrograms,
) -> AppResult<Invocation> {
    let invocation = build_invocation(&profile.connection, programs)?;
    if profile.connection.auth_method != AuthMethod::Password {
        return Ok(invocation);
    }

    // SECURITY: the password only ever travels to the pty, never argv/env
    match store.get_non_empty(&profile.id)? {
        Some(password) => Ok(invocation.with_credential(password)),
        None => Err(AppError::Credential(
            "Password for this host is missing in Keychain".to_string(),
        )),
    }
}

/// Argument vector for a host, without credentials
pub fn connection_argv(state: &AppState, host: &str) -> AppResult<Invocation> {
    let profile = state.profile(host)?;
    let programs = state.settings.read().tools.client_programs();
    build_invocation(&profile.connection, &programs)
}

/// Single shell-escaped command line for an external terminal
pub fn terminal_command(state: &AppState, host: &str) -> AppResult<String> {
    let profile = state.profile(host)?;
    let programs = state.settings.read().tools.client_programs();
    build_terminal_command(&profile.connection, &programs)
}

/// Run an interactive session attached to the current terminal; returns the exit code
pub fn open_session(state: &AppState, host: &str) -> AppResult<i32> {
    let profile = state.profile(host)?;
    let programs = state.settings.read().tools.client_programs();
    let invocation = session_invocation(&profile, state.credentials.as_ref(), &programs)?;

    tracing::info!(
        "Opening session to {} ({})",
        profile.connection.target(),
        invocation.display_line()
    );

    if invocation.is_interactive() {
        return Ok(pty::run_interactive(&invocation)?);
    }

    let status = Command::new(&invocation.program)
        .args(&invocation.args)
        .envs(invocation.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .status()
        .map_err(|e| AppError::Process(format!("Failed to run {}: {}", invocation.program, e)))?;
    Ok(status.code().unwrap_or(-1))
}
