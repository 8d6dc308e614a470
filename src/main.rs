use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use sshdeck::config::{self, commands as config_commands};
use sshdeck::error::{AppError, SerializableError};
use sshdeck::files::ServiceEvent;
use sshdeck::keychain::commands as keychain_commands;
use sshdeck::ssh::commands as ssh_commands;
use sshdeck::transfer::{commands as transfer_commands, RemoteFileEntry, TransferError};
use sshdeck::{logging, AppState};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration directory (defaults to the platform config dir)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Print results and errors as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List saved hosts
    Hosts,
    /// Import hosts from an OpenSSH config file
    Import { file: PathBuf },
    /// Export hosts as OpenSSH config (stdout when no file is given)
    Export { file: Option<PathBuf> },
    /// Show the client argument vector for a host
    Argv { host: String },
    /// Show a shell command line for launching a host in another terminal
    TerminalCommand { host: String },
    /// Open an interactive session
    Connect { host: String },
    /// List a remote directory
    Ls {
        host: String,
        #[arg(default_value = ".")]
        path: String,
    },
    /// Print the head of a remote file
    Cat { host: String, path: String },
    /// Download a remote file or folder
    Get {
        host: String,
        remote: String,
        local: PathBuf,
        #[arg(short, long)]
        recursive: bool,
    },
    /// Upload a local file or folder into a remote directory
    Put {
        host: String,
        local: PathBuf,
        #[arg(default_value = ".")]
        remote_dir: String,
    },
    /// Create a remote folder
    Mkdir { host: String, path: String },
    /// Rename a remote item
    Mv { host: String, from: String, to: String },
    /// Delete a remote item
    Rm {
        host: String,
        path: String,
        #[arg(short, long)]
        recursive: bool,
    },
    /// Delete a saved host and its stored password
    Remove { host: String },
    /// Store a host password in the keychain
    SetPassword { host: String },
    /// Remove a stored host password
    ForgetPassword { host: String },
    /// Browse a directory with auto refresh
    Watch {
        host: String,
        path: Option<String>,
        /// Stop after this many refresh ticks
        #[arg(long, default_value_t = 3)]
        ticks: u32,
        /// Refresh interval in seconds (1-60)
        #[arg(long)]
        interval: Option<i32>,
    },
}

#[derive(Serialize)]
struct Message<'a> {
    message: &'a str,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let json = cli.json;

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            report_error(&err, json);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => config::get_config_dir()?,
    };
    let state = AppState::new(&config_dir)
        .with_context(|| format!("Failed to load configuration from {}", config_dir.display()))?;
    let filter = state.settings.read().logging.filter.clone();
    logging::init_tracing(&filter);

    let json = cli.json;
    match cli.command {
        Command::Hosts => {
            let profiles = config_commands::list_profiles(&state);
            if json {
                print_json(&profiles)?;
            } else {
                for profile in profiles {
                    let connection = &profile.connection;
                    println!(
                        "{}\t{}:{}\t{:?}\t{}",
                        profile.name,
                        connection.target(),
                        connection.effective_port(),
                        connection.protocol,
                        profile.file_transfer.backend
                    );
                }
            }
        }
        Command::Import { file } => {
            let imported = config_commands::import_ssh_config_file(&state, &file)?;
            if json {
                print_json(&imported)?;
            } else {
                println!("Imported {} host(s)", imported.len());
            }
        }
        Command::Export { file: Some(file) } => {
            config_commands::export_ssh_config_file(&state, &file)?;
            say(json, &format!("Exported to {}", file.display()))?;
        }
        Command::Export { file: None } => {
            print!("{}", config_commands::export_ssh_config(&state));
        }
        Command::Argv { host } => {
            let invocation = ssh_commands::connection_argv(&state, &host)?;
            if json {
                let mut argv = vec![invocation.program.clone()];
                argv.extend(invocation.args.iter().cloned());
                print_json(&argv)?;
            } else {
                println!("{}", invocation.display_line());
            }
        }
        Command::TerminalCommand { host } => {
            let command = ssh_commands::terminal_command(&state, &host)?;
            say(json, &command)?;
        }
        Command::Connect { host } => {
            let code = ssh_commands::open_session(&state, &host)?;
            return Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)));
        }
        Command::Ls { host, path } => {
            let entries = transfer_commands::list_directory(&state, &host, &path)?;
            if json {
                print_json(&entries)?;
            } else {
                print_entries(&entries);
            }
        }
        Command::Cat { host, path } => {
            let content = transfer_commands::preview_file(&state, &host, &path)?;
            if json {
                print_json(&Message { message: &content })?;
            } else {
                println!("{}", content);
            }
        }
        Command::Get {
            host,
            remote,
            local,
            recursive,
        } => {
            transfer_commands::download(&state, &host, &remote, &local, recursive)?;
            say(json, "Download completed")?;
        }
        Command::Put {
            host,
            local,
            remote_dir,
        } => {
            transfer_commands::upload(&state, &host, &local, &remote_dir)?;
            say(json, "Upload completed")?;
        }
        Command::Mkdir { host, path } => {
            transfer_commands::make_directory(&state, &host, &path)?;
            say(json, "Folder created")?;
        }
        Command::Mv { host, from, to } => {
            transfer_commands::rename_item(&state, &host, &from, &to)?;
            say(json, "Rename completed")?;
        }
        Command::Rm {
            host,
            path,
            recursive,
        } => {
            transfer_commands::delete_item(&state, &host, &path, recursive)?;
            say(json, "Delete completed")?;
        }
        Command::Remove { host } => {
            let profile = state.profile(&host)?;
            config_commands::delete_profile(&state, &profile.id)?;
            say(json, &format!("Removed {}", profile.name))?;
        }
        Command::SetPassword { host } => {
            let profile = state.profile(&host)?;
            let secret = rpassword::prompt_password(format!("Password for {}: ", profile.name))
                .context("Failed to read password")?;
            keychain_commands::store_password(state.credentials.as_ref(), &profile.id, &secret)?;
            say(json, "Password stored")?;
        }
        Command::ForgetPassword { host } => {
            let profile = state.profile(&host)?;
            keychain_commands::forget_password(state.credentials.as_ref(), &profile.id)?;
            say(json, "Password removed")?;
        }
        Command::Watch {
            host,
            path,
            ticks,
            interval,
        } => watch(&state, &host, path, ticks, interval, json)?,
    }

    Ok(ExitCode::SUCCESS)
}

/// Drive the file service until `ticks` auto refreshes have been applied
fn watch(
    state: &AppState,
    host: &str,
    path: Option<String>,
    ticks: u32,
    interval: Option<i32>,
    json: bool,
) -> anyhow::Result<()> {
    let mut profile = state.profile(host)?;
    if let Some(path) = path {
        profile.file_transfer.remote_root_path = path;
    }
    if let Some(seconds) = interval {
        profile.file_transfer.auto_refresh_seconds = seconds;
    }

    let mut service = state.file_service()?;
    service.activate(Some(profile));

    let mut seen = 0;
    loop {
        for event in service.wait(Duration::from_secs(1)) {
            if json {
                print_json(&event)?;
            }
            match &event {
                ServiceEvent::Tick => seen += 1,
                ServiceEvent::Listed { .. } if !json => {
                    println!("{}", service.status());
                    print_entries(service.entries());
                }
                ServiceEvent::ListFailed { message, .. } if !json => eprintln!("{}", message),
                _ => {}
            }
        }
        if seen >= ticks && !service.busy() {
            break;
        }
    }
    Ok(())
}

fn print_entries(entries: &[RemoteFileEntry]) {
    for entry in entries {
        let kind = if entry.is_directory { 'd' } else { '-' };
        println!(
            "{} {:>12} {:<14} {}",
            kind, entry.size_text, entry.modified_text, entry.name
        );
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn say(json: bool, message: &str) -> anyhow::Result<()> {
    if json {
        print_json(&Message { message })
    } else {
        println!("{}", message);
        Ok(())
    }
}

fn report_error(err: &anyhow::Error, json: bool) {
    let serializable = if let Some(app) = err.downcast_ref::<AppError>() {
        SerializableError::from(app)
    } else if let Some(transfer) = err.downcast_ref::<TransferError>() {
        SerializableError {
            code: "TRANSFER_ERROR".to_string(),
            message: transfer.message.clone(),
        }
    } else {
        SerializableError {
            code: "ERROR".to_string(),
            message: format!("{:#}", err),
        }
    };

    if json {
        match serde_json::to_string_pretty(&serializable) {
            Ok(text) => eprintln!("{}", text),
            Err(_) => eprintln!("{}", serializable.message),
        }
    } else {
        eprintln!("Error: {}", serializable.message);
    }
}
