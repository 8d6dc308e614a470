//! sshdeck compiles saved host profiles into `ssh`/`telnet` sessions and
//! `sftp`/`scp`/`curl` transfer invocations, parses their listings back into a
//! canonical model, and reads/writes OpenSSH config files.

pub mod config;
pub mod error;
pub mod files;
pub mod keychain;
pub mod logging;
pub mod process;
pub mod quoting;
pub mod ssh;
pub mod state;
pub mod transfer;

pub use error::{AppError, AppResult};
pub use state::AppState;
