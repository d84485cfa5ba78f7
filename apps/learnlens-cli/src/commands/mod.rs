mod account;
mod data;

use anyhow::{Context, Result};
use clap::Subcommand;
use learnlens_auth::Session;
use serde::Serialize;

use account::{LoginArgs, RegisterArgs};

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Log in and store the session tokens
    Login(LoginArgs),
    /// Revoke the stored session and forget its tokens
    Logout,
    /// Create a new account (does not log in)
    Register(RegisterArgs),
    /// Show the current user's profile
    #[command(visible_alias = "whoami")]
    Profile,
    /// Check whether the stored session is still valid
    Status,
    /// Show the learning dashboard
    Dashboard,
    /// Show personalised insights
    Insights,
    /// List enrolled courses
    Courses,
}

/// Run a command that talks to the API.
///
/// # Errors
///
/// Any failure of the command, with context for the user.
pub async fn run(command: Commands, session: &Session) -> Result<()> {
    match command {
        Commands::Login(args) => account::login(session, args).await,
        Commands::Logout => {
            session.logout().await;
            println!("Logged out.");
            Ok(())
        }
        Commands::Register(args) => account::register(session, args).await,
        Commands::Profile => account::profile(session).await,
        Commands::Status => account::status(session).await,
        Commands::Dashboard => data::dashboard(session).await,
        Commands::Insights => data::insights(session).await,
        Commands::Courses => data::courses(session).await,
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render output")?;
    println!("{rendered}");
    Ok(())
}
