use std::io::{self, BufRead};

use anyhow::{Context, Result};
use clap::Args;
use learnlens_auth::{Registration, Session, SessionState};
use serde_json::json;

use super::print_json;

#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Account email
    #[arg(short, long)]
    email: String,

    /// Password; read from the first line of stdin when omitted
    #[arg(short, long)]
    password: Option<String>,
}

#[derive(Debug, Args)]
pub struct RegisterArgs {
    #[arg(long)]
    name: String,

    #[arg(long)]
    email: String,

    #[arg(long)]
    phone: String,

    #[arg(long)]
    city: String,

    /// Password; read from the first line of stdin when omitted
    #[arg(long)]
    password: Option<String>,

    /// Repeat of the password (defaults to `--password`)
    #[arg(long)]
    confirm_password: Option<String>,
}

fn read_password() -> Result<String> {
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read password from stdin")?;
    let password = line.trim_end_matches(['\r', '\n']).to_owned();
    if password.is_empty() {
        anyhow::bail!("no password given; pass --password or pipe it on stdin");
    }
    Ok(password)
}

pub(super) async fn login(session: &Session, args: LoginArgs) -> Result<()> {
    let password = match args.password {
        Some(password) => password,
        None => read_password()?,
    };

    let user = session.sign_in(&args.email, &password).await?;
    let name = user.name.as_deref().unwrap_or(&args.email);
    println!("Logged in as {name}.");
    Ok(())
}

pub(super) async fn register(session: &Session, args: RegisterArgs) -> Result<()> {
    let password = match args.password {
        Some(password) => password,
        None => read_password()?,
    };
    let form = Registration {
        name: args.name,
        email: args.email,
        phone: args.phone,
        city: args.city,
        confirm_password: args.confirm_password.unwrap_or_else(|| password.clone()),
        password,
    };

    let user_id = session.register(&form.into_new_user()?).await?;
    println!("Registered user {user_id}. Log in to continue.");
    Ok(())
}

pub(super) async fn profile(session: &Session) -> Result<()> {
    if !session.is_authenticated() {
        anyhow::bail!("not logged in; run `learnlens login` first");
    }
    let user = session.get_profile().await?;
    print_json(&user)
}

pub(super) async fn status(session: &Session) -> Result<()> {
    let report = match session.restore().await {
        SessionState::Authenticated(user) => json!({"state": "authenticated", "user": user}),
        SessionState::Expired => json!({"state": "expired"}),
        SessionState::Anonymous => json!({"state": "anonymous"}),
    };
    print_json(&report)
}
