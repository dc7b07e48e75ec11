use clap::Subcommand;
use serde_json::json;

use crate::app::{block_on, App, CliResult};

#[derive(Subcommand)]
pub enum AuthAction {
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Sign out and forget the stored session
    Logout,
    /// Show whether a session is active and when its token expires
    Status,
    /// Exchange the stored refresh token for a new access token
    Refresh,
}

pub fn run(action: AuthAction) -> CliResult {
    let app = App::open()?;
    block_on(async move {
        match action {
            AuthAction::Login { email, password } => login(&app, &email, &password).await,
            AuthAction::Logout => logout(&app).await,
            AuthAction::Status => status(&app).await,
            AuthAction::Refresh => refresh(&app).await,
        }
    })?
}

async fn login(app: &App, email: &str, password: &str) -> CliResult {
    let response = app.dispatcher.login(email, password).await?;
    if !response.success {
        let reason = response.message.unwrap_or_else(|| "login refused".into());
        return Err(reason.into());
    }
    println!("signed in as {email}");
    Ok(())
}

async fn logout(app: &App) -> CliResult {
    app.resume().await?;
    app.dispatcher.logout().await?;
    println!("signed out");
    Ok(())
}

async fn status(app: &App) -> CliResult {
    app.resume().await?;
    let session = app.dispatcher.session();
    let progress = app.dispatcher.progress();
    let report = json!({
        "authenticated": session.is_authenticated(),
        "expiresAt": session.expires_at().map(|t| t.to_rfc3339()),
        "xp": app.dispatcher.experience().cumulative_xp,
        "level": progress.level,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn refresh(app: &App) -> CliResult {
    app.dispatcher.restore().await?;
    match app.dispatcher.session().expires_at() {
        Some(expiry) => println!("access token valid until {}", expiry.to_rfc3339()),
        None => println!("not authenticated"),
    }
    Ok(())
}
