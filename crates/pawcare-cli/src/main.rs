use clap::{Parser, Subcommand};

mod app;
mod commands;

#[derive(Parser)]
#[command(name = "pawcare-cli", version, about = "PawCare CLI")]
struct Cli {
    /// Default log filter, overridden by RUST_LOG (e.g. "debug")
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in, sign out and inspect the session
    Auth {
        #[command(subcommand)]
        action: commands::auth::AuthAction,
    },
    /// Encode and inspect reminder recurrence rules
    Reminder {
        #[command(subcommand)]
        action: commands::reminder::ReminderAction,
    },
    /// XP and level calculations
    Level {
        #[command(subcommand)]
        action: commands::level::LevelAction,
    },
    /// Invoke a backend operation as the signed-in user
    Call(commands::call::CallArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn main() {
    let cli = Cli::parse();
    pawcare_core::logging::init_with_level(&cli.log_level);

    let result = match cli.command {
        Commands::Auth { action } => commands::auth::run(action),
        Commands::Reminder { action } => commands::reminder::run(action),
        Commands::Level { action } => commands::level::run(action),
        Commands::Call(args) => commands::call::run(args),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
