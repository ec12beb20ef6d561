pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "huddle",
    about = "Huddle operator CLI",
    long_about = "Inspect Huddle configuration, run readiness checks, and try the phone normalizer and command classifier offline.",
    after_help = "Examples:\n  huddle doctor --json\n  huddle config\n  huddle phone \"(202) 555-0123\"\n  huddle classify \"/addplayer Jo\" --chat leadership"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, bot token shape, phone region, and executor endpoint")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Normalize a phone number and print the validation result as JSON")]
    Phone {
        text: String,
        #[arg(long, help = "Default region for numbers without a country code")]
        region: Option<String>,
    },
    #[command(about = "Classify a message against the built-in command catalog")]
    Classify {
        text: String,
        #[arg(long, default_value = "main", help = "Chat the message arrives in: main|leadership|private")]
        chat: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Phone { text, region } => commands::phone::run(&text, region.as_deref()),
        Command::Classify { text, chat } => commands::classify::run(&text, &chat),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
