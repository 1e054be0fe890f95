mod cli;

use clap::Parser;
use colored::Colorize;

use cli::{Cli, Commands};

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Fee {
            sender,
            transfer_type,
            amount,
        } => cli::fee::run(&sender, &transfer_type, amount),
        Commands::Key {
            sender,
            timestamp,
            amount,
            body,
        } => cli::key::run(&sender, &timestamp, amount, &body),
        Commands::Sweep {
            db,
            retention_minutes,
        } => cli::sweep::run(db.as_deref(), retention_minutes),
    };

    if let Err(e) = result {
        eprintln!("{} {e}", "error:".red());
        std::process::exit(1);
    }
}
