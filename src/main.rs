// Proof-of-work ledger - CLI

use clap::Parser;
use pow_ledger::{Cli, CliHandler};

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let mut handler = match CliHandler::new(&cli.data_dir) {
        Ok(h) => h,
        Err(e) => {
            eprintln!("Error initializing: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = handler.handle(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
