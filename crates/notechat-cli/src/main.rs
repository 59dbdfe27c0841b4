mod cli;
mod commands;

use clap::Parser;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut stdout = std::io::stdout().lock();

    if let Err(e) = commands::run(cli, &mut stdout).await {
        log::error!("{e}");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
