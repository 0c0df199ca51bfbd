mod cli;
mod commands;
mod env_loader;
mod error;
mod github;
mod logging;
mod stats;

fn main() {
    env_loader::load_dotenv();

    if let Err(err) = cli::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
