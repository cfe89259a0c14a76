use clap::Parser;

mod config;
mod keymap;
mod run;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let config = config::Config::parse();
    run::run(&config)
}
