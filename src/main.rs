#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

mod accumulate;
mod artifacts;
mod cli;
mod config;
mod convert;
mod coverage;
mod emit;
mod error;
mod filter;
mod footprint;
mod interrupt;
mod output;
mod pipeline;
mod process;
mod read;
mod reference;
mod utils;

fn main() {
    // Set up configuration from CLI
    let cfg = match config::handle_cli() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(error::exit_code(&e))
        }
    };
    debug!("{:?}", cfg);

    interrupt::install_handlers();

    if let Err(e) = pipeline::run(&cfg) {
        let logged = log_enabled!(log::Level::Error);
        std::process::exit(error::report(&e, logged, &mut std::io::stderr()))
    }
}
