mod cli;
mod collision;
mod config;
mod diagnostics;
mod emit;
mod ir;
mod logging;
mod output;
mod rules;
mod schema;
mod testrun;

fn main() {
    std::process::exit(cli::run());
}
