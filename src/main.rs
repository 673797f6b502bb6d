use clap::Parser;

use zennit::cli::Cli;

fn main() {
    let cli = Cli::parse();
    if let Err(err) = zennit::run(cli) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}
