use clap::Parser;

use release_train::cli::{self, Cli};
use release_train::ui;

fn main() {
    let args = Cli::parse();

    if let Err(e) = cli::run(args) {
        ui::display_error(&e.to_string());
        std::process::exit(1);
    }
}
