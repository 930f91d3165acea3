use std::process::exit;

fn main() {
    if let Err(e) = eodsummary::app::run_cli() {
        eprintln!("{e}");
        exit(1);
    }
}
