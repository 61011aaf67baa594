//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

fn main() {
    if let Err(err) = placemark_cli::run() {
        eprintln!("placemark: {err}");
        std::process::exit(1);
    }
}
