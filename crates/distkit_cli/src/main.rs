//! Binary entrypoint for distkit.

fn main() {
    if let Err(err) = distkit_cli::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
