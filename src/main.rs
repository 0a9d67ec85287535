//! Binary entry point. All CLI logic lives in `astra::cli`.

fn main() {
    astra::cli::run();
}
