fn main() {
    if let Err(e) = smelter_cli::run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
