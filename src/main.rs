fn main() {
    if let Err(err) = tercord::cli::main() {
        eprintln!("❌ {err}");
        std::process::exit(1);
    }
}
