fn main() {
    if let Err(err) = ecgconv::run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
