fn main() {
    if let Err(e) = careline_lib::run() {
        eprintln!("careline: {e}");
        std::process::exit(1);
    }
}
