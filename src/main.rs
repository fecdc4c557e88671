fn main() {
    if let Err(error) = daygrid::run() {
        eprintln!("daygrid: {error}");
        std::process::exit(1);
    }
}
