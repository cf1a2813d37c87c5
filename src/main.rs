fn main() {
    if let Err(err) = taskclock_lib::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
