fn main() {
    match mk::run::run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("mk: {:#}", err);
            std::process::exit(1);
        }
    }
}
