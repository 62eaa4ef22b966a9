use colored::Colorize;

fn main() {
    if let Err(e) = docpulse::run() {
        let err = anyhow::Error::new(e);
        eprintln!("{} {:#}", "error:".bright_red().bold(), err);
        std::process::exit(1);
    }
}
