use colored::Colorize;

fn main() {
    if let Err(e) = s2f_recipe::run() {
        eprintln!("{} {}", "Error:".red(), e);
        for cause in e.chain().skip(1) {
            eprintln!("  {} {}", "caused by:".red(), cause);
        }
        std::process::exit(1);
    }
}
