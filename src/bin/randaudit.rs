fn main() {
    std::process::exit(randaudit::cli::run());
}
