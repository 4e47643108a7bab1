fn main() -> std::process::ExitCode {
    blockforge::cli::run()
}
