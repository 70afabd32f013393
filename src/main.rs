use packplan::cli;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(cli::log_filter(std::env::var(cli::LOG_ENV).ok().as_deref()))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = cli::run_cli() {
        eprintln!("Error: {}", e);

        // Print the error chain
        for cause in e.chain().skip(1) {
            eprintln!("Caused by: {}", cause);
        }

        std::process::exit(1);
    }
}
