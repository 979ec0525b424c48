use tracing_subscriber::EnvFilter;

fn is_json_mode_args() -> bool {
    std::env::args().any(|arg| arg == "--json")
}

fn report(err: &sniffly_view::CliError) {
    if err.message.trim().starts_with('{') {
        eprintln!("{}", err.message);
    } else if is_json_mode_args() {
        eprintln!("{}", err.to_json());
    } else {
        eprintln!("{err}");
    }
}

fn main() -> anyhow::Result<()> {
    // Load .env early; ignore if missing.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let raw_args: Vec<String> = std::env::args().collect();
    let parsed = match sniffly_view::parse_cli(raw_args) {
        Ok(parsed) => parsed,
        Err(err) if err.code == 0 => return Ok(()),
        Err(err) => {
            report(&err);
            std::process::exit(err.code);
        }
    };

    if let Err(err) = sniffly_view::run_with_parsed(parsed) {
        report(&err);
        std::process::exit(err.code);
    }
    Ok(())
}
