use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = varcon::app::parse_cli();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(varcon::app::default_log_level(cli.verbose)),
    )
    .init();

    match varcon::app::run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}
