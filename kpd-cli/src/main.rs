//! Entry point for the `kpd` simulator binary.
//!
//! Parses arguments, runs the requested simulation, writes the report and
//! maps failures to a non-zero exit status. Logging is installed first so
//! every later step can emit structured diagnostics.

use std::io::{self, BufWriter, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use kpd_cli::{
    cli::{Cli, CliError, emit, run_cli},
    logging::{self, LoggingError},
};
use tracing::{error, field};

fn try_main() -> Result<()> {
    let cli = Cli::parse();
    let execution = run_cli(cli).context("failed to execute command")?;
    let stdout = io::stdout();
    let mut writer = BufWriter::new(stdout.lock());
    emit(&execution, &mut writer).context("failed to write report")?;
    writer.flush().context("failed to flush output")?;
    Ok(())
}

fn main() -> ExitCode {
    if let Err(err) = logging::init_logging() {
        report_logging_init_error(&err);
        return ExitCode::FAILURE;
    }

    if let Err(err) = try_main() {
        let (code, pool_code, optimizer_code) = err
            .downcast_ref::<CliError>()
            .and_then(|cli_error| match cli_error {
                CliError::Core(core) => {
                    Some((Some(core.code()), core.pool_code(), core.optimizer_code()))
                }
                _ => None,
            })
            .unwrap_or((None, None, None));

        error!(
            error = %err,
            code = code.map(|code| field::display(code.as_str())),
            pool_code = pool_code.map(|code| field::display(code.as_str())),
            optimizer_code = optimizer_code.map(|code| field::display(code.as_str())),
            "command execution failed"
        );
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

#[expect(
    clippy::print_stderr,
    reason = "Emit one-off diagnostic before tracing is initialized"
)]
fn report_logging_init_error(err: &LoggingError) {
    eprintln!("failed to initialize logging: {err}");
}
