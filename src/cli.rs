use crate::config::settings::Settings;
use crate::config::types::{
    AuditError, RunConfig, DEFAULT_LENGTH, DEFAULT_PROGRAM_NAME, DEFAULT_TEST_SELECTOR, EXIT_INTERNAL,
};
use crate::exec::pipeline::RunContext;
use crate::kernel::signal::SignalHandler;
use crate::source::build_source;
use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Fill a data file with random integers and run a statistical test harness against it",
    long_about = None,
    disable_help_flag = true,
    disable_version_flag = true
)]
struct Cli {
    /// Number of random samples to generate
    #[arg(default_value_t = DEFAULT_LENGTH, value_parser = clap::value_parser!(u64).range(1..))]
    length: u64,
    /// Test selector passed to the harness, e.g. "-d 204" (default: -a, all tests)
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    tests: Vec<String>,
}

impl Cli {
    fn test_selector(&self) -> String {
        if self.tests.is_empty() {
            DEFAULT_TEST_SELECTOR.to_string()
        } else {
            self.tests.join(" ")
        }
    }
}

/// Name this process was invoked as
fn program_name() -> String {
    std::env::args_os()
        .next()
        .as_deref()
        .and_then(|arg0| Path::new(arg0).file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_PROGRAM_NAME.to_string())
}

fn prepare(cli: &Cli, program_name: &str) -> Result<(RunConfig, Settings)> {
    let settings = Settings::load().context("loading settings")?;
    let config = RunConfig::new(cli.length, cli.test_selector(), program_name)
        .context("validating arguments")?;
    Ok((config, settings))
}

fn display_report(path: &Path) -> std::io::Result<()> {
    let mut report = std::fs::File::open(path)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    std::io::copy(&mut report, &mut out)?;
    out.flush()
}

fn report_failure(program_name: &str, err: &AuditError) {
    error!("Run failed: {}", err);
    eprintln!("{}: {}", program_name, err);
}

/// Entry point shared by the binary; returns the process exit status
pub fn run() -> i32 {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let program_name = program_name();

    let signals = match SignalHandler::install() {
        Ok(signals) => signals,
        Err(e) => {
            report_failure(&program_name, &e);
            return EXIT_INTERNAL;
        }
    };

    let (config, settings) = match prepare(&cli, &program_name) {
        Ok(prepared) => prepared,
        Err(e) => {
            eprintln!("{}: {:#}", program_name, e);
            return EXIT_INTERNAL;
        }
    };

    info!(
        "{}: length {}, tests \"{}\", source {:?}, harness {}",
        program_name, config.length, config.test_selector, settings.source, settings.harness_program
    );

    let mut source = match build_source(&settings) {
        Ok(source) => source,
        Err(e) => {
            report_failure(&program_name, &e);
            return e.exit_code();
        }
    };

    let cancel = signals.token();
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        RunContext::new(&config, &settings, &cancel).execute(&mut source)
    }));

    match result {
        Ok(Ok(outcome)) => {
            info!(
                "Finished {} samples in {}s; report at {}",
                outcome.samples,
                outcome.elapsed.as_secs(),
                outcome.report_path.display()
            );
            if settings.display_report {
                if let Err(e) = display_report(&outcome.report_path) {
                    warn!("Failed to display report {}: {}", outcome.report_path.display(), e);
                }
            }
            0
        }
        Ok(Err(e)) => {
            report_failure(&program_name, &e);
            e.exit_code()
        }
        Err(_) => {
            eprintln!("{}: unhandled internal failure", program_name);
            EXIT_INTERNAL
        }
    }
}
