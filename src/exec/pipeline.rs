/// Run pipeline
/// acquire temp files -> report header -> data file -> verify -> harness ->
/// raw output + footer -> release. Release happens on every exit path; the
/// report itself is never deleted.
use crate::config::settings::Settings;
use crate::config::types::{AuditError, Result, RunConfig, RunOutcome};
use crate::exec::datafile::{verify_data_file, write_data_file, DataFileHeader};
use crate::exec::harness::HarnessInvocation;
use crate::kernel::signal::CancelToken;
use crate::safety::workspace::RunFiles;
use crate::source::RandomSource;
use crate::utils::report::ReportWriter;
use log::{info, warn};
use std::time::Instant;

/// Everything one run threads through its stages
pub struct RunContext<'a> {
    pub config: &'a RunConfig,
    pub settings: &'a Settings,
    pub cancel: &'a CancelToken,
}

impl<'a> RunContext<'a> {
    pub fn new(config: &'a RunConfig, settings: &'a Settings, cancel: &'a CancelToken) -> Self {
        Self {
            config,
            settings,
            cancel,
        }
    }

    /// Run the whole pipeline with `source` filling the data file
    pub fn execute(&self, source: &mut dyn RandomSource) -> Result<RunOutcome> {
        let started = Instant::now();
        self.cancel.check()?;

        let mut files = RunFiles::acquire(
            &self.config.program_name,
            &self.settings.temp_dir(),
            &self.settings.volatile_dir(),
        )?;

        let outcome = self.run_stages(&files, source, started);
        let released = files.release();

        match (outcome, released) {
            (Ok(outcome), Ok(())) => Ok(outcome),
            (Ok(_), Err(cleanup)) => Err(cleanup),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(cleanup)) => {
                warn!("Cleanup after failed run also failed: {}", cleanup);
                Err(e)
            }
        }
    }

    fn run_stages(
        &self,
        files: &RunFiles,
        source: &mut dyn RandomSource,
        started: Instant,
    ) -> Result<RunOutcome> {
        let report_path = self.config.report_path(&self.settings.temp_dir());
        let mut report = ReportWriter::create(&report_path, self.config)?;
        info!("Report: {}", report_path.display());

        let header = DataFileHeader::new(
            self.settings.generator_name.clone(),
            self.settings.seed,
            self.config.length,
        );
        let summary = write_data_file(
            files.data(),
            &header,
            source,
            self.cancel,
            self.settings.progress_interval,
        )?;
        if summary.substituted > 0 {
            warn!(
                "{} of {} draws were substituted with OS entropy",
                summary.substituted, summary.lines
            );
        }

        let verified = verify_data_file(files.data())?;
        info!("Data file verified: {} values", verified.count);
        self.cancel.check()?;

        let invocation = HarnessInvocation {
            program: self.settings.harness_program.clone(),
            leading_args: self.settings.harness_args.clone(),
            test_selector: self.config.test_selector.clone(),
            data_file: files.data().to_path_buf(),
        };
        let harness_result = invocation.run(files.scratch_mem(), files.scratch_err(), self.cancel);

        // Keep whatever the harness printed, even when it failed
        report.append_raw(files.scratch_mem())?;
        if let Err(e) = harness_result {
            if let Some(signal) = self.cancel.pending() {
                return Err(AuditError::Interrupted { signal });
            }
            return Err(e);
        }

        let elapsed = started.elapsed();
        let report_path = report.finish(self.config, elapsed, summary.lines, summary.substituted)?;

        Ok(RunOutcome {
            report_path,
            samples: summary.lines,
            substituted: summary.substituted,
            elapsed,
        })
    }
}
