use std::fmt;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};

/// The ten pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    DownloadImage,
    EncodeImage,
    DescribeArchitecture,
    DescribeModules,
    DeploymentSequence,
    ModulePrompts,
    GenerateModules,
    StagingPrompt,
    StagingFile,
    Archive,
}

impl PipelineStage {
    pub const ALL: [PipelineStage; 10] = [
        PipelineStage::DownloadImage,
        PipelineStage::EncodeImage,
        PipelineStage::DescribeArchitecture,
        PipelineStage::DescribeModules,
        PipelineStage::DeploymentSequence,
        PipelineStage::ModulePrompts,
        PipelineStage::GenerateModules,
        PipelineStage::StagingPrompt,
        PipelineStage::StagingFile,
        PipelineStage::Archive,
    ];

    /// Completion percentage once this stage has finished.
    pub fn percent(self) -> u8 {
        let index = Self::ALL.iter().position(|s| *s == self).unwrap_or(0);
        ((index + 1) * 10) as u8
    }

    pub fn label(self) -> &'static str {
        match self {
            PipelineStage::DownloadImage => "Image downloaded",
            PipelineStage::EncodeImage => "Image encoded",
            PipelineStage::DescribeArchitecture => "Architecture described",
            PipelineStage::DescribeModules => "Modules described",
            PipelineStage::DeploymentSequence => "Deployment sequence ready",
            PipelineStage::ModulePrompts => "Module prompts built",
            PipelineStage::GenerateModules => "Module stacks generated",
            PipelineStage::StagingPrompt => "Staging prompt built",
            PipelineStage::StagingFile => "Staging file generated",
            PipelineStage::Archive => "Archive created",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Receives one report after each completed stage, plus per-module
/// notices while the module chains run.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, stage: PipelineStage, percent: u8);

    fn module_event(&self, _module_name: &str, _notice: &str) {}

    fn finish(&self) {}
}

impl<F> ProgressReporter for F
where
    F: Fn(PipelineStage, u8) + Send + Sync,
{
    fn report(&self, stage: PipelineStage, percent: u8) {
        self(stage, percent)
    }
}

/// Writes progress to the log only.
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn report(&self, stage: PipelineStage, percent: u8) {
        info!("[{:>3}%] {}", percent, stage);
    }

    fn module_event(&self, module_name: &str, notice: &str) {
        info!("{}: {}", module_name, notice);
    }
}

/// Terminal progress bar.
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(100);
        if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {bar:40.cyan/blue} {pos:>3}% {msg}") {
            bar.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "✓"]));
        }
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_message("Starting");
        Self { bar }
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for BarProgress {
    fn report(&self, stage: PipelineStage, percent: u8) {
        info!("[{:>3}%] {}", percent, stage);
        self.bar.set_position(u64::from(percent));
        self.bar.set_message(stage.label());
    }

    fn module_event(&self, module_name: &str, notice: &str) {
        debug!("{}: {}", module_name, notice);
        self.bar.set_message(format!("{}: {}", module_name, notice));
    }

    fn finish(&self) {
        self.bar.finish_with_message("Done");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn percentages_step_by_ten() {
        let percents: Vec<u8> = PipelineStage::ALL.iter().map(|s| s.percent()).collect();
        assert_eq!(percents, [10, 20, 30, 40, 50, 60, 70, 80, 90, 100]);
    }

    #[test]
    fn closures_report_progress() {
        let seen = Mutex::new(Vec::new());
        let reporter = |stage: PipelineStage, percent: u8| seen.lock().unwrap().push((stage, percent));
        reporter.report(PipelineStage::Archive, 100);
        assert_eq!(seen.into_inner().unwrap(), [(PipelineStage::Archive, 100)]);
    }
}
