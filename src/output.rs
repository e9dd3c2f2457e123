use std::io::{self, Write};

use serde::Serialize;

use crate::app::{
    BuildResult, DownloadResult, MaterializeResult, ProcessResult, ProgressEvent, ProgressSink,
    RunResult, VerifyResult,
};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

/// Machine-readable output: progress is dropped, results go to stdout as JSON.
pub struct JsonOutput;

impl JsonOutput {
    pub fn print<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Human-readable output: progress lines on stderr, a summary on stdout.
pub struct ConsoleOutput;

impl ProgressSink for ConsoleOutput {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => eprintln!("{} ({} ms)", event.message, elapsed.as_millis()),
            None => eprintln!("{}", event.message),
        }
    }
}

pub trait Summary {
    fn summary_lines(&self) -> Vec<String>;
}

impl ConsoleOutput {
    pub fn print_summary(result: &dyn Summary) {
        let cyan = "\x1b[36m";
        let reset = "\x1b[0m";
        println!("{cyan}KIRA-TOX summary{reset}");
        for line in result.summary_lines() {
            println!("  {line}");
        }
    }
}

impl Summary for DownloadResult {
    fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!(
                "datasets matching \"{}\": {}",
                self.filter_word, self.datasets
            ),
            format!("overview: {}", self.overview_path),
        ];
        if let Some(path) = &self.gene_set_library_path {
            lines.push(format!("gene set library: {path}"));
        }
        lines
    }
}

impl Summary for MaterializeResult {
    fn summary_lines(&self) -> Vec<String> {
        vec![
            format!(
                "datasets: {} (downloaded {}, resumed {})",
                self.datasets, self.downloaded, self.resumed
            ),
            format!("manifest: {}", self.manifest_path),
        ]
    }
}

impl Summary for ProcessResult {
    fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("datasets processed: {}", self.datasets),
            format!(
                "distinct DEGs: {} (rows without symbol: {})",
                self.distinct_degs, self.missing_symbols
            ),
            format!(
                "genes queried: {} (skipped: {})",
                self.queried_genes,
                self.skipped_genes.len()
            ),
            format!("pathway rows: {} -> {}", self.pathway_rows, self.pathways_path),
        ];
        for skipped in &self.skipped_genes {
            lines.push(format!("skipped {}: {}", skipped.gene_symbol, skipped.reason));
        }
        lines
    }
}

impl Summary for VerifyResult {
    fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![format!("temposeq datasets: {}", self.datasets)];
        for count in &self.manifests {
            lines.push(format!("{} files: {}", count.manifest, count.entries));
        }
        lines.push(format!("marker: {}", self.marker_path));
        lines
    }
}

impl Summary for BuildResult {
    fn summary_lines(&self) -> Vec<String> {
        self.files
            .iter()
            .map(|file| format!("{} -> {} ({} rows)", file.source, file.destination, file.rows))
            .collect()
    }
}

impl Summary for RunResult {
    fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        lines.extend(self.download.summary_lines());
        lines.extend(self.materialize.summary_lines());
        lines.extend(self.process.summary_lines());
        lines.extend(self.verify.summary_lines());
        lines.extend(self.build.summary_lines());
        lines
    }
}
