use std::time::{Duration, Instant};

use serde::Serialize;

use crate::catalog::CatalogClient;
use crate::columnar;
use crate::config::PipelineConfig;
use crate::deg::{DegCollector, extract_degs};
use crate::enrichr::EnrichmentClient;
use crate::error::KiraError;
use crate::manifest::{Ledger, WorkList, recorded_prefix};
use crate::pathways::{PathwayAccumulator, SkippedGene};
use crate::store::{Store, VERIFICATION_SUCCESS};
use crate::table::{OverviewTable, Table, expression_records};
use crate::verify::{ManifestCount, check_count};

#[derive(Debug, Clone, Default)]
pub struct MaterializeOptions {
    pub resume: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadResult {
    pub filter_word: String,
    pub datasets: usize,
    pub overview_path: String,
    pub manifest_path: String,
    pub gene_set_library_path: Option<String>,
    pub completed_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MaterializeResult {
    pub datasets: usize,
    pub downloaded: usize,
    pub resumed: usize,
    pub manifest_path: String,
    pub completed_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessResult {
    pub datasets: usize,
    pub distinct_degs: usize,
    pub missing_symbols: usize,
    pub queried_genes: usize,
    pub skipped_genes: Vec<SkippedGene>,
    pub pathway_rows: usize,
    pub pathways_path: String,
    pub manifest_path: String,
    pub completed_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyResult {
    pub datasets: usize,
    pub manifests: Vec<ManifestCount>,
    pub stale_marker_removed: bool,
    pub marker_path: String,
    pub completed_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuiltFile {
    pub source: String,
    pub destination: String,
    pub rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildResult {
    pub files: Vec<BuiltFile>,
    pub completed_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub download: DownloadResult,
    pub materialize: MaterializeResult,
    pub process: ProcessResult,
    pub verify: VerifyResult,
    pub build: BuildResult,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

fn emit(sink: &dyn ProgressSink, message: impl Into<String>) {
    sink.event(ProgressEvent {
        message: message.into(),
        elapsed: None,
    });
}

fn emit_done(sink: &dyn ProgressSink, message: impl Into<String>, start: Instant) {
    sink.event(ProgressEvent {
        message: message.into(),
        elapsed: Some(start.elapsed()),
    });
}

/// The five pipeline stages. Stages never hand data to each other in memory:
/// each one reads the artifacts and manifests of the previous stage from disk.
pub struct App<C: CatalogClient, E: EnrichmentClient> {
    config: PipelineConfig,
    store: Store,
    catalog: C,
    enrichr: E,
}

impl<C: CatalogClient, E: EnrichmentClient> App<C, E> {
    pub fn new(config: PipelineConfig, store: Store, catalog: C, enrichr: E) -> Self {
        Self {
            config,
            store,
            catalog,
            enrichr,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Catalog fetch & filter: writes the overview table and the catalog
    /// manifest, and optionally the gene-set library file.
    pub fn download(&self, sink: &dyn ProgressSink) -> Result<DownloadResult, KiraError> {
        let start = Instant::now();
        let catalog = &self.config.catalog;
        emit(
            sink,
            format!("phase=Download; fetching catalog {}", catalog.dataset_id),
        );
        let table = self
            .catalog
            .fetch_table(&catalog.dataset_id, &catalog.version)?;
        let total = table.len();
        let overview = OverviewTable::from_catalog(table, &self.config.filter_word)?;
        tracing::info!(
            catalog_rows = total,
            kept = overview.len(),
            filter = %self.config.filter_word,
            "catalog filtered"
        );

        let mut ledger = Ledger::create(&self.store.catalog_manifest_path())?;
        let overview_path = self.store.overview_path();
        overview.write(&overview_path)?;
        ledger.record(&overview_path)?;

        let gene_set_library_path = if self.config.enrichment.download_library {
            let library = &self.config.enrichment.gene_set_library;
            let path = self.store.gene_set_library_path(library);
            emit(sink, format!("phase=Download; fetching gene set library {library}"));
            let gmt = self.enrichr.download_library(library)?;
            Store::write_atomic(&path, gmt.as_bytes())?;
            Some(path.to_string())
        } else {
            None
        };

        emit_done(
            sink,
            format!("phase=Download; {} of {total} datasets selected", overview.len()),
            start,
        );
        Ok(DownloadResult {
            filter_word: self.config.filter_word.clone(),
            datasets: overview.len(),
            overview_path: overview_path.to_string(),
            manifest_path: ledger.path().to_string(),
            gene_set_library_path,
            completed_at: iso_timestamp(),
        })
    }

    /// Dataset materializer: one local table per overview row, recorded in the
    /// ledger only after the table is on disk.
    pub fn materialize(
        &self,
        options: MaterializeOptions,
        sink: &dyn ProgressSink,
    ) -> Result<MaterializeResult, KiraError> {
        let start = Instant::now();
        let overview = OverviewTable::read(&self.store.overview_path())?;
        let work = WorkList::from_overview(&overview, &self.store);
        let manifest_path = self.store.downloaded_manifest_path();

        let (mut ledger, resumed) = if options.resume {
            let (ledger, existing) = Ledger::resume(&manifest_path)?;
            match recorded_prefix(&existing, &work) {
                Some(done) => (ledger, done),
                None => {
                    tracing::warn!(
                        recorded = existing.len(),
                        "ledger does not match the overview, restarting materialization"
                    );
                    drop(ledger);
                    (Ledger::create(&manifest_path)?, 0)
                }
            }
        } else {
            (Ledger::create(&manifest_path)?, 0)
        };

        let mut downloaded = 0usize;
        for (index, item) in work.items().iter().enumerate().skip(resumed) {
            let dataset_id = &item.descriptor.dataset_id;
            emit(
                sink,
                format!(
                    "phase=Materialize; [{}/{}] {dataset_id}",
                    index + 1,
                    work.len()
                ),
            );
            let table = self
                .catalog
                .fetch_table(dataset_id.as_str(), &self.config.catalog.dataset_version)?;
            table.write_csv(&item.table_path)?;
            ledger.record(&item.table_path)?;
            downloaded += 1;
        }

        tracing::info!(
            datasets = work.len(),
            downloaded,
            resumed,
            "materialization finished"
        );
        emit_done(
            sink,
            format!("phase=Materialize; {} datasets recorded", ledger.recorded()),
            start,
        );
        Ok(MaterializeResult {
            datasets: work.len(),
            downloaded,
            resumed,
            manifest_path: manifest_path.to_string(),
            completed_at: iso_timestamp(),
        })
    }

    /// DEG/pathway enricher. Datasets are handled in overview order; each new
    /// significant symbol is queried once, and the dataset is recorded after
    /// its genes have been enriched.
    pub fn process(&self, sink: &dyn ProgressSink) -> Result<ProcessResult, KiraError> {
        let start = Instant::now();
        let overview = OverviewTable::read(&self.store.overview_path())?;
        let downloaded =
            ManifestCount::read("downloaded", &self.store.downloaded_manifest_path())?;
        check_count(overview.len(), &downloaded)?;
        emit(
            sink,
            "phase=Process; all temposeq datasets have been downloaded",
        );

        let pathways_path = self.store.pathways_path();
        Store::remove_if_exists(&pathways_path)?;

        let work = WorkList::from_overview(&overview, &self.store);
        let mut ledger = Ledger::create(&self.store.processed_manifest_path())?;
        let mut collector = DegCollector::new();
        let mut pathways = PathwayAccumulator::new();
        let library = &self.config.enrichment.gene_set_library;

        for (index, item) in work.items().iter().enumerate() {
            let table = Table::read_csv(&item.table_path)?;
            let records = expression_records(&table, &self.config.columns)?;
            let degs = extract_degs(&records, &self.config.thresholds);
            if degs.missing_symbols > 0 {
                tracing::warn!(
                    dataset = %item.descriptor.dataset_id,
                    dropped = degs.missing_symbols,
                    "significant rows without gene symbol dropped"
                );
            }
            let fresh = collector.add(degs);
            emit(
                sink,
                format!(
                    "phase=Process; [{}/{}] {} new genes in {}",
                    index + 1,
                    work.len(),
                    fresh.len(),
                    item.descriptor.dataset_id
                ),
            );
            pathways.enrich_genes(&self.enrichr, &fresh, library)?;
            ledger.record(&item.table_path)?;
        }

        let distinct_degs = collector.symbols().len();
        let queried_genes = pathways.queried();
        let skipped_genes = pathways.skipped().to_vec();
        let pathway_rows = pathways.rows().len();
        pathways.into_table().write_csv(&pathways_path)?;

        tracing::info!(
            datasets = work.len(),
            distinct_degs,
            skipped = skipped_genes.len(),
            pathway_rows,
            "processing finished"
        );
        emit_done(
            sink,
            format!(
                "phase=Process; {distinct_degs} genes, {} skipped, {pathway_rows} pathway rows",
                skipped_genes.len()
            ),
            start,
        );
        Ok(ProcessResult {
            datasets: work.len(),
            distinct_degs,
            missing_symbols: collector.missing_symbols(),
            queried_genes,
            skipped_genes,
            pathway_rows,
            pathways_path: pathways_path.to_string(),
            manifest_path: ledger.path().to_string(),
            completed_at: iso_timestamp(),
        })
    }

    /// Consistency verifier. Any previous marker is removed first, so after a
    /// failed run no marker exists.
    pub fn verify(&self, sink: &dyn ProgressSink) -> Result<VerifyResult, KiraError> {
        let start = Instant::now();
        let marker_path = self.store.verification_marker_path();
        let stale_marker_removed = Store::remove_if_exists(&marker_path)?;
        if stale_marker_removed {
            tracing::info!(marker = %marker_path, "previous verification marker deleted");
        }

        let overview = OverviewTable::read(&self.store.overview_path())?;
        let mut manifests = Vec::with_capacity(2);

        let downloaded =
            ManifestCount::read("downloaded", &self.store.downloaded_manifest_path())?;
        check_count(overview.len(), &downloaded)?;
        emit(
            sink,
            "phase=Verify; step 1 OK: all temposeq datasets have been downloaded",
        );
        manifests.push(downloaded);

        let processed = ManifestCount::read("processed", &self.store.processed_manifest_path())?;
        check_count(overview.len(), &processed)?;
        emit(
            sink,
            "phase=Verify; step 2 OK: all temposeq datasets have been processed",
        );
        manifests.push(processed);

        Store::write_atomic(&marker_path, VERIFICATION_SUCCESS.as_bytes())?;
        emit_done(sink, "phase=Verify; verification successful", start);
        Ok(VerifyResult {
            datasets: overview.len(),
            manifests,
            stale_marker_removed,
            marker_path: marker_path.to_string(),
            completed_at: iso_timestamp(),
        })
    }

    /// Columnar builder, gated on the verification marker.
    pub fn build(&self, sink: &dyn ProgressSink) -> Result<BuildResult, KiraError> {
        let start = Instant::now();
        let marker_path = self.store.verification_marker_path();
        if !marker_path.as_std_path().is_file() {
            return Err(KiraError::VerificationMissing(
                marker_path.as_std_path().to_path_buf(),
            ));
        }

        let mut sources = Ledger::read(&self.store.downloaded_manifest_path())?;
        sources.push(self.store.pathways_path());

        let mut files = Vec::with_capacity(sources.len());
        for (index, source) in sources.iter().enumerate() {
            let destination = self.store.columnar_path(source)?;
            emit(
                sink,
                format!(
                    "phase=Build; [{}/{}] {source} -> {destination}",
                    index + 1,
                    sources.len()
                ),
            );
            let rows = columnar::transcode(source, &destination)?;
            files.push(BuiltFile {
                source: source.to_string(),
                destination: destination.to_string(),
                rows,
            });
        }

        tracing::info!(files = files.len(), "columnar build finished");
        emit_done(
            sink,
            format!("phase=Build; {} parquet files written", files.len()),
            start,
        );
        Ok(BuildResult {
            files,
            completed_at: iso_timestamp(),
        })
    }

    /// Runs every stage in order, stopping at the first failure.
    pub fn run(
        &self,
        options: MaterializeOptions,
        sink: &dyn ProgressSink,
    ) -> Result<RunResult, KiraError> {
        let download = self.download(sink)?;
        let materialize = self.materialize(options, sink)?;
        let process = self.process(sink)?;
        let verify = self.verify(sink)?;
        let build = self.build(sink)?;
        Ok(RunResult {
            download,
            materialize,
            process,
            verify,
            build,
        })
    }
}

fn iso_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
