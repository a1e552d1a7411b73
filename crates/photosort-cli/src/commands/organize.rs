//! The `organize` command: scan, embed, cluster, print.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use tokio::sync::watch;

use photosort_core::{
    spawn_cluster_worker, ClusterEngine, Coordinator, EmbeddingStore, FreezeManager,
    PipelineConfig, Producer, ProducerGate, ProjectStore,
};
use photosort_embeddings::{spawn_inference_worker, FsImageOpener, ProjectionEmbedder};
use photosort_storage::RocksDbProjectStore;

use crate::present::{render_table, ClusterSetView, TerminalPresenter};
use crate::scanner::{self, METADATA_DIR};

/// Arguments for `photosort organize`.
#[derive(Args, Debug)]
pub struct OrganizeArgs {
    /// Image folder to organize
    pub folder: PathBuf,

    /// Project name (defaults to the folder name)
    #[arg(long)]
    pub project: Option<String>,

    /// Number of clusters
    #[arg(long, default_value_t = photosort_core::DEFAULT_K)]
    pub k: usize,

    /// Representative dedup threshold in [0, 1]
    #[arg(long, default_value_t = photosort_core::DEFAULT_DEDUP_THRESHOLD)]
    pub threshold: f32,

    /// Flush cadence in records
    #[arg(long, default_value_t = photosort_core::DEFAULT_REFRESH_INTERVAL)]
    pub refresh_interval: usize,

    /// Embedding batch size
    #[arg(long, default_value_t = photosort_core::DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Lloyd's iteration cap
    #[arg(long, default_value_t = photosort_core::DEFAULT_ITERATION_CAP)]
    pub iteration_cap: usize,

    /// Embedding dimension of the built-in projection model
    #[arg(long, default_value_t = 128)]
    pub dimension: usize,

    /// Seed for reproducible runs
    #[arg(long)]
    pub seed: Option<u64>,

    /// Print the final clusters as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

/// Run the organize pipeline to completion.
pub async fn run(args: OrganizeArgs) -> Result<()> {
    if !args.folder.is_dir() {
        bail!("{} is not a directory", args.folder.display());
    }
    let project = match &args.project {
        Some(name) => name.clone(),
        None => args
            .folder
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string()),
    };
    if project.contains('|') {
        bail!("project name must not contain '|'");
    }

    let mut config = PipelineConfig::default()
        .with_k(args.k)
        .with_threshold(args.threshold)
        .with_refresh_interval(args.refresh_interval)
        .with_batch_size(args.batch_size)
        .with_iteration_cap(args.iteration_cap);
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }
    config.validate().context("invalid configuration")?;

    // Durable store lives inside the metadata directory.
    let db_path = args.folder.join(METADATA_DIR).join("db");
    std::fs::create_dir_all(&db_path)
        .with_context(|| format!("failed to create {}", db_path.display()))?;
    let project_store =
        Arc::new(RocksDbProjectStore::open(&db_path).context("failed to open project store")?);

    // Resume prior session state, if any.
    let records = project_store
        .records_for_project(&project)
        .context("failed to load prior records")?;
    let manifest = project_store
        .get_manifest(&project)
        .context("failed to load manifest")?;
    let store = EmbeddingStore::load_from(records, manifest.as_ref())
        .context("stored records are inconsistent")?;
    // Skip everything the prior session already embedded or excluded
    // (exclusions include inputs that failed to open or embed).
    let processed = store.resume_skip_paths();
    tracing::info!(
        project,
        resumed_records = store.len(),
        skipped = processed.len(),
        "session state loaded"
    );

    let all_paths = scanner::scan(&args.folder)?;
    if all_paths.is_empty() {
        bail!("no images found under {}", args.folder.display());
    }

    // Workers and coordinator.
    let presenter = Arc::new(TerminalPresenter::new(true));
    let (embedder, _inference_join) = spawn_inference_worker(Box::new(ProjectionEmbedder::new(
        args.dimension,
        config.seed.unwrap_or(0x70686f746f),
    )));
    let (cluster_handle, _cluster_join) = spawn_cluster_worker(ClusterEngine::new(&config));
    let (coordinator, _coordinator_join) = Coordinator::spawn(
        store,
        FreezeManager::from_config(&config),
        cluster_handle,
        presenter.clone(),
        project_store,
        project.as_str(),
        &config,
    );

    // Producer runs on this task until the pool drains.
    let opener = Arc::new(FsImageOpener::new(&args.folder));
    let (refresh_tx, refresh_rx) = watch::channel(config.refresh_interval);
    let (_gate, state_rx) = ProducerGate::new();
    let producer = Producer::new(
        &config,
        opener,
        Arc::new(embedder),
        coordinator.clone(),
        presenter,
        refresh_rx,
        state_rx,
    );
    let report = producer
        .run(all_paths, processed)
        .await
        .context("embedding pipeline failed")?;
    drop(refresh_tx);

    coordinator.wait_idle().await?;
    let latest = coordinator.latest_clusters().await?;
    coordinator.shutdown().await.ok();

    match latest {
        Some(set) if !set.is_empty() => {
            if args.json {
                let view = ClusterSetView::from(&set);
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                println!("{}", render_table(&set));
            }
        }
        _ => println!("no clusters (no valid images)"),
    }
    if report.failed_batches > 0 {
        eprintln!(
            "warning: {} batch(es) failed to embed and were skipped",
            report.failed_batches
        );
    }
    Ok(())
}
