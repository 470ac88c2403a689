//! CLI command handlers.

use std::path::PathBuf;

use anyhow::{Context, Result};
use kwcluster::{
    export::write_csv_file, load_keywords_from_file, ClusterRequest, ClusteringMethod,
    ClusteringPipeline, Config, DetailLevel, KeyStore,
};

use super::output;

/// Options for the cluster command.
#[derive(Debug, Clone)]
pub struct ClusterOptions {
    pub file: PathBuf,
    pub level: Option<DetailLevel>,
    pub min_cluster_size: Option<usize>,
    pub method: ClusteringMethod,
    pub output: Option<PathBuf>,
}

/// Run the cluster command: load, cluster, report, write CSV.
pub async fn run_cluster(config: Config, options: ClusterOptions, json_output: bool) -> Result<()> {
    let keywords = load_keywords_from_file(&options.file)
        .with_context(|| format!("Failed to load keywords from {}", options.file.display()))?;
    if !json_output {
        println!("Loaded {} keywords from {}", keywords.len(), options.file.display());
        println!("Loading AI model...");
    }

    let pipeline = ClusteringPipeline::from_config(&config).context("Failed to load encoder")?;

    let level = options.level.unwrap_or(pipeline.default_level());
    if !json_output {
        println!("Starting clustering with detail level: {}...", level);
    }

    let request = ClusterRequest::new(keywords)
        .with_level(level)
        .with_min_cluster_size(options.min_cluster_size)
        .with_method(options.method);
    let result = pipeline.run(request).await?;

    let path = options.output.unwrap_or_else(default_output_path);
    write_csv_file(&result, &path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    output::print_cluster_result(&result, &path, json_output);
    Ok(())
}

/// `clustering_result_<YYYYmmdd_HHMMSS>.csv` in the working directory.
pub fn default_output_path() -> PathBuf {
    PathBuf::from(format!(
        "clustering_result_{}.csv",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    ))
}

/// Issue a key for a client.
pub fn run_keys_create(config: &Config, client: &str, json_output: bool) -> Result<()> {
    let mut store = KeyStore::load(config.keys_file())?;
    let entry = store.create(client)?;
    output::print_key_created(&entry, json_output);
    Ok(())
}

/// List issued keys, masked.
pub fn run_keys_list(config: &Config, json_output: bool) -> Result<()> {
    let store = KeyStore::load(config.keys_file())?;
    output::print_keys(&store.list(), json_output);
    Ok(())
}

/// Deactivate every key of a client.
pub fn run_keys_revoke(config: &Config, client: &str, json_output: bool) -> Result<()> {
    let mut store = KeyStore::load(config.keys_file())?;
    let revoked = store.revoke(client)?;
    output::print_revoked(client, revoked, json_output);
    Ok(())
}
