//! Output formatting for CLI commands.
//!
//! Everything is printed either as pretty JSON or as human-readable text.

use std::path::Path;

use kwcluster::{ApiKeyEntry, ClusteringOutput, KeySummary};
use serde::Serialize;

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("Failed to serialize output: {}", e),
    }
}

/// Print a clustering result.
pub fn print_cluster_result(result: &ClusteringOutput, csv_path: &Path, json: bool) {
    if json {
        print_json(result);
        return;
    }

    println!();
    println!(
        "{:<50} {:>10} {:>8} INTENT",
        "TOPIC", "VOLUME", "SIZE"
    );
    println!("{}", "-".repeat(90));

    for cluster in &result.clusters {
        let name = if cluster.cluster_name.chars().count() > 48 {
            let short: String = cluster.cluster_name.chars().take(45).collect();
            format!("{}...", short)
        } else {
            cluster.cluster_name.clone()
        };
        println!(
            "{:<50} {:>10} {:>8} {}",
            name,
            cluster.total_volume_topic,
            cluster.keywords.len(),
            cluster.dominant_intent.as_str()
        );
    }

    let summary = &result.summary;
    println!("\n--- Summary ---");
    println!("Total Keywords Processed: {}", summary.total_keywords_processed);
    println!("Total Clusters Found: {}", summary.total_clusters_found);
    println!("Top 10 Cluster Volume: {:.1}%", summary.top10_cluster_volume_percent);
    println!(
        "Unclustered (Noise) Keywords: {} (volume {})",
        summary.noise_keywords_found, summary.noise_volume
    );
    println!("\nResults written to {}", csv_path.display());
}

/// Print a newly issued key.
pub fn print_key_created(entry: &ApiKeyEntry, json: bool) {
    if json {
        print_json(entry);
    } else {
        println!("API key created for '{}'", entry.client_name);
        println!("Key: {}", entry.key);
        println!("Save this key now. It will only be shown masked from here on.");
    }
}

/// Print the key listing.
pub fn print_keys(keys: &[KeySummary], json: bool) {
    if json {
        print_json(keys);
        return;
    }

    if keys.is_empty() {
        println!("No API keys found.");
        return;
    }

    println!(
        "{:<20} {:<28} {:<8} KEY",
        "CLIENT", "CREATED", "ACTIVE"
    );
    println!("{}", "-".repeat(75));
    for key in keys {
        println!(
            "{:<20} {:<28} {:<8} {}",
            key.client_name,
            key.created_at,
            if key.active { "yes" } else { "no" },
            key.key_prefix
        );
    }
}

/// Print the outcome of a revoke.
pub fn print_revoked(client: &str, revoked: usize, json: bool) {
    if json {
        print_json(&serde_json::json!({ "client_name": client, "revoked": revoked }));
    } else if revoked == 0 {
        println!("Client '{}' not found.", client);
    } else {
        println!("Revoked {} key(s) for '{}'.", revoked, client);
    }
}
