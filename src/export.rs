//! CSV export of clustering results.

use std::io::Write;
use std::path::Path;

use crate::clustering::ClusteringOutput;
use crate::error::{KwClusterError, Result};

/// Column headers, in order.
pub const CSV_HEADER: [&str; 7] = [
    "Topic",
    "Keyword",
    "Volume",
    "Total Volume Topic",
    "Similarity",
    "Intent",
    "Sub-Intent",
];

/// Write one row per keyword, clusters in output order.
pub fn write_csv<W: Write>(output: &ClusteringOutput, writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(CSV_HEADER).map_err(csv_error)?;

    for cluster in &output.clusters {
        let total = cluster.total_volume_topic.to_string();
        for keyword in &cluster.keywords {
            let volume = keyword.volume.to_string();
            let similarity = format!("{:.1}", keyword.matching_point);
            csv.write_record([
                cluster.cluster_name.as_str(),
                keyword.text.as_str(),
                volume.as_str(),
                total.as_str(),
                similarity.as_str(),
                keyword.intent.as_str(),
                keyword.sub_intent.as_str(),
            ])
            .map_err(csv_error)?;
        }
    }

    csv.flush()?;
    Ok(())
}

/// Render the CSV into a string.
pub fn to_csv_string(output: &ClusteringOutput) -> Result<String> {
    let mut buf = Vec::new();
    write_csv(output, &mut buf)?;
    String::from_utf8(buf).map_err(|e| KwClusterError::Io(std::io::Error::other(e)))
}

/// Write the CSV to `path`, replacing any existing file.
pub fn write_csv_file(output: &ClusteringOutput, path: impl AsRef<Path>) -> Result<()> {
    let file = std::fs::File::create(path.as_ref())?;
    write_csv(output, std::io::BufWriter::new(file))
}

fn csv_error(e: csv::Error) -> KwClusterError {
    match e.into_kind() {
        csv::ErrorKind::Io(io) => KwClusterError::Io(io),
        other => KwClusterError::Io(std::io::Error::other(format!("{:?}", other))),
    }
}
