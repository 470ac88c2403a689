//! Keyword file to CSV report, end to end.

use std::io::Write;

use tempfile::TempDir;

use kwcluster::error::{InputError, KwClusterError};
use kwcluster::export::{to_csv_string, write_csv_file};
use kwcluster::{load_keywords_from_file, ClusterRequest, Config};

use super::support::linked_pipeline;

/// UTF-16LE with BOM, tab separated, as exported by Keyword Planner.
fn write_planner_export(dir: &TempDir) -> std::path::PathBuf {
    let content = "Keyword\tCurrency\tAvg. monthly searches\tCompetition\n\
                   giá vàng\tVND\t1,000\tHigh\n\
                   giá vàng sjc\tVND\t900\tHigh\n\
                   \tVND\t50\tLow\n\
                   thời tiết\tVND\t--\tLow\n";
    let mut bytes = vec![0xFF, 0xFE];
    for unit in content.encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }

    let path = dir.path().join("planner.csv");
    std::fs::File::create(&path).unwrap().write_all(&bytes).unwrap();
    path
}

#[test]
fn test_planner_export_is_loaded() {
    let dir = TempDir::new().unwrap();
    let keywords = load_keywords_from_file(write_planner_export(&dir)).unwrap();

    let rows: Vec<(&str, u64)> = keywords.iter().map(|k| (k.text.as_str(), k.volume)).collect();
    assert_eq!(
        rows,
        vec![("giá vàng", 1000), ("giá vàng sjc", 900), ("thời tiết", 0)]
    );
}

#[test]
fn test_semicolon_export_with_vietnamese_headers() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vi.csv");
    std::fs::write(&path, "Từ khóa;Số lượng tìm kiếm\nmua laptop;120\nlaptop cũ;80\n").unwrap();

    let keywords = load_keywords_from_file(&path).unwrap();
    assert_eq!(keywords.len(), 2);
    assert_eq!(keywords[0].text, "mua laptop");
    assert_eq!(keywords[1].volume, 80);
}

#[test]
fn test_missing_keyword_column_lists_columns() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.csv");
    std::fs::write(&path, "Term,Clicks\nfoo,1\n").unwrap();

    match load_keywords_from_file(&path) {
        Err(KwClusterError::Input(InputError::MissingKeywordColumn { columns })) => {
            assert!(columns.iter().any(|c| c == "Term"));
        }
        other => panic!("unexpected result: {:?}", other.map(|k| k.len())),
    }
}

#[tokio::test]
async fn test_file_to_csv_report() {
    let dir = TempDir::new().unwrap();
    let keywords = load_keywords_from_file(write_planner_export(&dir)).unwrap();

    let output = linked_pipeline(&Config::default())
        .run(ClusterRequest::new(keywords))
        .await
        .unwrap();

    let csv = to_csv_string(&output).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(
        lines[0],
        "Topic,Keyword,Volume,Total Volume Topic,Similarity,Intent,Sub-Intent"
    );
    assert_eq!(lines.len(), 4);
    assert!(lines[1].starts_with("giá vàng,giá vàng,1000,1900,100.0,"));
    assert!(lines[3].starts_with("thời tiết,thời tiết,0,0,100.0,"));

    let path = dir.path().join("report.csv");
    write_csv_file(&output, &path).unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), csv);
}
