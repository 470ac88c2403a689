//! End-to-end pipeline tests with deterministic encoders.

use std::collections::BTreeSet;
use std::sync::Arc;

use kwcluster::processing::parse_volume_f64;
use kwcluster::{
    ClusterRequest, ClusteringMethod, ClusteringOutput, Config, DetailLevel, KeywordInput,
};

use super::support::{
    hdbscan_pipeline, linked_pipeline, topic_keywords, unavailable_pipeline, TableScorer,
};

fn texts(output: &ClusteringOutput) -> Vec<String> {
    let mut all: Vec<String> = output
        .clusters
        .iter()
        .flat_map(|c| c.keywords.iter().map(|k| k.text.clone()))
        .collect();
    all.sort();
    all
}

#[tokio::test]
async fn test_every_keyword_appears_exactly_once() {
    let inputs = topic_keywords();
    let output = hdbscan_pipeline(&Config::default())
        .run(ClusterRequest::new(inputs.clone()))
        .await
        .unwrap();

    let mut expected: Vec<String> = inputs.iter().map(|k| k.text.clone()).collect();
    expected.sort();
    assert_eq!(texts(&output), expected);
    assert_eq!(output.summary.total_keywords_processed, inputs.len());
    assert_eq!(output.summary.total_clusters_found, output.clusters.len());
    assert!(output.unclustered_keywords.is_empty());
}

#[tokio::test]
async fn test_volume_is_conserved() {
    let inputs = topic_keywords();
    let input_volume: u64 = inputs.iter().map(|k| k.volume).sum();

    for level in [DetailLevel::Coarse, DetailLevel::Balanced, DetailLevel::Fine] {
        let output = hdbscan_pipeline(&Config::default())
            .run(ClusterRequest::new(inputs.clone()).with_level(level))
            .await
            .unwrap();

        let clustered: u64 = output.clusters.iter().map(|c| c.total_volume_topic).sum();
        assert_eq!(clustered, input_volume, "level {}", level);
        for cluster in &output.clusters {
            let members: u64 = cluster.keywords.iter().map(|k| k.volume).sum();
            assert_eq!(members, cluster.total_volume_topic);
        }
    }
}

#[tokio::test]
async fn test_clusters_sorted_by_volume_with_unique_names() {
    let output = hdbscan_pipeline(&Config::default())
        .run(ClusterRequest::new(topic_keywords()))
        .await
        .unwrap();

    let volumes: Vec<u64> = output.clusters.iter().map(|c| c.total_volume_topic).collect();
    assert!(volumes.windows(2).all(|w| w[0] >= w[1]));

    let names: BTreeSet<&str> = output.clusters.iter().map(|c| c.cluster_name.as_str()).collect();
    assert_eq!(names.len(), output.clusters.len());

    for cluster in &output.clusters {
        for keyword in &cluster.keywords {
            assert!((0.0..=100.0).contains(&keyword.matching_point));
        }
    }
}

#[tokio::test]
async fn test_runs_are_deterministic() {
    let config = Config::default();
    let first = hdbscan_pipeline(&config)
        .run(ClusterRequest::new(topic_keywords()))
        .await
        .unwrap();
    let second = hdbscan_pipeline(&config)
        .run(ClusterRequest::new(topic_keywords()))
        .await
        .unwrap();

    assert_eq!(
        serde_json::to_value(&first).unwrap(),
        serde_json::to_value(&second).unwrap()
    );
}

#[tokio::test]
async fn test_higher_noise_threshold_never_reduces_noise() {
    let mut loose = Config::default();
    loose.clustering.noise_threshold = 0.3;
    let mut strict = Config::default();
    strict.clustering.noise_threshold = 0.95;

    let request = ClusterRequest::new(topic_keywords()).with_level(DetailLevel::Fine);
    let loose_out = hdbscan_pipeline(&loose).run(request.clone()).await.unwrap();
    let strict_out = hdbscan_pipeline(&strict).run(request).await.unwrap();

    assert!(
        strict_out.summary.noise_keywords_found >= loose_out.summary.noise_keywords_found,
        "strict {} < loose {}",
        strict_out.summary.noise_keywords_found,
        loose_out.summary.noise_keywords_found
    );
}

#[tokio::test]
async fn test_small_input_skips_reduction() {
    let inputs = vec![
        KeywordInput::new("giá vàng", 10),
        KeywordInput::new("giá vàng sjc", 8),
        KeywordInput::new("laptop cũ", 6),
        KeywordInput::new("laptop gaming", 4),
        KeywordInput::new("thời tiết", 2),
    ];
    let output = hdbscan_pipeline(&Config::default())
        .run(ClusterRequest::new(inputs.clone()))
        .await
        .unwrap();

    assert_eq!(output.keyword_count(), inputs.len());
    assert_eq!(
        output.clusters.iter().map(|c| c.total_volume_topic).sum::<u64>(),
        30
    );
}

#[tokio::test]
async fn test_related_pair_and_unrelated_singleton() {
    let request = ClusterRequest::new(vec![
        KeywordInput::new("giá vàng", 100),
        KeywordInput::new("giá vàng sjc", 90),
        KeywordInput::new("thời tiết", 5),
    ])
    .with_level(DetailLevel::Balanced);

    let output = linked_pipeline(&Config::default()).run(request).await.unwrap();

    assert_eq!(output.clusters.len(), 2);
    let gold = output.cluster("giá vàng").unwrap();
    assert_eq!(gold.total_volume_topic, 190);
    assert_eq!(gold.keywords.len(), 2);
    assert_eq!(gold.keywords[0].matching_point, 100.0);

    let weather = output.cluster("thời tiết").unwrap();
    assert_eq!(weather.keywords.len(), 1);
    assert_eq!(weather.keywords[0].matching_point, 100.0);

    assert_eq!(output.clusters[0].cluster_name, "giá vàng");
    assert_eq!(output.summary.noise_keywords_found, 1);
    assert_eq!(output.summary.noise_volume, 5);
    assert_eq!(output.summary.top10_cluster_volume_percent, 100.0);
}

#[tokio::test]
async fn test_serp_method_falls_back_to_semantic() {
    let inputs = vec![
        KeywordInput::new("giá vàng", 100),
        KeywordInput::new("giá vàng sjc", 90),
        KeywordInput::new("thời tiết", 5),
    ];
    let pipeline = linked_pipeline(&Config::default());

    let semantic = pipeline.run(ClusterRequest::new(inputs.clone())).await.unwrap();
    let serp = pipeline
        .run(ClusterRequest::new(inputs).with_method(ClusteringMethod::Serp))
        .await
        .unwrap();

    assert_eq!(semantic, serp);
}

#[tokio::test]
async fn test_empty_input_gives_empty_output() {
    let output = hdbscan_pipeline(&Config::default())
        .run(ClusterRequest::new(vec![]))
        .await
        .unwrap();

    assert!(output.clusters.is_empty());
    assert!(output.unclustered_keywords.is_empty());
    assert_eq!(output.summary.total_keywords_processed, 0);
    assert_eq!(output.summary.total_clusters_found, 0);
    assert_eq!(output.summary.noise_keywords_found, 0);
    assert_eq!(output.summary.noise_volume, 0);
}

#[test]
fn test_lenient_volumes() {
    let request: ClusterRequest = serde_json::from_str(
        r#"{
            "keywords": [
                {"text": "a", "volume": "1,234"},
                {"text": "b", "volume": "N/A"},
                {"text": "c"}
            ],
            "level": "trung bình"
        }"#,
    )
    .unwrap();

    let volumes: Vec<u64> = request.keywords.iter().map(|k| k.volume).collect();
    assert_eq!(volumes, vec![1234, 0, 0]);
    assert_eq!(request.level, Some(DetailLevel::Balanced));
    assert_eq!(parse_volume_f64(f64::NAN), 0);
}

#[tokio::test]
async fn test_unavailable_encoder_fails_without_output() {
    let result = unavailable_pipeline(&Config::default())
        .run(ClusterRequest::new(vec![KeywordInput::new("giá vàng", 1)]))
        .await;

    let err = result.unwrap_err();
    assert!(err.is_unavailable());
}

#[tokio::test]
async fn test_refiner_keeps_anchor_and_evicts_rejected() {
    let scorer = TableScorer {
        scores: vec![("giá vàng sjc".to_string(), 1.0)],
        default: -10.0,
    };
    let pipeline = linked_pipeline(&Config::default()).with_scorer(Arc::new(scorer));

    let output = pipeline
        .run(ClusterRequest::new(vec![
            KeywordInput::new("giá vàng", 100),
            KeywordInput::new("giá vàng sjc", 90),
            KeywordInput::new("vàng 9999", 80),
        ]))
        .await
        .unwrap();

    let gold = output.cluster("giá vàng").unwrap();
    let members: Vec<&str> = gold.keywords.iter().map(|k| k.text.as_str()).collect();
    assert_eq!(members, vec!["giá vàng", "giá vàng sjc"]);
    assert_eq!(gold.keywords[1].matching_point, 50.0);

    let evicted = output.cluster("vàng 9999").unwrap();
    assert_eq!(evicted.keywords.len(), 1);
    assert_eq!(evicted.keywords[0].matching_point, 100.0);

    assert_eq!(output.keyword_count(), 3);
    assert_eq!(output.summary.noise_keywords_found, 1);
    assert_eq!(output.summary.noise_volume, 80);
}

#[tokio::test]
async fn test_refiner_rejecting_everything_keeps_anchor() {
    let scorer = TableScorer {
        scores: Vec::new(),
        default: -10.0,
    };
    let pipeline = linked_pipeline(&Config::default()).with_scorer(Arc::new(scorer));

    let output = pipeline
        .run(ClusterRequest::new(vec![
            KeywordInput::new("giá vàng", 100),
            KeywordInput::new("giá vàng sjc", 90),
            KeywordInput::new("vàng 9999", 80),
        ]))
        .await
        .unwrap();

    assert_eq!(output.clusters.len(), 3);
    assert_eq!(output.cluster("giá vàng").unwrap().keywords.len(), 1);
    assert_eq!(output.summary.noise_keywords_found, 2);
    assert_eq!(output.summary.noise_volume, 170);
}

fn members(output: &ClusteringOutput, name: &str) -> Vec<String> {
    output
        .cluster(name)
        .map(|c| c.keywords.iter().map(|k| k.text.clone()).collect())
        .unwrap_or_default()
}

#[tokio::test]
async fn test_hdbscan_groups_related_pair() {
    let request = ClusterRequest::new(vec![
        KeywordInput::new("giá vàng", 100),
        KeywordInput::new("giá vàng sjc", 90),
        KeywordInput::new("thời tiết", 5),
    ])
    .with_level(DetailLevel::Balanced);

    let output = hdbscan_pipeline(&Config::default()).run(request).await.unwrap();

    assert_eq!(output.clusters.len(), 2);
    assert_eq!(output.clusters[0].cluster_name, "giá vàng");
    assert_eq!(output.clusters[0].total_volume_topic, 190);
    assert_eq!(members(&output, "giá vàng"), vec!["giá vàng", "giá vàng sjc"]);
    assert_eq!(output.clusters[0].keywords[0].matching_point, 100.0);
    assert_eq!(members(&output, "thời tiết"), vec!["thời tiết"]);
    assert_eq!(output.summary.noise_keywords_found, 1);
    assert_eq!(output.summary.noise_volume, 5);
}

#[tokio::test]
async fn test_hdbscan_groups_five_keywords() {
    let inputs = vec![
        KeywordInput::new("giá vàng", 10),
        KeywordInput::new("giá vàng sjc", 8),
        KeywordInput::new("laptop cũ", 6),
        KeywordInput::new("laptop gaming", 4),
        KeywordInput::new("thời tiết", 2),
    ];
    let output = hdbscan_pipeline(&Config::default())
        .run(ClusterRequest::new(inputs))
        .await
        .unwrap();

    let shape: Vec<(&str, usize, u64)> = output
        .clusters
        .iter()
        .map(|c| (c.cluster_name.as_str(), c.keywords.len(), c.total_volume_topic))
        .collect();
    assert_eq!(
        shape,
        vec![("giá vàng", 2, 18), ("laptop cũ", 2, 10), ("thời tiết", 1, 2)]
    );
}

#[tokio::test]
async fn test_hdbscan_recovers_topic_groups() {
    let output = hdbscan_pipeline(&Config::default())
        .run(ClusterRequest::new(topic_keywords()))
        .await
        .unwrap();

    let names: Vec<&str> = output.clusters.iter().map(|c| c.cluster_name.as_str()).collect();
    assert_eq!(
        names,
        vec!["giá vàng hôm nay", "laptop gaming", "thời tiết hà nội", "du lịch phú quốc"]
    );

    let stems = ["giá vàng", "laptop", "thời tiết", "du lịch"];
    for (cluster, stem) in output.clusters.iter().zip(stems) {
        assert_eq!(cluster.keywords.len(), 10, "cluster {}", cluster.cluster_name);
        assert!(
            cluster.keywords.iter().all(|k| k.text.starts_with(stem)),
            "cluster {} mixes topics",
            cluster.cluster_name
        );
    }
    assert_eq!(output.summary.noise_keywords_found, 0);
}
