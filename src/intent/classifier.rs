//! Rule-first, embedding-fallback intent classifier.

use std::sync::LazyLock;

use regex::Regex;
use tokio::sync::OnceCell;

use crate::cache::CachedEmbedder;
use crate::clustering::similarity::cosine_similarity;
use crate::error::Result;

use super::{IntentLabel, SubIntent};

/// Minimum prototype similarity for the embedding fallback (exclusive).
pub const SEMANTIC_THRESHOLD: f64 = 0.4;

// ============================================================================
// Rule table
// ============================================================================

/// Sub-intents in evaluation order with their trigger phrases.
///
/// Matching is plain substring search on lowercased text, so short triggers
/// such as "app" or "hay" also fire inside longer words.
const RULES: &[(SubIntent, &[&str])] = &[
    (
        SubIntent::Buy,
        &["mua", "bán", "order", "đặt hàng", "thanh lý", "cần tìm", "cung cấp"],
    ),
    (
        SubIntent::Price,
        &["giá", "chi phí", "bao nhiêu tiền", "bảng giá", "báo giá", "tốn bao nhiêu"],
    ),
    (
        SubIntent::Discount,
        &["khuyến mãi", "giảm giá", "voucher", "coupon", "deal", "ưu đãi"],
    ),
    (
        SubIntent::Definition,
        &["là gì", "ý nghĩa", "khái niệm", "định nghĩa", "thế nào là"],
    ),
    (
        SubIntent::Guide,
        &["cách", "hướng dẫn", "mẹo", "bí quyết", "làm sao", "như thế nào", "các bước"],
    ),
    (
        SubIntent::Knowledge,
        &[
            "tài liệu",
            "giáo trình",
            "bài tập",
            "lý thuyết",
            "công thức",
            "kiến thức",
            "tìm hiểu",
            "nguyên lý",
        ],
    ),
    (
        SubIntent::Review,
        &["review", "đánh giá", "có tốt không", "trải nghiệm", "trên tay", "uy tín không"],
    ),
    (
        SubIntent::Comparison,
        &["so sánh", "khác nhau", "hay", "vs", "phân biệt"],
    ),
    (
        SubIntent::BestList,
        &["top", "tốt nhất", "xếp hạng", "đáng mua", "bán chạy", "hot nhất"],
    ),
    (
        SubIntent::Location,
        &["địa chỉ", "ở đâu", "tại đâu", "shop", "cửa hàng", "trung tâm", "chi nhánh"],
    ),
    (
        SubIntent::Brand,
        &["website", "trang chủ", "đăng nhập", "login", "facebook", "fanpage", "chính hãng"],
    ),
    (
        SubIntent::Download,
        &["tải", "download", "app", "ứng dụng", "cài đặt", "apk", "ios", "android"],
    ),
];

/// Representative phrase per sub-intent for the embedding fallback.
const PROTOTYPES: &[(SubIntent, &str)] = &[
    (SubIntent::Buy, "mua hàng đặt hàng online"),
    (SubIntent::Price, "giá bao nhiêu tiền bảng giá"),
    (SubIntent::Discount, "khuyến mãi giảm giá voucher"),
    (SubIntent::Definition, "là gì định nghĩa khái niệm"),
    (SubIntent::Guide, "hướng dẫn cách làm mẹo"),
    (SubIntent::Knowledge, "tài liệu kiến thức bài tập"),
    (SubIntent::Review, "review đánh giá nhận xét"),
    (SubIntent::Comparison, "so sánh phân biệt khác nhau"),
    (SubIntent::BestList, "top tốt nhất xếp hạng"),
    (SubIntent::Location, "địa chỉ cửa hàng ở đâu"),
    (SubIntent::Brand, "trang chủ website chính hãng"),
    (SubIntent::Download, "tải download ứng dụng"),
];

static RULE_PATTERNS: LazyLock<Vec<(SubIntent, Regex)>> = LazyLock::new(|| {
    RULES
        .iter()
        .map(|(sub, triggers)| {
            let alternation = triggers
                .iter()
                .map(|t| regex::escape(t))
                .collect::<Vec<_>>()
                .join("|");
            (*sub, Regex::new(&alternation).expect("Invalid regex"))
        })
        .collect()
});

// ============================================================================
// Intent Classifier
// ============================================================================

/// Labels keywords with an intent pair.
///
/// Prototype embeddings are computed at most once per classifier, on the
/// first batch that has an embedder available.
#[derive(Debug, Default)]
pub struct IntentClassifier {
    prototypes: OnceCell<Vec<(SubIntent, Vec<f32>)>>,
}

impl IntentClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rule-only classification.
    pub fn classify_rules(&self, text: &str) -> Option<IntentLabel> {
        let lowered = text.to_lowercase();
        RULE_PATTERNS
            .iter()
            .find(|(_, pattern)| pattern.is_match(&lowered))
            .map(|(sub, _)| IntentLabel::of(*sub))
    }

    /// Classify one keyword; falls back to prototypes when they are loaded
    /// and an embedding is supplied.
    pub fn classify(&self, text: &str, embedding: Option<&[f32]>) -> IntentLabel {
        if let Some(label) = self.classify_rules(text) {
            return label;
        }

        if let (Some(embedding), Some(prototypes)) = (embedding, self.prototypes.get()) {
            let mut best: Option<(SubIntent, f64)> = None;
            for (sub, proto) in prototypes {
                let sim = cosine_similarity(embedding, proto);
                if best.map_or(true, |(_, b)| sim > b) {
                    best = Some((*sub, sim));
                }
            }
            if let Some((sub, sim)) = best {
                if sim > SEMANTIC_THRESHOLD {
                    return IntentLabel::of(sub);
                }
            }
        }

        IntentLabel::uncategorized()
    }

    /// Compute prototype embeddings if not already done.
    pub async fn ensure_prototypes(&self, embedder: &CachedEmbedder) -> Result<()> {
        self.prototypes
            .get_or_try_init(|| async {
                tracing::info!("Calculating intent prototype embeddings");
                let texts: Vec<String> = PROTOTYPES.iter().map(|(_, t)| t.to_string()).collect();
                let vectors = embedder.embed(&texts).await?;
                Ok::<_, crate::error::KwClusterError>(
                    PROTOTYPES
                        .iter()
                        .map(|(sub, _)| *sub)
                        .zip(vectors)
                        .collect(),
                )
            })
            .await?;
        Ok(())
    }

    /// Whether prototype embeddings are loaded.
    pub fn has_prototypes(&self) -> bool {
        self.prototypes.initialized()
    }

    /// Classify a batch.
    ///
    /// When an embedder is supplied the prototypes are loaded first; if that
    /// fails the batch is classified by rules alone.
    pub async fn classify_batch(
        &self,
        texts: &[String],
        embeddings: Option<&[Vec<f32>]>,
        embedder: Option<&CachedEmbedder>,
    ) -> Vec<IntentLabel> {
        if let Some(embedder) = embedder {
            if let Err(e) = self.ensure_prototypes(embedder).await {
                tracing::warn!(error = %e, "Intent prototypes unavailable, using rules only");
            }
        }

        texts
            .iter()
            .enumerate()
            .map(|(i, text)| {
                let embedding = embeddings.and_then(|e| e.get(i)).map(|v| v.as_slice());
                self.classify(text, embedding)
            })
            .collect()
    }
}
