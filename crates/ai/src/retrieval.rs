//! Lexical relevance scoring over archived reference documents.

use serde::Serialize;

use caseflow_core::KnowledgeDocument;

/// Default number of hits the pipeline asks for.
pub const DEFAULT_TOP_K: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredDocument {
    pub document: KnowledgeDocument,
    pub score: f64,
}

/// Score `documents` against `query` and keep the best `top_k`.
///
/// Score is the summed occurrence count of each whitespace-separated query term in
/// the lowercased `title body`. A document with no term hits but containing the
/// whole query scores exactly 1.0. Zero scores are dropped; ties keep input order.
pub fn score_documents<'a, I>(query: &str, documents: I, top_k: usize) -> Vec<ScoredDocument>
where
    I: IntoIterator<Item = &'a KnowledgeDocument>,
{
    let normalized = query.trim().to_lowercase();
    if normalized.is_empty() || top_k == 0 {
        return Vec::new();
    }
    let terms: Vec<&str> = normalized.split_whitespace().collect();

    let mut scored: Vec<ScoredDocument> = documents
        .into_iter()
        .filter_map(|doc| {
            let haystack = format!("{} {}", doc.title, doc.body).to_lowercase();
            let mut score = terms
                .iter()
                .map(|term| haystack.matches(term).count())
                .sum::<usize>() as f64;
            if score == 0.0 && haystack.contains(&normalized) {
                score = 1.0;
            }
            (score > 0.0).then(|| ScoredDocument {
                document: doc.clone(),
                score,
            })
        })
        .collect();

    // stable: equal scores keep store order
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(top_k);
    scored
}

/// Human-readable context block for the inference call, `None` without hits.
pub fn assemble_context(hits: &[ScoredDocument]) -> Option<String> {
    if hits.is_empty() {
        return None;
    }
    let blocks: Vec<String> = hits
        .iter()
        .enumerate()
        .map(|(i, hit)| {
            format!(
                "[{}] {} (source: {} {}, score: {})\n{}",
                i + 1,
                hit.document.title,
                hit.document.source,
                hit.document.source_version,
                hit.score,
                hit.document.body
            )
        })
        .collect();
    Some(blocks.join("\n\n"))
}
