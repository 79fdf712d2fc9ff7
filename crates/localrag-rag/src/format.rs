use localrag_core::types::RetrievalResult;

pub const NO_RESULTS: &str = "No relevant content retrieved";

/// Human-readable listing of retrieval results, numbered from 1.
pub fn format_results(results: &[RetrievalResult]) -> String {
    if results.is_empty() {
        return NO_RESULTS.to_string();
    }
    results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            format!(
                "[Result {}]\nContent: {}\nSource: {}\nDistance: {:.4}\n",
                i + 1,
                r.text,
                r.source_file,
                r.distance
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
