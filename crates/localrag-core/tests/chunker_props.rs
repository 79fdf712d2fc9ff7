use proptest::prelude::*;

use localrag_core::chunker::TextSplitter;

/// Distinct, whitespace-free lines so overlaps can be located unambiguously.
fn lines() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z]{1,24}", 0..60)
        .prop_map(|words| words.into_iter().enumerate().map(|(i, w)| format!("{i}{w}")).collect())
}

/// Stitch chunks back together by dropping the longest prefix of each chunk
/// that repeats the tail of what has been rebuilt so far.
fn stitch(chunks: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for chunk in chunks {
        let pieces: Vec<String> = chunk.split('\n').map(str::to_string).collect();
        let max = pieces.len().min(out.len());
        let shared = (0..=max)
            .rev()
            .find(|&m| out[out.len() - m..] == pieces[..m])
            .unwrap_or(0);
        out.extend(pieces.into_iter().skip(shared));
    }
    out
}

proptest! {
    #[test]
    fn chunks_cover_every_line_exactly_once(
        lines in lines(),
        size in 8usize..120,
        overlap_pct in 0usize..90,
    ) {
        let overlap = size * overlap_pct / 100;
        let splitter = TextSplitter::new(size, overlap, "\n").unwrap();
        let chunks = splitter.split_text(&lines.join("\n"));

        prop_assert_eq!(stitch(&chunks), lines);
    }

    #[test]
    fn chunks_respect_size_unless_single_piece(
        lines in lines(),
        size in 8usize..120,
        overlap_pct in 0usize..90,
    ) {
        let overlap = size * overlap_pct / 100;
        let splitter = TextSplitter::new(size, overlap, "\n").unwrap();
        for chunk in splitter.split_text(&lines.join("\n")) {
            prop_assert!(chunk.chars().count() <= size || !chunk.contains('\n'));
        }
    }
}
