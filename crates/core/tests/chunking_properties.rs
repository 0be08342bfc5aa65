//! Property tests for word-window chunking.

use pdf_qa_core::{chunk_words, normalize_text, ChunkingConfig};
use proptest::prelude::*;

fn arb_config() -> impl Strategy<Value = ChunkingConfig> {
    (1usize..24)
        .prop_flat_map(|size| (Just(size), 0..size))
        .prop_map(|(size, overlap)| ChunkingConfig { size, overlap })
}

fn arb_words() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec("[a-z]{1,6}", 0..80)
}

fn words_of(chunk: &str) -> Vec<&str> {
    chunk.split_whitespace().collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn chunk_count_follows_the_stride(words in arb_words(), config in arb_config()) {
        let chunks = chunk_words(&words.join(" "), config).unwrap();
        let n = words.len();
        let stride = config.size - config.overlap;

        let expected = if n == 0 {
            1
        } else {
            n.saturating_sub(config.overlap).div_ceil(stride).max(1)
        };
        prop_assert_eq!(chunks.len(), expected);
    }

    #[test]
    fn neighbours_share_exactly_the_overlap(words in arb_words(), config in arb_config()) {
        let chunks = chunk_words(&words.join(" "), config).unwrap();

        for pair in chunks.windows(2) {
            let left = words_of(&pair[0]);
            let right = words_of(&pair[1]);
            prop_assert_eq!(left.len(), config.size);
            prop_assert!(right.len() > config.overlap);
            prop_assert_eq!(
                &left[left.len() - config.overlap..],
                &right[..config.overlap]
            );
        }
    }

    #[test]
    fn chunks_rebuild_the_original_words(words in arb_words(), config in arb_config()) {
        let chunks = chunk_words(&words.join(" "), config).unwrap();

        let mut rebuilt = words_of(&chunks[0])
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>();
        for chunk in &chunks[1..] {
            rebuilt.extend(words_of(chunk)[config.overlap..].iter().map(|word| word.to_string()));
        }
        prop_assert_eq!(rebuilt, words);
    }

    #[test]
    fn chunking_is_deterministic(words in arb_words(), config in arb_config()) {
        let text = words.join(" ");
        prop_assert_eq!(chunk_words(&text, config).unwrap(), chunk_words(&text, config).unwrap());
    }

    #[test]
    fn normalized_text_has_no_controls_or_double_spaces(raw in "\\PC*[\\n\\t\\r\\x00\\x0c ]*\\PC*") {
        let normalized = normalize_text(&raw).unwrap();
        prop_assert!(normalized.is_ascii());
        prop_assert!(!normalized.chars().any(|c| c.is_control()));
        prop_assert!(!normalized.contains("  "));
        prop_assert_eq!(normalized.trim(), normalized.as_str());
    }
}
