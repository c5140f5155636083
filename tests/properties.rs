//! Property tests for the trie, its binary format, the scanner and the
//! edit-distance engine

use multigrep::distance;
use multigrep::patterns::ReplacementTable;
use multigrep::rewrite;
use multigrep::scan;
use multigrep::trie::{codec, MatchMode, Trie};
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;

/// Distinct lowercase words, each paired with a distinct id.
fn word_ids() -> impl Strategy<Value = BTreeMap<String, i32>> {
    prop::collection::btree_set("[a-z]{1,8}", 1..24).prop_map(|words| {
        words
            .into_iter()
            .enumerate()
            .map(|(id, word)| (word, id as i32))
            .collect()
    })
}

fn build(words: &BTreeMap<String, i32>) -> Trie {
    let mut trie = Trie::new();
    for (word, &id) in words {
        trie.insert(word.as_bytes(), id).unwrap();
    }
    trie
}

proptest! {
    #[test]
    fn exact_lookup_resolves_every_inserted_word(words in word_ids()) {
        let trie = build(&words);
        for (word, &id) in &words {
            prop_assert_eq!(trie.localize(word.as_bytes()), Some(id));
            prop_assert!(trie.contains(word.as_bytes()));
        }
    }

    #[test]
    fn find_id_spells_the_inserted_word(words in word_ids()) {
        let trie = build(&words);
        for (word, &id) in &words {
            prop_assert_eq!(trie.find_id(id).unwrap(), word.as_bytes().to_vec());
        }
    }

    #[test]
    fn patterns_enumerate_every_word(words in word_ids()) {
        let trie = build(&words);
        let mut listed: Vec<(Vec<u8>, i32)> = trie.patterns();
        listed.sort();
        let expected: Vec<(Vec<u8>, i32)> = words
            .iter()
            .map(|(word, &id)| (word.as_bytes().to_vec(), id))
            .collect();
        prop_assert_eq!(listed, expected);
    }

    #[test]
    fn saved_tree_loads_with_the_same_patterns(words in word_ids()) {
        let trie = build(&words);
        let mut bytes = Vec::new();
        codec::save(&trie, &mut bytes).unwrap();
        let loaded = codec::load(bytes.as_slice()).unwrap();

        prop_assert_eq!(loaded.mode(), MatchMode::Fuzzy);
        prop_assert_eq!(loaded.len(), trie.len());
        prop_assert_eq!(loaded.patterns(), trie.patterns());
        for (word, &id) in &words {
            prop_assert_eq!(loaded.localize(word.as_bytes()), Some(id));
        }
    }

    #[test]
    fn bookmarks_point_at_their_bytes(
        words in word_ids(),
        text in "[a-z \n]{0,200}",
    ) {
        let trie = build(&words);
        let found = scan::scan_bytes(&trie, text.as_bytes());

        let mut previous_end = 0;
        for bookmark in &found {
            prop_assert!(bookmark.start >= previous_end);
            prop_assert_eq!(bookmark.end, bookmark.start + bookmark.length);
            let span = &text.as_bytes()[bookmark.start..bookmark.end];
            prop_assert!(bookmark.verify(span));
            prop_assert_eq!(trie.localize(span), Some(bookmark.id));
            previous_end = bookmark.end;
        }
    }

    #[test]
    fn splice_preserves_unmatched_bytes(
        words in word_ids(),
        text in "[a-z \n]{0,200}",
    ) {
        let trie = build(&words);
        let mut table = ReplacementTable::new();
        for id in 0..words.len() {
            table.intern(&format!("<{id}>"));
        }

        let found = scan::scan_bytes(&trie, text.as_bytes());
        let mut out = Vec::new();
        let replaced = rewrite::splice(
            text.as_bytes(),
            &mut out,
            &found,
            &table,
            None,
            Path::new("input"),
        )
        .unwrap();
        prop_assert_eq!(replaced, found.len());

        let removed: usize = found.iter().map(|b| b.length).sum();
        let added: usize = found
            .iter()
            .map(|b| table.get(b.id).unwrap().len())
            .sum();
        prop_assert_eq!(out.len(), text.len() - removed + added);

        let mut expected = Vec::new();
        let mut position = 0;
        for bookmark in &found {
            expected.extend_from_slice(&text.as_bytes()[position..bookmark.start]);
            expected.extend_from_slice(table.get(bookmark.id).unwrap().as_bytes());
            position = bookmark.end;
        }
        expected.extend_from_slice(&text.as_bytes()[position..]);
        prop_assert_eq!(out, expected);
    }

    #[test]
    fn distance_agrees_with_reference(a in "[A-E ]{1,10}", b in "[A-E ]{1,10}") {
        prop_assert_eq!(distance::measure(&a, &b), strsim::damerau_levenshtein(&a, &b));
    }

    #[test]
    fn distance_ignores_case(a in "[a-zA-Z]{1,12}") {
        prop_assert_eq!(distance::measure(&a, &a.to_ascii_uppercase()), 0);
        prop_assert_eq!(
            distance::measure(&a, "x"),
            strsim::damerau_levenshtein(&a.to_ascii_uppercase(), "X")
        );
    }
}
