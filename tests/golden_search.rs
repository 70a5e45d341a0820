use std::sync::Arc;

use tempfile::TempDir;

use luca::segment::NoMergePolicy;
use luca::{Document, Index, OpenMode, Query, Searcher};

fn create_doc(id: &str, contents: &str) -> Document {
    Document::new()
        .with_keyword("path", id)
        .with_text("contents", contents)
}

fn setup_index() -> (TempDir, Index) {
    let tmp = TempDir::new().unwrap();
    let index = Index::open(tmp.path(), OpenMode::Create).unwrap();
    index.set_merge_policy(Arc::new(NoMergePolicy));
    (tmp, index)
}

fn index_fixture(index: &Index) {
    let docs = [
        ("1", "rust rust rust programming"),
        ("2", "rust programming language"),
        ("3", "python programming language"),
        ("4", "garden tools"),
    ];
    for (id, contents) in docs {
        index.add(&create_doc(id, contents)).unwrap();
    }
    index.commit().unwrap();
}

fn ranked_ids(searcher: &Searcher, query: &Query, top_k: usize) -> Vec<String> {
    searcher
        .search(query, top_k)
        .unwrap()
        .into_iter()
        .filter_map(|hit| hit.id)
        .collect()
}

#[test]
fn golden_term_frequency_ranks_first() {
    let (_tmp, index) = setup_index();
    index_fixture(&index);

    let searcher = index.open_searcher();
    assert_eq!(ranked_ids(&searcher, &Query::term("contents", "rust"), 10), vec!["1", "2"]);
}

#[test]
fn golden_disjunction_prefers_more_matching_terms() {
    let (_tmp, index) = setup_index();
    index_fixture(&index);

    let searcher = index.open_searcher();
    let query = searcher.parse_query("python language").unwrap();
    let ids = ranked_ids(&searcher, &query, 10);
    assert_eq!(ids[0], "3");
    assert_eq!(ids.len(), 2);
}

#[test]
fn golden_top_k_truncates_and_counts_all() {
    let (_tmp, index) = setup_index();
    index_fixture(&index);

    let searcher = index.open_searcher();
    let top = searcher
        .search_with_stats(&Query::term("contents", "programming"), 2)
        .unwrap();
    assert_eq!(top.total_hits, 3);
    assert_eq!(top.hits.len(), 2);
    assert!(top.hits[0].score >= top.hits[1].score);

    let none = searcher
        .search_with_stats(&Query::term("contents", "programming"), 0)
        .unwrap();
    assert_eq!(none.total_hits, 3);
    assert!(none.is_empty());
}

#[test]
fn golden_ties_break_on_segment_then_docno() {
    let (_tmp, index) = setup_index();
    // Identical documents score identically wherever they live
    for batch in [["a", "b"], ["c", "d"]] {
        for id in batch {
            index.add(&create_doc(id, "same words here")).unwrap();
        }
        index.commit().unwrap();
    }
    index.add(&create_doc("e", "same words here")).unwrap();
    index.commit().unwrap();

    let searcher = index.open_searcher();
    let hits = searcher.search(&Query::term("contents", "words"), 10).unwrap();
    assert!(hits.windows(2).all(|w| w[0].score == w[1].score));
    let ids: Vec<_> = hits.iter().filter_map(|h| h.id.as_deref()).collect();
    assert_eq!(ids, vec!["a", "b", "c", "d", "e"]);
    assert!(hits.windows(2).all(|w| w[0].address < w[1].address));

    let top3: Vec<_> = ranked_ids(&searcher, &Query::term("contents", "words"), 3);
    assert_eq!(top3, vec!["a", "b", "c"]);
}

#[test]
fn golden_scores_do_not_depend_on_segmentation() {
    let docs = [
        ("1", "alpha beta gamma"),
        ("2", "alpha alpha delta"),
        ("3", "beta epsilon"),
        ("4", "alpha zeta eta theta"),
    ];

    let (_single_tmp, single) = setup_index();
    for (id, text) in docs {
        single.add(&create_doc(id, text)).unwrap();
    }
    single.commit().unwrap();

    let (_split_tmp, split) = setup_index();
    for (id, text) in docs {
        split.add(&create_doc(id, text)).unwrap();
        split.commit().unwrap();
    }
    assert_eq!(split.segment_ids().len(), 4);

    let query = Query::term("contents", "alpha");
    let scores = |index: &Index| -> Vec<(String, f32)> {
        let mut hits: Vec<_> = index
            .open_searcher()
            .search(&query, 10)
            .unwrap()
            .into_iter()
            .map(|h| (h.id.unwrap_or_default(), h.score))
            .collect();
        hits.sort_by(|a, b| a.0.cmp(&b.0));
        hits
    };
    let expected = scores(&single);
    let actual = scores(&split);
    assert_eq!(expected.len(), 3);
    for ((id_a, a), (id_b, b)) in expected.iter().zip(&actual) {
        assert_eq!(id_a, id_b);
        assert!((a - b).abs() < 1e-6, "{id_a}: {a} vs {b}");
    }
}

#[test]
fn golden_extra_occurrence_never_lowers_score() {
    let (_tmp, index) = setup_index();
    for i in 0..50 {
        index.add(&create_doc(&format!("filler-{i}"), "common filler")).unwrap();
    }
    index.add(&create_doc("x", "common rare")).unwrap();
    index.add(&create_doc("y", "common common rare")).unwrap();
    index.commit().unwrap();

    let searcher = index.open_searcher();
    let query = Query::or(vec![
        Query::term("contents", "common"),
        Query::term("contents", "rare"),
    ]);
    let hits = searcher.search(&query, 100).unwrap();
    let score = |id: &str| {
        hits.iter()
            .find(|h| h.id.as_deref() == Some(id))
            .map(|h| h.score)
            .unwrap()
    };
    let (x, y) = (score("x"), score("y"));
    assert!(y >= x, "x={x} y={y}");
    assert_eq!(hits[0].id.as_deref(), Some("y"));
}
