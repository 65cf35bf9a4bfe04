/*
 * SPDX-FileCopyrightText: 2025 The wikirank developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use wikirank::rank::pagerank::{preds, PageRank};
use wikirank::store::{AdjacencyRecord, Graph};
use wikirank::top_k::{par_top_k, top_pages, TopK};

/// Returns the expected selection by sorting the whole input.
fn sorted_prefix(pairs: &[(usize, f64)], k: usize) -> Vec<(usize, f64)> {
    let mut sorted = pairs.to_vec();
    // Stable, so equal ranks stay in input order
    sorted.sort_by(|a, b| b.1.total_cmp(&a.1));
    sorted.truncate(k);
    sorted
}

#[test]
fn test_random_inputs() {
    let mut rng = SmallRng::seed_from_u64(0);
    for _ in 0..50 {
        let n = rng.random_range(0..2000);
        let k = rng.random_range(1..300);
        // Few distinct values, so that there are many ties
        let pairs: Vec<(usize, f64)> = (0..n)
            .map(|i| (i, rng.random_range(0..100) as f64 / 100.0))
            .collect();
        let expected = sorted_prefix(&pairs, k);

        let mut top = TopK::new(k);
        top.extend(pairs.iter().copied());
        assert_eq!(top.into_sorted_vec(), expected);

        assert_eq!(par_top_k(pairs.par_iter().copied(), k), expected);
    }
}

#[test]
fn test_partitioned_merge() {
    let mut rng = SmallRng::seed_from_u64(1);
    let pairs: Vec<(usize, f64)> = (0..10_000).map(|i| (i, rng.random::<f64>())).collect();
    let expected = sorted_prefix(&pairs, 100);

    for parts in [1, 2, 3, 16, 101] {
        let chunk_size = pairs.len().div_ceil(parts);
        let merged = pairs
            .chunks(chunk_size)
            .map(|chunk| {
                let mut top = TopK::new(100);
                top.extend(chunk.iter().copied());
                top
            })
            .fold(TopK::new(100), TopK::merge);
        assert_eq!(merged.pushed(), pairs.len() as u64);
        assert_eq!(merged.into_sorted_vec(), expected);
    }
}

#[test]
fn test_fewer_pages_than_k() {
    let graph = Graph::build([
        AdjacencyRecord::new("A", ["B", "C"]),
        AdjacencyRecord::new("B", ["C"]),
        AdjacencyRecord::new("C", ["A"]),
        AdjacencyRecord::new("D", ["C", "E"]),
    ]);
    assert_eq!(graph.len(), 5);
    let mut pr = PageRank::new(graph);
    pr.run(preds::MaxIter::from(10)).unwrap();
    let graph = pr.finish();

    let top = top_pages(&graph, 100);
    assert_eq!(top.len(), 5);
    assert!(top.windows(2).all(|w| w[0].1 >= w[1].1));
    // C collects links from three pages
    assert_eq!(&*top[0].0, "C");
    for (id, rank) in &top {
        assert_eq!(graph.rank(id), Some(*rank));
    }
}

#[test]
fn test_ties_in_identifier_order() {
    let records: Vec<AdjacencyRecord> = (0..10)
        .map(|i| AdjacencyRecord::new(format!("page{i}"), Vec::<String>::new()))
        .collect();
    let graph = Graph::build(records);
    let top = top_pages(&graph, 3);
    let ids: Vec<&str> = top.iter().map(|(id, _)| &**id).collect();
    assert_eq!(ids, vec!["page0", "page1", "page2"]);
}
