/*
 * SPDX-FileCopyrightText: 2025 The wikirank developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use anyhow::Result;
use dsi_progress_logger::no_logging;
use std::io::BufReader;
use wikirank::store::{AdjacencyRecord, Graph, IngestStats, PageNode};

fn neighbors(node: &PageNode) -> Vec<&str> {
    node.adjacency.iter().map(|n| &**n).collect()
}

#[test]
fn test_build_synthesizes_dangling_targets() {
    let graph = Graph::build([
        AdjacencyRecord::new("Rust", ["C", "Haskell", "C"]),
        AdjacencyRecord::new("C", ["B"]),
    ]);
    // B and Haskell are never defined
    assert_eq!(graph.len(), 4);
    assert_eq!(graph.num_arcs(), 3);

    let ids: Vec<&str> = graph.nodes().iter().map(|n| &*n.id).collect();
    assert_eq!(ids, vec!["B", "C", "Haskell", "Rust"]);

    for node in graph.nodes() {
        assert_eq!(node.rank, 0.25);
    }
    assert!(graph.get("B").unwrap().is_dangling());
    assert!(graph.get("Haskell").unwrap().is_dangling());
    assert_eq!(neighbors(graph.get("Rust").unwrap()), vec!["C", "Haskell"]);
    assert!(graph.get("Python").is_none());
    assert!((graph.rank_sum() - 1.0).abs() < 1E-12);
    assert!((graph.dangling_rank() - 0.5).abs() < 1E-12);
}

#[test]
fn test_build_merges_redefinitions() {
    let graph = Graph::build([
        AdjacencyRecord::new("A", ["B"]),
        AdjacencyRecord::new("B", Vec::<String>::new()),
        AdjacencyRecord::new("A", ["C", "B"]),
    ]);
    assert_eq!(graph.len(), 3);
    assert_eq!(neighbors(graph.get("A").unwrap()), vec!["B", "C"]);
    assert_eq!(graph.num_arcs(), 2);
}

#[test]
fn test_build_empty() {
    let graph = Graph::build(Vec::<AdjacencyRecord>::new());
    assert!(graph.is_empty());
    assert_eq!(graph.rank_sum(), 0.0);
}

#[test]
fn test_read_adjacency_skips_malformed() -> Result<()> {
    let input = "A B~C\n\nB A\nbad~id A\nC A~~B\nD\n";
    let (graph, stats) = Graph::read_adjacency(BufReader::new(input.as_bytes()), no_logging![])?;
    assert_eq!(
        stats,
        IngestStats {
            lines: 5,
            malformed: 2,
            duplicates: 0
        }
    );
    // C is synthesized as a dangling target, since its own line is malformed
    assert_eq!(graph.len(), 4);
    assert!(graph.get("C").unwrap().is_dangling());
    assert!(graph.get("D").unwrap().is_dangling());
    Ok(())
}

#[test]
fn test_read_ranked() -> Result<()> {
    let input = "B 0.25\nA 0.5 B~C\nC 0.25 A\nA 0.1 C\nD x\n";
    let (graph, stats) = Graph::read_ranked(input.as_bytes())?;
    assert_eq!(stats.lines, 5);
    assert_eq!(stats.malformed, 1);
    assert_eq!(stats.duplicates, 1);
    assert_eq!(graph.len(), 3);
    // The first definition wins
    assert_eq!(graph.rank("A"), Some(0.5));
    assert_eq!(neighbors(graph.get("A").unwrap()), vec!["B", "C"]);
    assert_eq!(graph.num_arcs(), 3);
    Ok(())
}

#[test]
fn test_write_and_read_ranked() -> Result<()> {
    let graph = Graph::build([
        AdjacencyRecord::new("A", ["B", "C"]),
        AdjacencyRecord::new("B", ["C"]),
        AdjacencyRecord::new("C", ["A"]),
    ]);
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("ranks.txt");
    graph.write_ranked(std::fs::File::create(&path)?)?;

    let content = std::fs::read_to_string(&path)?;
    let first = content.lines().next().unwrap();
    assert_eq!(first, format!("A {} B~C", 1.0 / 3.0));

    let (read, stats) = Graph::read_ranked(BufReader::new(std::fs::File::open(&path)?))?;
    assert_eq!(stats.malformed, 0);
    assert_eq!(read, graph);
    Ok(())
}

#[test]
fn test_from_nodes_keeps_first() {
    let (graph, duplicates) = Graph::from_nodes([
        wikirank::store::parse_rank_line("B 0.2").unwrap(),
        wikirank::store::parse_rank_line("A 0.3 B").unwrap(),
        wikirank::store::parse_rank_line("B 0.5 A").unwrap(),
    ]);
    assert_eq!(duplicates, 1);
    assert_eq!(graph.len(), 2);
    assert_eq!(graph.rank("B"), Some(0.2));
    assert!(graph.get("B").unwrap().is_dangling());
}
