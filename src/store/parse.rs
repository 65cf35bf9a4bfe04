/*
 * SPDX-FileCopyrightText: 2025 The wikirank developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Line formats.
//!
//! Two whitespace-separated line formats are used:
//!
//! - _adjacency records_, the output of link extraction:
//!   `<pageId> [<neighbor₁>~<neighbor₂>~…~<neighborₖ>]`;
//! - _rank lines_, the initial, intermediate and final representation of the
//!   graph: `<pageId> <rank> [<neighbor₁>~<neighbor₂>~…~<neighborₖ>]`.
//!
//! In both formats the absence of the neighbor list marks a dangling page.
//! Page identifiers cannot contain whitespace or `~`.

use super::{AdjacencyRecord, PageNode};
use itertools::Itertools;
use std::fmt::Display;
use std::sync::Arc;

/// The separator of the neighbor list.
pub const NEIGHBOR_SEPARATOR: char = '~';

/// The reason a line could not be parsed.
///
/// Malformed records are never fatal: ingestion functions count them, log
/// them at debug level and move on.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ParseRecordError {
    #[error("Empty line")]
    Empty,
    #[error("Missing rank for page {id}")]
    MissingRank { id: String },
    #[error("Could not parse rank '{rank}' of page {id}")]
    InvalidRank { id: String, rank: String },
    /// Ranks must be finite and nonnegative.
    #[error("Rank {rank} of page {id} is out of range")]
    RankOutOfRange { id: String, rank: f64 },
    #[error("Expected at most {expected} fields, got {got}")]
    TooManyFields { expected: usize, got: usize },
    /// A neighbor list with an empty element, such as `a~~b` or `a~`.
    #[error("Empty neighbor in the adjacency list of page {id}")]
    EmptyNeighbor { id: String },
    #[error("Page identifier '{id}' contains '~'")]
    InvalidId { id: String },
}

fn parse_id(token: &str) -> Result<&str, ParseRecordError> {
    if token.contains(NEIGHBOR_SEPARATOR) {
        return Err(ParseRecordError::InvalidId {
            id: token.to_owned(),
        });
    }
    Ok(token)
}

fn parse_neighbors<'a>(id: &str, list: &'a str) -> Result<Vec<&'a str>, ParseRecordError> {
    let neighbors: Vec<&str> = list.split(NEIGHBOR_SEPARATOR).collect();
    if neighbors.iter().any(|n| n.is_empty()) {
        return Err(ParseRecordError::EmptyNeighbor { id: id.to_owned() });
    }
    Ok(neighbors)
}

/// Parses an adjacency record.
///
/// Duplicate neighbors are kept: they are removed when the
/// [graph is built](super::Graph::build).
pub fn parse_adjacency_line(line: &str) -> Result<AdjacencyRecord, ParseRecordError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let (id, neighbors) = match tokens.as_slice() {
        [] => return Err(ParseRecordError::Empty),
        [id] => (parse_id(id)?, vec![]),
        [id, list] => {
            let id = parse_id(id)?;
            (id, parse_neighbors(id, list)?)
        }
        _ => {
            return Err(ParseRecordError::TooManyFields {
                expected: 2,
                got: tokens.len(),
            })
        }
    };
    Ok(AdjacencyRecord {
        id: id.to_owned(),
        neighbors: neighbors.into_iter().map(str::to_owned).collect(),
    })
}

/// Parses a rank line into a [`PageNode`].
///
/// Duplicate neighbors are removed, keeping the first occurrence.
pub fn parse_rank_line(line: &str) -> Result<PageNode, ParseRecordError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let (id, rank, list) = match tokens.as_slice() {
        [] => return Err(ParseRecordError::Empty),
        [id] => {
            return Err(ParseRecordError::MissingRank {
                id: (*id).to_owned(),
            })
        }
        [id, rank] => (parse_id(id)?, *rank, None),
        [id, rank, list] => (parse_id(id)?, *rank, Some(*list)),
        _ => {
            return Err(ParseRecordError::TooManyFields {
                expected: 3,
                got: tokens.len(),
            })
        }
    };

    let rank = rank
        .parse::<f64>()
        .map_err(|_| ParseRecordError::InvalidRank {
            id: id.to_owned(),
            rank: rank.to_owned(),
        })?;
    if !rank.is_finite() || rank < 0.0 {
        return Err(ParseRecordError::RankOutOfRange {
            id: id.to_owned(),
            rank,
        });
    }

    let adjacency = match list {
        Some(list) => parse_neighbors(id, list)?
            .into_iter()
            .unique()
            .map(Arc::<str>::from)
            .collect(),
        None => Arc::from([]),
    };

    Ok(PageNode {
        id: Arc::from(id),
        rank,
        adjacency,
    })
}

/// Writes `node` as a rank line (without the line terminator).
///
/// The rank is printed with the shortest representation that parses back to
/// the same value, so rank lines can be used as exact intermediate state.
pub(crate) fn fmt_rank_line(node: &PageNode, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{} {}", node.id, node.rank)?;
    if !node.adjacency.is_empty() {
        write!(f, " {}", node.adjacency.iter().join("~"))?;
    }
    Ok(())
}

/// Formats an output pair of the final ranking as `<pageId>\t<rank>`.
pub fn format_ranked_pair(id: impl Display, rank: f64) -> String {
    format!("{id}\t{rank}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjacency_line() {
        let record = parse_adjacency_line("A B~C~B").unwrap();
        assert_eq!(record.id, "A");
        assert_eq!(record.neighbors, vec!["B", "C", "B"]);

        let record = parse_adjacency_line("A\t").unwrap();
        assert_eq!(record.id, "A");
        assert!(record.neighbors.is_empty());
    }

    #[test]
    fn test_adjacency_line_errors() {
        assert_eq!(parse_adjacency_line("   "), Err(ParseRecordError::Empty));
        assert!(matches!(
            parse_adjacency_line("A B C"),
            Err(ParseRecordError::TooManyFields { got: 3, .. })
        ));
        assert!(matches!(
            parse_adjacency_line("A B~~C"),
            Err(ParseRecordError::EmptyNeighbor { .. })
        ));
        assert!(matches!(
            parse_adjacency_line("A~B C"),
            Err(ParseRecordError::InvalidId { .. })
        ));
    }

    #[test]
    fn test_rank_line() {
        let node = parse_rank_line("Rust 0.25 C~Cpp~C~Haskell").unwrap();
        assert_eq!(&*node.id, "Rust");
        assert_eq!(node.rank, 0.25);
        let adjacency: Vec<&str> = node.adjacency.iter().map(|n| &**n).collect();
        assert_eq!(adjacency, vec!["C", "Cpp", "Haskell"]);

        let node = parse_rank_line("Sink 1e-3").unwrap();
        assert!(node.is_dangling());
        assert_eq!(node.rank, 0.001);
    }

    #[test]
    fn test_rank_line_errors() {
        assert!(matches!(
            parse_rank_line("A"),
            Err(ParseRecordError::MissingRank { .. })
        ));
        assert!(matches!(
            parse_rank_line("A one B"),
            Err(ParseRecordError::InvalidRank { .. })
        ));
        assert!(matches!(
            parse_rank_line("A -0.5"),
            Err(ParseRecordError::RankOutOfRange { .. })
        ));
        assert!(matches!(
            parse_rank_line("A NaN"),
            Err(ParseRecordError::RankOutOfRange { .. })
        ));
        assert!(matches!(
            parse_rank_line("A 0.5 B C"),
            Err(ParseRecordError::TooManyFields { got: 4, .. })
        ));
        assert!(matches!(
            parse_rank_line("A 0.5 B~"),
            Err(ParseRecordError::EmptyNeighbor { .. })
        ));
    }

    #[test]
    fn test_display_parses_back() {
        for line in ["A 0.1 B~C", "B 0.30000000000000004", "C 1e-300 A"] {
            let node = parse_rank_line(line).unwrap();
            let printed = node.to_string();
            let again = parse_rank_line(&printed).unwrap();
            assert_eq!(node, again, "{line} -> {printed}");
        }
    }

    #[test]
    fn test_ranked_pair() {
        assert_eq!(format_ranked_pair("A", 0.5), "A\t0.5");
    }
}
