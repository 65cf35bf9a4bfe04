/*
 * SPDX-FileCopyrightText: 2025 The wikirank developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Parameters of a PageRank pipeline.
//!
//! Parameters can be read from a Java-style `.properties` file:
//!
//! ```text
//! alpha = 0.15
//! iterations = 10
//! top_k = 100
//! # optional: stop early when the ℓ₁ delta falls below the threshold
//! threshold = 1E-9
//! # optional: the number of pages, if known in advance
//! pages = 14128976
//! ```

use super::pagerank::preds::{L1Norm, MaxIter, PredParams};
use predicates::prelude::*;
use predicates::BoxPredicate;
use std::collections::HashMap;
use std::io::BufRead;
use std::str::FromStr;

/// An invalid or incomplete configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The properties file could not be read.
    #[error("Could not read the properties: {0}")]
    Unreadable(#[from] java_properties::PropertiesError),
    /// Cannot parse a property from the properties file.
    #[error("Could not parse '{property}' property value '{value}' as {expected_type}")]
    InvalidPropertyValue {
        property: &'static str,
        value: String,
        expected_type: &'static str,
    },
    #[error("The jump probability must be in [0 . . 1], got {0}")]
    AlphaOutOfRange(f64),
    #[error("The number of pages must be positive")]
    NoPages,
    #[error("The number of iterations must be positive")]
    NoIterations,
    #[error("The number of iterations is required unless a threshold is given")]
    MissingIterations,
    #[error("The threshold must be positive, got {0}")]
    InvalidThreshold(f64),
    #[error("The number of results must be positive")]
    NoResults,
}

/// The parameters of a PageRank pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRankConfig {
    /// The jump probability α.
    pub alpha: f64,
    /// The number of pages *n*; zero until known.
    pub page_count: usize,
    /// The number of rounds (fixed-count mode), or the maximum number of
    /// rounds (threshold mode).
    pub iterations: Option<usize>,
    /// If set, stop as soon as the ℓ₁ delta falls below this threshold.
    pub threshold: Option<f64>,
    /// The number of pages in the final ranking.
    pub top_k: usize,
}

impl Default for PageRankConfig {
    fn default() -> Self {
        Self {
            alpha: Self::DEFAULT_ALPHA,
            page_count: 0,
            iterations: None,
            threshold: None,
            top_k: Self::DEFAULT_TOP_K,
        }
    }
}

fn parse_property<T: FromStr>(
    map: &HashMap<String, String>,
    property: &'static str,
    expected_type: &'static str,
) -> Result<Option<T>, ConfigError> {
    map.get(property)
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .map_err(|_| ConfigError::InvalidPropertyValue {
                    property,
                    value: value.clone(),
                    expected_type,
                })
        })
        .transpose()
}

impl PageRankConfig {
    pub const DEFAULT_ALPHA: f64 = 0.15;
    pub const DEFAULT_TOP_K: usize = 100;

    /// Reads a properties file and overrides the corresponding fields.
    ///
    /// Absent properties leave the current values untouched. The result is
    /// not [validated](Self::validate).
    pub fn update_from_properties(&mut self, reader: impl BufRead) -> Result<(), ConfigError> {
        let map = java_properties::read(reader)?;
        if let Some(alpha) = parse_property(&map, "alpha", "f64")? {
            self.alpha = alpha;
        }
        if let Some(pages) = parse_property(&map, "pages", "usize")? {
            self.page_count = pages;
        }
        if let Some(iterations) = parse_property(&map, "iterations", "usize")? {
            self.iterations = Some(iterations);
        }
        if let Some(threshold) = parse_property(&map, "threshold", "f64")? {
            self.threshold = Some(threshold);
        }
        if let Some(top_k) = parse_property(&map, "top_k", "usize")? {
            self.top_k = top_k;
        }
        Ok(())
    }

    /// Returns the configuration in properties format.
    ///
    /// Unset optional fields are omitted.
    pub fn to_properties(&self) -> String {
        let mut s = String::new();
        s.push_str("#PageRank properties\n");
        s.push_str(&format!("alpha={}\n", self.alpha));
        if self.page_count != 0 {
            s.push_str(&format!("pages={}\n", self.page_count));
        }
        if let Some(iterations) = self.iterations {
            s.push_str(&format!("iterations={}\n", iterations));
        }
        if let Some(threshold) = self.threshold {
            s.push_str(&format!("threshold={}\n", threshold));
        }
        s.push_str(&format!("top_k={}\n", self.top_k));
        s
    }

    /// Checks that the configuration describes a runnable pipeline.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_parameters()?;
        if self.page_count == 0 {
            return Err(ConfigError::NoPages);
        }
        Ok(())
    }

    /// Checks every value except the number of pages, which may be known
    /// only after the graph has been loaded.
    pub fn validate_parameters(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(ConfigError::AlphaOutOfRange(self.alpha));
        }
        match (self.iterations, self.threshold) {
            (Some(0), _) => return Err(ConfigError::NoIterations),
            (None, None) => return Err(ConfigError::MissingIterations),
            _ => {}
        }
        if let Some(threshold) = self.threshold {
            if threshold.is_nan() || threshold <= 0.0 {
                return Err(ConfigError::InvalidThreshold(threshold));
            }
        }
        if self.top_k == 0 {
            return Err(ConfigError::NoResults);
        }
        Ok(())
    }

    /// Returns the stopping predicate described by the configuration.
    ///
    /// In fixed-count mode this is [`MaxIter`]; in threshold mode it is
    /// [`L1Norm`] or [`MaxIter`], with [`MaxIter::DEFAULT_MAX_ITER`] as a
    /// safety bound if no number of rounds was given.
    pub fn predicate(&self) -> Result<BoxPredicate<PredParams>, ConfigError> {
        match self.threshold {
            None => match self.iterations {
                Some(iterations) => Ok(MaxIter::from(iterations).boxed()),
                None => Err(ConfigError::MissingIterations),
            },
            Some(threshold) => {
                let max_iter = self.iterations.unwrap_or(MaxIter::DEFAULT_MAX_ITER);
                let l1 = L1Norm::try_from(threshold)
                    .map_err(|_| ConfigError::InvalidThreshold(threshold))?;
                Ok(l1.or(MaxIter::from(max_iter)).boxed())
            }
        }
    }
}
