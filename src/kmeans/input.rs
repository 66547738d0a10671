/*
 * opencl demos with rust
 * Copyright (C) 2021 trivernis
 * See LICENSE for more information
 */

use crate::error::{PipelineError, Result};
use std::fs;
use std::path::Path;

/// Points in row-major order
#[derive(Clone, Debug, PartialEq)]
pub struct Points {
    pub features: Vec<f32>,
    pub n_points: usize,
    pub n_features: usize,
}

/// Reads one point per line in the format `<id> <f1> ... <fN>`.
/// The number of features is taken from the first non-empty line.
pub fn read_points(path: &Path) -> Result<Points> {
    let content = fs::read_to_string(path).map_err(|e| PipelineError::input_file(path, e))?;
    parse_points(&content, path)
}

fn parse_points(content: &str, path: &Path) -> Result<Points> {
    let mut features = Vec::new();
    let mut n_features = None;
    let mut n_points = 0;

    for line in content.lines().filter(|l| !l.trim().is_empty()) {
        let values = line
            .split_whitespace()
            .skip(1)
            .map(|token| {
                token.parse::<f32>().map_err(|_| PipelineError::Parse {
                    path: path.to_path_buf(),
                    token: token.to_string(),
                })
            })
            .collect::<Result<Vec<f32>>>()?;

        let expected = *n_features.get_or_insert(values.len());
        if values.len() != expected || expected == 0 {
            return Err(PipelineError::InvalidParams(format!(
                "point {} in {:?} has {} features, expected {}",
                n_points,
                path,
                values.len(),
                expected
            )));
        }
        features.extend(values);
        n_points += 1;
    }

    Ok(Points {
        features,
        n_points,
        n_features: n_features.unwrap_or(0),
    })
}
