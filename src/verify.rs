/*
 * opencl demos with rust
 * Copyright (C) 2021 trivernis
 * See LICENSE for more information
 */

use crate::error::{PipelineError, Result};
use std::fmt::{self, Display, Formatter};
use std::fs;
use std::path::Path;

/// Outcome of comparing computed integer results with expected values
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail {
        mismatches: usize,
        index: usize,
        expected: i32,
        found: i32,
    },
}

impl Verdict {
    pub fn passed(&self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

impl Display for Verdict {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => write!(f, "pass"),
            Verdict::Fail {
                mismatches,
                index,
                expected,
                found,
            } => write!(
                f,
                "failed with {} mismatches, first at {}: expected {} found {}",
                mismatches, index, expected, found
            ),
        }
    }
}

/// Compares both slices entry by entry. Missing entries on either side count as mismatches.
pub fn compare(expected: &[i32], found: &[i32]) -> Verdict {
    let mut first = None;
    let mut mismatches = expected.len().max(found.len()) - expected.len().min(found.len());

    for (index, (e, f)) in expected.iter().zip(found.iter()).enumerate() {
        if e != f {
            mismatches += 1;
            first.get_or_insert((index, *e, *f));
        }
    }
    if first.is_none() && mismatches > 0 {
        let index = expected.len().min(found.len());
        first = Some((
            index,
            expected.get(index).copied().unwrap_or_default(),
            found.get(index).copied().unwrap_or_default(),
        ));
    }

    match first {
        None => Verdict::Pass,
        Some((index, expected, found)) => Verdict::Fail {
            mismatches,
            index,
            expected,
            found,
        },
    }
}

/// Reads whitespace separated integers from a reference file
pub fn read_reference<P: AsRef<Path>>(path: P) -> Result<Vec<i32>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| PipelineError::input_file(path, e))?;

    content
        .split_whitespace()
        .map(|token| {
            token.parse::<i32>().map_err(|_| PipelineError::Parse {
                path: path.to_path_buf(),
                token: token.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn equal_results_pass() {
        assert_eq!(compare(&[1, 2, 3], &[1, 2, 3]), Verdict::Pass);
        assert!(compare(&[], &[]).passed());
    }

    #[test]
    fn mismatches_are_counted() {
        assert_eq!(
            compare(&[1, 2, 3, 4], &[1, 5, 3, 6]),
            Verdict::Fail {
                mismatches: 2,
                index: 1,
                expected: 2,
                found: 5
            }
        );
    }

    #[test]
    fn length_difference_fails() {
        assert_eq!(
            compare(&[1, 2, 3], &[1, 2]),
            Verdict::Fail {
                mismatches: 1,
                index: 2,
                expected: 3,
                found: 0
            }
        );
    }

    #[test]
    fn reference_file_is_parsed() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "0 1\n2\n  1").unwrap();
        assert_eq!(read_reference(file.path()).unwrap(), vec![0, 1, 2, 1]);

        let mut broken = NamedTempFile::new().unwrap();
        writeln!(broken, "0 x").unwrap();
        assert!(matches!(
            read_reference(broken.path()),
            Err(PipelineError::Parse { .. })
        ));
        assert!(matches!(
            read_reference("/nonexistent/output.txt"),
            Err(PipelineError::InputFile { .. })
        ));
    }
}
