/*
 * opencl demos with rust
 * Copyright (C) 2021 trivernis
 * See LICENSE for more information
 */

use crate::error::{PipelineError, Result};
use crate::task_queue::TaskPool;
use std::fs;
use std::path::{Path, PathBuf};

/// Number of frame files the pool cycles through
pub const FRAME_FILES: usize = 2;

/// Returns the file that holds the frame of pool entry `index`
pub fn frame_file_name(base: &Path, index: usize) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!("{}.float", index % FRAME_FILES));

    PathBuf::from(name)
}

/// Reads `frame_size` whitespace separated floats and truncates them to integers
pub fn read_frame(path: &Path, frame_size: usize) -> Result<Vec<i32>> {
    let content = fs::read_to_string(path).map_err(|e| PipelineError::input_file(path, e))?;
    let mut frame = Vec::with_capacity(frame_size);

    for token in content.split_whitespace().take(frame_size) {
        let value = token.parse::<f32>().map_err(|_| PipelineError::Parse {
            path: path.to_path_buf(),
            token: token.to_string(),
        })?;
        frame.push(value as i32);
    }
    if frame.len() < frame_size {
        return Err(PipelineError::ShortInput {
            path: path.to_path_buf(),
            expected: frame_size,
            found: frame.len(),
        });
    }

    Ok(frame)
}

/// Creates the task pool and fills the frame of every task round robin from the input files
pub fn read_input(base: &Path, pool_size: usize, frame_size: usize) -> Result<TaskPool> {
    let mut pool = TaskPool::allocate(pool_size, frame_size)?;
    let mut frames: Vec<Option<Vec<i32>>> = vec![None; FRAME_FILES];

    for i in 0..pool_size {
        let slot = &mut frames[i % FRAME_FILES];
        if slot.is_none() {
            let path = frame_file_name(base, i);
            log::debug!("Reading frame file {:?}", path);
            *slot = Some(read_frame(&path, frame_size)?);
        }
        if let Some(frame) = slot {
            pool.frame_mut(i).copy_from_slice(frame);
        }
    }

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    fn write_frame(dir: &Path, name: &str, values: &str) {
        let mut file = File::create(dir.join(name)).unwrap();
        write!(file, "{}", values).unwrap();
    }

    #[test]
    fn file_names_alternate() {
        let base = Path::new("input/basket/basket");
        assert_eq!(
            frame_file_name(base, 0),
            PathBuf::from("input/basket/basket0.float")
        );
        assert_eq!(
            frame_file_name(base, 7),
            PathBuf::from("input/basket/basket1.float")
        );
    }

    #[test]
    fn pool_cycles_between_two_files() {
        let dir = tempfile::tempdir().unwrap();
        write_frame(dir.path(), "frame0.float", "1.0 2.7 3.2\n4.9 ");
        write_frame(dir.path(), "frame1.float", "10 20\n30 40 50");

        let pool = read_input(&dir.path().join("frame"), 5, 4).unwrap();
        assert_eq!(pool.len(), 5);
        assert_eq!(pool.frame(0), &[1, 2, 3, 4]);
        assert_eq!(pool.frame(1), &[10, 20, 30, 40]);
        assert_eq!(pool.frame(2), pool.frame(0));
        assert_eq!(pool.frame(3), pool.frame(1));
        assert_eq!(pool.frame(4), pool.frame(0));
    }

    #[test]
    fn missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_frame(dir.path(), "frame0.float", "1 2");

        match read_input(&dir.path().join("frame"), 2, 2) {
            Err(PipelineError::InputFile { path, .. }) => {
                assert!(path.ends_with("frame1.float"))
            }
            _ => panic!("expected a missing input file"),
        }
    }

    #[test]
    fn short_or_malformed_frames_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_frame(dir.path(), "short0.float", "1 2");
        write_frame(dir.path(), "bad0.float", "1 two 3");

        assert!(matches!(
            read_frame(&dir.path().join("short0.float"), 3),
            Err(PipelineError::ShortInput { found: 2, .. })
        ));
        assert!(matches!(
            read_frame(&dir.path().join("bad0.float"), 3),
            Err(PipelineError::Parse { .. })
        ));
    }
}
