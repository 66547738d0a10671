/*
 * opencl demos with rust
 * Copyright (C) 2021 trivernis
 * See LICENSE for more information
 */

pub mod args;
pub mod logging;
pub mod progress;
pub mod timer;
