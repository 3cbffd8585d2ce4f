//! Shared test harness modules for the OpenBounds CLI.

use super::*;

mod helpers;
mod tiling_unit;
