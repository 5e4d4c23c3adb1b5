//! Unit tests for argument handling and command execution.

use super::*;

mod overrides;
