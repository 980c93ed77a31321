//! Side-effecting operations: configuration, child-process execution, the
//! model backend, and the code-execution judge. Isolated behind traits to
//! enable scripted fakes in tests.

pub mod config;
pub mod judge;
pub mod model;
pub mod process;
