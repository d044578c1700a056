//! Request and report data structures.

pub mod bar;
pub mod contract;
pub mod enums;
pub mod execution;
pub mod order;
pub mod scanner;
