//! The parts of CQL responses a prepared statement depends on.

pub mod result;
