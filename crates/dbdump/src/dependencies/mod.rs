//! Table dependency ordering
//!
//! Linearizes tables so that every table referenced by a foreign key is
//! created and populated before the tables that reference it.

mod resolver;


pub use resolver::{CycleBreak, DependencyGraph, DependencyOrder};
