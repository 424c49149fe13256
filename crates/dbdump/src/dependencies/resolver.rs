//! Foreign key dependency resolver
//!
//! Kahn's topological sort over the `referencing -> referenced` graph with a
//! deterministic tie-break: among the tables whose references are all placed,
//! the one that appeared first in the input goes next. When no table is ready
//! the remaining tables form at least one cycle; the first-seen pending table
//! that lies on a cycle is then placed anyway and the break is recorded.
//! Tables that only depend on a cycle wait for it to be placed.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::model::Table;
use crate::sql::quote_identifier;

/// A table placed before some of the tables it references
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleBreak {
    pub table: String,
    /// Referenced tables that were not yet placed, in input order
    pub unresolved: Vec<String>,
}

impl fmt::Display for CycleBreak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unresolved: Vec<String> = self.unresolved.iter().map(|t| quote_identifier(t)).collect();
        write!(
            f,
            "foreign key cycle: {} placed before {}",
            quote_identifier(&self.table),
            unresolved.join(", ")
        )
    }
}

/// Result of resolving a [`DependencyGraph`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyOrder {
    /// Every input table exactly once
    pub order: Vec<String>,
    pub cycle_breaks: Vec<CycleBreak>,
}

impl DependencyOrder {
    pub fn is_acyclic(&self) -> bool {
        self.cycle_breaks.is_empty()
    }
}

/// Tables and the tables each one references
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    tables: Vec<String>,
    references: Vec<Vec<String>>,
    positions: HashMap<String, usize>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tables(tables: &[Table]) -> Self {
        let mut graph = Self::new();
        for table in tables {
            graph.add_table(&table.name, table.referenced_tables());
        }
        graph
    }

    /// Add a table with the tables it references. Adding a name twice merges
    /// the references into the first entry.
    pub fn add_table<I, S>(&mut self, name: &str, references: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let idx = match self.positions.get(name) {
            Some(&idx) => idx,
            None => {
                let idx = self.tables.len();
                self.tables.push(name.to_string());
                self.references.push(Vec::new());
                self.positions.insert(name.to_string(), idx);
                idx
            }
        };
        self.references[idx].extend(references.into_iter().map(Into::into));
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn resolve(&self) -> DependencyOrder {
        let n = self.tables.len();

        // depends_on[i]: tables i must follow. Self-references and tables
        // outside the graph impose no order.
        let mut depends_on: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (idx, refs) in self.references.iter().enumerate() {
            for referenced in refs {
                match self.positions.get(referenced.as_str()) {
                    Some(&target) if target != idx => {
                        if depends_on[idx].insert(target) {
                            dependents[target].push(idx);
                        }
                    }
                    Some(_) => {}
                    None => {
                        tracing::trace!(
                            table = %self.tables[idx],
                            referenced = %referenced,
                            "ignoring reference to a table outside the dump"
                        );
                    }
                }
            }
        }

        let mut pending: Vec<usize> = depends_on.iter().map(BTreeSet::len).collect();
        let mut ready: BTreeSet<usize> = (0..n).filter(|&i| pending[i] == 0).collect();
        let mut placed = vec![false; n];
        let mut result = DependencyOrder {
            order: Vec::with_capacity(n),
            cycle_breaks: Vec::new(),
        };

        while result.order.len() < n {
            let next = match ready.pop_first() {
                Some(idx) => idx,
                None => {
                    let Some(forced) = (0..n)
                        .find(|&i| !placed[i] && on_cycle(i, &depends_on, &placed))
                        .or_else(|| (0..n).find(|&i| !placed[i]))
                    else {
                        break;
                    };
                    let unresolved: Vec<String> = depends_on[forced]
                        .iter()
                        .filter(|&&dep| !placed[dep])
                        .map(|&dep| self.tables[dep].clone())
                        .collect();
                    tracing::warn!(
                        table = %self.tables[forced],
                        unresolved = ?unresolved,
                        "foreign key cycle, placing table before its references"
                    );
                    result.cycle_breaks.push(CycleBreak {
                        table: self.tables[forced].clone(),
                        unresolved,
                    });
                    forced
                }
            };

            placed[next] = true;
            result.order.push(self.tables[next].clone());
            for &dependent in &dependents[next] {
                if placed[dependent] {
                    continue;
                }
                pending[dependent] -= 1;
                if pending[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        result
    }
}

/// Whether `start` can reach itself through references to unplaced tables
fn on_cycle(start: usize, depends_on: &[BTreeSet<usize>], placed: &[bool]) -> bool {
    let mut visited = vec![false; depends_on.len()];
    let mut stack: Vec<usize> = depends_on[start]
        .iter()
        .copied()
        .filter(|&dep| !placed[dep])
        .collect();

    while let Some(idx) = stack.pop() {
        if idx == start {
            return true;
        }
        if visited[idx] {
            continue;
        }
        visited[idx] = true;
        stack.extend(depends_on[idx].iter().copied().filter(|&dep| !placed[dep]));
    }
    false
}
