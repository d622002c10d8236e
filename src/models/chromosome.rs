use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::instrument;

/// Which simulatable lines are active in a candidate network, plus a name.
///
/// Gene `i` refers to line `i` of the run's ordered line collection, so the
/// vector is only meaningful together with that ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chromosome {
    pub(crate) lines: Vec<bool>,
    pub(crate) name: String,
}

impl Chromosome {
    #[instrument(level = "debug", skip_all, fields(genome_length = lines.len()))]
    pub fn new(lines: Vec<bool>, name: impl Into<String>) -> Self {
        Self {
            lines,
            name: name.into(),
        }
    }

    pub fn lines(&self) -> &[bool] {
        &self.lines
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn active_count(&self) -> usize {
        count_active(&self.lines)
    }

    /// Indices of the active lines, in gene order.
    pub fn active_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.lines
            .iter()
            .enumerate()
            .filter_map(|(index, &active)| active.then_some(index))
    }

    pub fn keeps_prefix(&self, protected: usize) -> bool {
        self.lines.iter().take(protected).all(|&active| active)
    }
}

pub(crate) fn count_active(genes: &[bool]) -> usize {
    genes.iter().filter(|&&active| active).count()
}

/// Generation-scoped set of gene vectors used to reject duplicates.
#[derive(Debug, Default)]
pub(crate) struct GenePool {
    seen: HashSet<Vec<bool>>,
}

impl GenePool {
    pub(crate) fn contains(&self, genes: &[bool]) -> bool {
        self.seen.contains(genes)
    }

    pub(crate) fn insert(&mut self, genes: Vec<bool>) -> bool {
        self.seen.insert(genes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_counts_active_lines() {
        let chromosome = Chromosome::new(vec![true, false, true, true], "GALN_GEN0_C0");
        assert_eq!(chromosome.active_count(), 3);
        assert_eq!(chromosome.active_indices().collect::<Vec<_>>(), vec![0, 2, 3]);
    }

    #[test]
    fn it_checks_the_protected_prefix() {
        let chromosome = Chromosome::new(vec![true, true, false], "c");
        assert!(chromosome.keeps_prefix(0));
        assert!(chromosome.keeps_prefix(2));
        assert!(!chromosome.keeps_prefix(3));
    }

    #[test]
    fn it_rejects_duplicate_genes_regardless_of_name() {
        let mut pool = GenePool::default();
        assert!(pool.insert(vec![true, false]));
        assert!(pool.contains(&[true, false]));
        assert!(!pool.insert(vec![true, false]));
        assert!(!pool.contains(&[false, true]));
    }
}
