use crate::models::random::{RandomSource, random_bool_array, shuffle};
use crate::models::{
    Chromosome, EvolutionaryAlgorithmOptions, GenePool, KPointCrossover, Mutation,
    NetworkDesignParameters, SelectionError, Tournament, count_active,
};
use tracing::instrument;

/// Draws allowed per random chromosome before the population is declared impossible.
const MAX_RANDOM_TENTATIVES: usize = 10;

/// Selection rounds allowed per reproduced generation.
const MAX_REPRODUCTION_ATTEMPTS: usize = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Impossible to generate an unexisting random candidate after {0} tentatives")]
    PopulationGeneration(usize),
    #[error("Could not reproduce a valid unique candidate after {0} attempts")]
    ReproductionExhausted(usize),
    #[error("Selection error: {0}")]
    SelectionError(#[from] SelectionError),
}

pub fn chromosome_name(generation_index: u32, candidate_index: usize) -> String {
    format!("GALN_GEN{generation_index}_C{candidate_index}")
}

/// Shape of the chromosomes of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenomeLayout {
    /// Number of simulatable lines.
    pub genes: usize,
    /// Leading genes that are always active.
    pub protected: usize,
    pub lines_min: Option<usize>,
    pub lines_max: Option<usize>,
}

impl GenomeLayout {
    pub fn new(genes: usize, protected: usize, network: &NetworkDesignParameters) -> Self {
        Self {
            genes,
            protected: protected.min(genes),
            lines_min: network.number_of_lines_min,
            lines_max: network.number_of_lines_max,
        }
    }

    fn free_genes(&self) -> usize {
        self.genes - self.protected
    }

    /// Bounds for freshly drawn chromosomes.
    fn random_bounds(&self) -> (usize, usize) {
        (
            self.lines_min.unwrap_or(1),
            self.lines_max.unwrap_or(self.free_genes()),
        )
    }

    /// Bounds reproduced chromosomes must respect; each side falls back to the other.
    fn reproduction_bounds(&self) -> Option<(usize, usize)> {
        match (
            self.lines_min.or(self.lines_max),
            self.lines_max.or(self.lines_min),
        ) {
            (Some(min), Some(max)) => Some((min, max)),
            _ => None,
        }
    }
}

/// Produces the chromosomes of new generations.
pub struct Breeder<'a> {
    options: &'a EvolutionaryAlgorithmOptions,
    layout: GenomeLayout,
    population_size: usize,
}

impl<'a> Breeder<'a> {
    pub fn new(
        options: &'a EvolutionaryAlgorithmOptions,
        layout: GenomeLayout,
        population_size: usize,
    ) -> Self {
        Self {
            options,
            layout,
            population_size,
        }
    }

    /// A chromosome with the protected prefix set and a random active-line count.
    ///
    /// The count is drawn once; only the positions are redrawn on collision.
    fn random_genes(&self, rng: &mut dyn RandomSource, pool: &GenePool) -> Result<Vec<bool>, Error> {
        let (min, max) = self.layout.random_bounds();
        let free = self.layout.free_genes();
        let additional = rng
            .integer(min, max)
            .saturating_sub(self.layout.protected)
            .min(free);

        for _ in 0..MAX_RANDOM_TENTATIVES {
            let mut genes = vec![true; self.layout.protected];
            genes.extend(random_bool_array(rng, free, additional));
            if !pool.contains(&genes) {
                return Ok(genes);
            }
        }

        Err(Error::PopulationGeneration(MAX_RANDOM_TENTATIVES))
    }

    #[instrument(level = "debug", skip(self, rng), fields(population_size = self.population_size, genes = self.layout.genes))]
    pub fn generate_first_chromosomes(
        &self,
        rng: &mut dyn RandomSource,
    ) -> Result<Vec<Chromosome>, Error> {
        let mut pool = GenePool::default();
        let mut chromosomes = Vec::with_capacity(self.population_size);

        for index in 0..self.population_size {
            let genes = self.random_genes(rng, &pool)?;
            pool.insert(genes.clone());
            chromosomes.push(Chromosome::new(genes, chromosome_name(0, index)));
        }

        Ok(chromosomes)
    }

    /// Builds generation `generation_index` from the previous one, ranked best-first.
    #[instrument(level = "debug", skip(self, rng, previous), fields(generation_index = generation_index, parents = previous.len(), population_size = self.population_size))]
    pub fn reproduce_chromosomes(
        &self,
        rng: &mut dyn RandomSource,
        previous: &[Chromosome],
        generation_index: u32,
    ) -> Result<Vec<Chromosome>, Error> {
        let protected = self.layout.protected;
        let order = self
            .options
            .shuffle_genes
            .then(|| gene_order(rng, self.layout.genes, protected));

        let parents: Vec<Vec<bool>> = previous
            .iter()
            .map(|chromosome| match &order {
                Some(order) => apply_order(chromosome.lines(), order),
                None => chromosome.lines().to_vec(),
            })
            .collect();

        let mut pool = GenePool::default();
        let mut children: Vec<Vec<bool>> = Vec::with_capacity(self.population_size);

        let elites = self.options.number_of_elites.min(parents.len());
        for genes in parents.iter().take(elites) {
            pool.insert(genes.clone());
            children.push(genes.clone());
        }

        for _ in 0..self.options.number_of_randoms {
            let genes = self.random_genes(rng, &pool)?;
            pool.insert(genes.clone());
            children.push(genes);
        }

        let tournament = Tournament::new(
            self.options.tournament_size,
            self.options.tournament_probability,
        );
        let crossover = KPointCrossover::new(self.options.crossover_number_of_cuts);
        let mutation = Mutation::new(self.options.mutation_probability);
        let bounds = self.layout.reproduction_bounds();
        let mut attempts = 0;

        while children.len() < self.population_size {
            attempts += 1;
            if attempts > MAX_REPRODUCTION_ATTEMPTS {
                return Err(Error::ReproductionExhausted(MAX_REPRODUCTION_ATTEMPTS));
            }

            let first = tournament.select_index(rng, parents.len(), &[])?;
            let child = if rng.float() > self.options.crossover_probability || parents.len() < 2 {
                parents[first].clone()
            } else {
                let second = tournament.select_index(rng, parents.len(), &[first])?;
                crossover.crossover(rng, &parents[first], &parents[second], protected)
            };
            let child = mutation.mutate(rng, child, protected);

            let active = count_active(&child);
            let in_range = bounds.is_none_or(|(min, max)| min <= active && active <= max);
            if in_range && !pool.contains(&child) {
                pool.insert(child.clone());
                children.push(child);
            }
        }

        tracing::debug!(attempts, "Generation reproduced");

        Ok(children
            .into_iter()
            .enumerate()
            .map(|(index, genes)| {
                let genes = match &order {
                    Some(order) => revert_order(&genes, order),
                    None => genes,
                };
                Chromosome::new(genes, chromosome_name(generation_index, index))
            })
            .collect())
    }
}

/// Permutation keeping the protected prefix in place and shuffling the rest.
fn gene_order(rng: &mut dyn RandomSource, genes: usize, protected: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..genes).collect();
    shuffle(rng, &mut order[protected..]);
    order
}

fn apply_order(genes: &[bool], order: &[usize]) -> Vec<bool> {
    order.iter().map(|&original| genes[original]).collect()
}

fn revert_order(shuffled: &[bool], order: &[usize]) -> Vec<bool> {
    let mut genes = vec![false; shuffled.len()];
    for (current, &original) in order.iter().enumerate() {
        genes[original] = shuffled[current];
    }
    genes
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    /// Answers `integer(3, 4)` with 3 then 4, and the lower bound otherwise.
    struct Scripted {
        counts: Vec<usize>,
    }

    impl RandomSource for Scripted {
        fn integer(&mut self, low: usize, high: usize) -> usize {
            if (low, high) == (3, 4) && !self.counts.is_empty() {
                self.counts.remove(0)
            } else {
                low
            }
        }

        fn float(&mut self) -> f64 {
            0.0
        }
    }

    fn network(min: Option<usize>, max: Option<usize>) -> NetworkDesignParameters {
        let mut network = NetworkDesignParameters::new(10);
        network.number_of_lines_min = min;
        network.number_of_lines_max = max;
        network
    }

    fn options(elites: usize, randoms: usize) -> EvolutionaryAlgorithmOptions {
        EvolutionaryAlgorithmOptions {
            number_of_elites: elites,
            number_of_randoms: randoms,
            ..Default::default()
        }
    }

    #[test]
    fn it_draws_the_active_line_count_for_each_candidate() {
        let options = options(1, 0);
        let layout = GenomeLayout::new(6, 0, &network(Some(3), Some(4)));
        let breeder = Breeder::new(&options, layout, 2);
        let mut rng = Scripted { counts: vec![3, 4] };

        let chromosomes = breeder.generate_first_chromosomes(&mut rng).unwrap();

        assert_eq!(chromosomes.len(), 2);
        assert_eq!(chromosomes[0].active_count(), 3);
        assert_eq!(chromosomes[1].active_count(), 4);
        assert_eq!(chromosomes[0].name(), "GALN_GEN0_C0");
        assert_eq!(chromosomes[1].name(), "GALN_GEN0_C1");
    }

    #[test]
    fn it_generates_distinct_chromosomes_with_the_protected_prefix() {
        let options = options(2, 0);
        let layout = GenomeLayout::new(10, 2, &network(Some(4), Some(7)));
        let breeder = Breeder::new(&options, layout, 20);
        let mut rng = StdRng::seed_from_u64(42);

        let chromosomes = breeder.generate_first_chromosomes(&mut rng).unwrap();
        let mut pool = GenePool::default();
        for chromosome in &chromosomes {
            assert!(chromosome.keeps_prefix(2));
            assert!((4..=7).contains(&chromosome.active_count()));
            assert!(pool.insert(chromosome.lines().to_vec()));
        }
    }

    #[test]
    fn it_fails_when_the_line_space_is_too_small() {
        let options = options(1, 0);
        let layout = GenomeLayout::new(2, 0, &network(Some(1), Some(1)));
        let breeder = Breeder::new(&options, layout, 3);
        let mut rng = StdRng::seed_from_u64(1);

        assert!(matches!(
            breeder.generate_first_chromosomes(&mut rng),
            Err(Error::PopulationGeneration(MAX_RANDOM_TENTATIVES))
        ));
    }

    #[test]
    fn it_reproduces_valid_unique_children_and_keeps_elites() {
        let options = EvolutionaryAlgorithmOptions {
            mutation_probability: 0.3,
            ..options(2, 1)
        };
        let layout = GenomeLayout::new(12, 3, &network(Some(5), Some(9)));
        let mut rng = StdRng::seed_from_u64(7);
        let previous = Breeder::new(&options, layout, 15)
            .generate_first_chromosomes(&mut rng)
            .unwrap();

        let children = Breeder::new(&options, layout, 15)
            .reproduce_chromosomes(&mut rng, &previous, 4)
            .unwrap();

        assert_eq!(children.len(), 15);
        assert_eq!(children[0].lines(), previous[0].lines());
        assert_eq!(children[1].lines(), previous[1].lines());
        assert_eq!(children[5].name(), "GALN_GEN4_C5");

        let mut pool = GenePool::default();
        for child in &children {
            assert!(child.keeps_prefix(3));
            assert!((5..=9).contains(&child.active_count()));
            assert!(pool.insert(child.lines().to_vec()));
        }
    }

    #[test]
    fn it_reverts_the_gene_shuffle() {
        let mut rng = StdRng::seed_from_u64(3);
        let order = gene_order(&mut rng, 8, 2);
        assert_eq!(&order[..2], &[0, 1]);

        let genes = vec![true, true, false, true, false, false, true, false];
        let shuffled = apply_order(&genes, &order);
        assert_eq!(count_active(&shuffled), count_active(&genes));
        assert_eq!(revert_order(&shuffled, &order), genes);
    }

    #[test]
    fn it_falls_back_on_the_other_bound_when_reproducing() {
        let layout = GenomeLayout::new(6, 0, &network(None, Some(3)));
        assert_eq!(layout.reproduction_bounds(), Some((3, 3)));
        assert_eq!(layout.random_bounds(), (1, 3));

        let unbounded = GenomeLayout::new(6, 0, &network(None, None));
        assert_eq!(unbounded.reproduction_bounds(), None);
        assert_eq!(unbounded.random_bounds(), (1, 6));
    }
}
