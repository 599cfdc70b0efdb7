//! The metapopulation engine: deme creation, optimization, merging and
//! size control.
//!
//! Each expansion cycle picks an exemplar, decorates it with knobs,
//! optimizes the resulting neighborhood and folds the promising variants
//! back into the pool. The driver loop repeats cycles until a stop
//! condition is reached.

use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, warn};
use parking_lot::RwLock;
use rand::prelude::*;
use rand::rngs::StdRng;
use rayon::prelude::*;

use crate::schema::SearchConfig;

use super::deme::{Deme, ScoredInstance};
use super::pareto;
use super::score::{CompositeScore, Score, WORST_SCORE};
use super::select::select_exemplar;
use super::store::{CandidateStore, ScoredProgram};
use super::traits::{
    BehavioralScorer, CompositeScorer, FeatureSelector, Instance, Optimizer,
    ProgramSpace, Representation, argument,
};

/// Minimum pool size preserved by score-based trimming. Cutting deeper
/// risks a pool where none of the leaders reach a solution.
pub const MIN_POOL: usize = 250;

/// Leading entries protected from random eviction.
const OFFSET: usize = 50;

/// Errors surfaced by the engine.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("at least one seed exemplar is required")]
    NoSeeds,
    #[error("the metapopulation is empty")]
    EmptyMetapopulation,
    #[error("every exemplar has been visited and none could be expanded")]
    NoExemplar,
}

/// Why a run stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The evaluation budget was consumed.
    EvaluationBudget,
    /// Every exemplar was visited and no representation could be built.
    Exhausted,
    /// The merge callback requested termination.
    MergeCallback,
    /// The metapopulation became empty.
    EmptyPopulation,
    /// The cancel handle was set.
    Cancelled,
}

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct SearchResult<P> {
    /// Best composite score ever observed.
    pub best_score: CompositeScore,
    /// Programs achieving the best score.
    pub best_programs: Vec<P>,
    /// Total scoring-function evaluations.
    pub evaluations: u64,
    /// Expansion cycles completed.
    pub expansions: u64,
    /// Final pool size.
    pub metapop_size: usize,
    pub stop_reason: StopReason,
}

/// Highest score seen so far and the trees achieving it.
#[derive(Debug, Clone)]
struct BestRecord<P> {
    score: CompositeScore,
    programs: Vec<P>,
}

/// Per-cycle state: the representation and its deme.
struct OpenDeme<R> {
    repr: R,
    deme: Deme,
    evals_before: u64,
}

/// Merge callback: invoked with the candidates of each cycle before they
/// are merged; returning `true` terminates the run.
pub type MergeCallback<P> = Box<dyn FnMut(&[ScoredProgram<P>]) -> bool + Send>;

/// Bounded pool of scored candidate programs driving the search.
///
/// The pool is ordered by weighted score. Exemplars are drawn by softmax
/// over that score, expanded into demes through the program space's
/// representation, optimized, and merged back under domination and size
/// pressure.
pub struct Metapopulation<S, C, B, O>
where
    S: ProgramSpace,
    C: CompositeScorer<S::Program>,
    B: BehavioralScorer<S::Program>,
    O: Optimizer,
{
    space: S,
    cscorer: C,
    bscorer: B,
    optimizer: O,
    config: SearchConfig,
    store: CandidateStore<S::Program>,
    visited: HashSet<S::Program>,
    best: BestRecord<S::Program>,
    /// Exemplar of the current (or last) deme.
    exemplar: Option<ScoredProgram<S::Program>>,
    open: Option<OpenDeme<S::Repr>>,
    rng: StdRng,
    pool: Option<rayon::ThreadPool>,
    n_evals: u64,
    n_expansions: u64,
    cancelled: Arc<AtomicBool>,
    feature_selector: Option<Box<dyn FeatureSelector<S::Program>>>,
    merge_callback: Option<MergeCallback<S::Program>>,
}

impl<S, C, B, O> Metapopulation<S, C, B, O>
where
    S: ProgramSpace,
    C: CompositeScorer<S::Program>,
    B: BehavioralScorer<S::Program>,
    O: Optimizer,
{
    /// Create an engine seeded with the given exemplar trees. Each seed is
    /// reduced and scored before entering the pool.
    pub fn new(
        space: S,
        cscorer: C,
        bscorer: B,
        optimizer: O,
        exemplars: Vec<S::Program>,
        config: SearchConfig,
    ) -> Result<Self, SearchError> {
        if exemplars.is_empty() {
            return Err(SearchError::NoSeeds);
        }

        let rng = match config.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let pool = if config.jobs > 1 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(config.jobs)
                .build()
            {
                Ok(pool) => Some(pool),
                Err(err) => {
                    warn!("falling back to serial execution: {err}");
                    None
                }
            }
        } else {
            None
        };

        let mut engine = Self {
            store: CandidateStore::new(config.complexity_weight),
            space,
            cscorer,
            bscorer,
            optimizer,
            config,
            visited: HashSet::new(),
            best: BestRecord {
                score: CompositeScore::worst(),
                programs: Vec::new(),
            },
            exemplar: None,
            open: None,
            rng,
            pool,
            n_evals: 0,
            n_expansions: 0,
            cancelled: Arc::new(AtomicBool::new(false)),
            feature_selector: None,
            merge_callback: None,
        };
        engine.seed(exemplars);
        Ok(engine)
    }

    fn seed(&mut self, exemplars: Vec<S::Program>) {
        let mut entries = Vec::with_capacity(exemplars.len());
        for base in exemplars {
            let reduced = self.space.reduce(&base);
            let pbs = self.bscorer.behavioral(&reduced);
            let score = self.cscorer.composite(&reduced);
            entries.push(ScoredProgram {
                program: reduced,
                bscore: pbs.bscore,
                score,
            });
        }
        self.update_best(&entries);
        self.merge_candidates(entries);
    }

    /// Total scoring-function evaluations so far.
    pub fn n_evals(&self) -> u64 {
        self.n_evals
    }

    /// Expansion cycles completed so far.
    pub fn n_expansions(&self) -> u64 {
        self.n_expansions
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Pool entries in rank order, best first.
    pub fn candidates(&self) -> impl Iterator<Item = &ScoredProgram<S::Program>> {
        self.store.iter()
    }

    /// Best composite score ever observed.
    pub fn best_score(&self) -> CompositeScore {
        self.best.score
    }

    /// Programs achieving the best score.
    pub fn best_programs(&self) -> &[S::Program] {
        &self.best.programs
    }

    /// Trees already used as exemplars.
    pub fn visited(&self) -> &HashSet<S::Program> {
        &self.visited
    }

    /// Handle for cooperative cancellation, checked at cycle boundaries.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn set_merge_callback(
        &mut self,
        callback: impl FnMut(&[ScoredProgram<S::Program>]) -> bool + Send + 'static,
    ) {
        self.merge_callback = Some(Box::new(callback));
    }

    pub fn set_feature_selector(
        &mut self,
        selector: impl FeatureSelector<S::Program> + 'static,
    ) {
        self.feature_selector = Some(Box::new(selector));
    }

    /// Width of the weighted-score band the softmax draws from with
    /// non-negligible probability.
    pub fn useful_score_range(&self) -> Score {
        self.config.complexity_temperature * 30.0 / 100.0
    }

    /// Pick an exemplar and decorate it with knobs, opening a new deme.
    ///
    /// Exemplars whose representation comes out empty are marked visited
    /// and the next one is drawn. When every tree has been visited the
    /// visited set is cleared once if revisiting is enabled; otherwise
    /// the error is surfaced.
    pub fn create_deme(&mut self) -> Result<(), SearchError> {
        debug_assert!(self.open.is_none(), "a deme is already open");

        if self.store.is_empty() {
            return Err(SearchError::EmptyMetapopulation);
        }

        let mut cleared = false;
        let repr = loop {
            let prev_bscore = self
                .exemplar
                .as_ref()
                .map(|e| e.bscore.as_slice())
                .filter(|b| !b.is_empty());
            let picked = select_exemplar(
                &mut self.store,
                &self.visited,
                prev_bscore,
                self.config.complexity_temperature,
                self.config.use_diversity_penalty,
                &mut self.rng,
            );

            let Some(entry) = picked else {
                if self.config.revisit && !cleared {
                    cleared = true;
                    self.visited.clear();
                    info!(
                        "all exemplars visited; clearing the visited set \
                         for another pass"
                    );
                    continue;
                }
                warn!(
                    "all exemplars have been visited and no representation \
                     could be built for any of them"
                );
                return Err(SearchError::NoExemplar);
            };

            debug!("building representation for exemplar {}", entry.score);

            let mut ignore_ops = self.config.ignore_ops.clone();
            if let Some(selector) = &self.feature_selector {
                let selected = selector.select(&entry.program);
                for column in 0..selector.arity() {
                    if !selected.contains(&column) {
                        ignore_ops.insert(argument(column + 1));
                    }
                }
            }

            match self.space.build_repr(&entry.program, &ignore_ops) {
                Some(repr) => {
                    self.exemplar = Some(entry);
                    break repr;
                }
                None => {
                    info!("empty representation; trying the next exemplar");
                    self.visited.insert(entry.program.clone());
                    self.exemplar = Some(entry);
                }
            }
        };

        let deme = Deme::new(repr.fields().to_vec());
        self.open = Some(OpenDeme {
            repr,
            deme,
            evals_before: self.n_evals,
        });
        Ok(())
    }

    /// Run the inner optimizer over the open deme. Returns the number of
    /// evaluations consumed. An optimizer failure discards the cycle's
    /// work and counts zero evaluations.
    pub fn optimize_deme(&mut self, max_evals: u64) -> u64 {
        let Some(open) = self.open.as_mut() else {
            return 0;
        };
        debug!("optimize deme; max evaluations allowed: {max_evals}");

        let repr = &open.repr;
        let reduce_all = self.config.reduce_all;
        let cscorer = &self.cscorer;
        let scorer = |instance: &Instance| {
            let program = repr.candidate(instance, reduce_all);
            cscorer.composite(&program)
        };

        match self.optimizer.optimize(&mut open.deme, &scorer, max_evals) {
            Ok(used) => {
                self.n_evals += used;
                used
            }
            Err(err) => {
                warn!("optimizer failed: {err}; discarding this deme");
                0
            }
        }
    }

    /// Fold the optimized deme back into the pool: mark the exemplar
    /// visited, trim the deme, extract unique candidates, optionally
    /// behavioral-score and domination-filter them, update the best
    /// record and merge. Returns `true` when the merge callback requested
    /// termination.
    pub fn close_deme(&mut self) -> bool {
        let Some(open) = self.open.take() else {
            return false;
        };
        let OpenDeme {
            repr,
            mut deme,
            evals_before,
        } = open;
        let Some(exemplar) = self.exemplar.clone() else {
            return false;
        };

        let mut evals_this_deme =
            ((self.n_evals - evals_before) as usize).min(deme.len());
        debug!("close deme; evaluations performed: {evals_this_deme}");

        self.visited.insert(exemplar.program);

        let complexity_weight = self.config.complexity_weight;
        deme.sort_by_weighted(complexity_weight);

        // Instances far below the deme's top score have no chance in the
        // softmax draw; drop them before the expensive extraction.
        if deme.len() > MIN_POOL {
            let top = deme.as_slice()[0].score.weighted(complexity_weight);
            let floor = top - self.useful_score_range();
            let dropped = deme.trim_tail(floor, complexity_weight);
            if dropped > 0 {
                debug!("trimmed {dropped} weak instances from the deme");
            }
            evals_this_deme = evals_this_deme.min(deme.len());
        }

        let candidates = self.extract_candidates(&repr, &deme, evals_this_deme);
        let mut candidates = self.score_candidates(candidates);

        if !self.config.include_dominated {
            let before = candidates.len();
            pareto::remove_dominated(&mut candidates, self.config.jobs);
            debug!(
                "removed {} dominated candidates out of {before}",
                before - candidates.len()
            );
        }

        if self.update_best(&candidates) {
            self.log_best();
        }

        let mut done = false;
        if let Some(callback) = &mut self.merge_callback {
            done = callback(&candidates);
        }

        debug!("merging {} candidates into the pool", candidates.len());
        self.merge_candidates(candidates);
        debug!("metapopulation size is {}", self.store.len());

        done
    }

    /// Materialise the unique, unvisited trees of the deme's evaluated
    /// prefix, bounded by the candidate cap.
    fn extract_candidates(
        &self,
        repr: &S::Repr,
        deme: &Deme,
        evals_this_deme: usize,
    ) -> Vec<ScoredProgram<S::Program>> {
        let pending: RwLock<HashMap<S::Program, CompositeScore>> =
            RwLock::new(HashMap::new());
        let max_candidates = self.config.max_candidates;
        let visited = &self.visited;
        let store = &self.store;

        let consider = |scored: &ScoredInstance| {
            let score = scored.score;
            if !score.score.is_finite() || score.score <= WORST_SCORE {
                return;
            }
            if let Some(limit) = max_candidates
                && pending.read().len() >= limit
            {
                return;
            }
            let tree = repr.candidate(&scored.instance, true);
            if visited.contains(&tree) || store.contains(&tree) {
                return;
            }
            if pending.read().contains_key(&tree) {
                return;
            }
            pending.write().entry(tree).or_insert(score);
        };

        let evaluated = &deme.as_slice()[..evals_this_deme];
        match &self.pool {
            Some(pool) => pool.install(|| evaluated.par_iter().for_each(consider)),
            None => evaluated.iter().for_each(consider),
        }

        let mut candidates: Vec<ScoredProgram<S::Program>> = pending
            .into_inner()
            .into_iter()
            .map(|(program, score)| ScoredProgram {
                program,
                bscore: Vec::new(),
                score,
            })
            .collect();

        // Reproducible order regardless of map iteration: weighted score
        // descending, printed form breaking ties.
        let complexity_weight = self.config.complexity_weight;
        candidates.sort_by_cached_key(|c| c.program.to_string());
        candidates.sort_by(|a, b| {
            b.score
                .weighted(complexity_weight)
                .total_cmp(&a.score.weighted(complexity_weight))
        });
        candidates
    }

    /// Attach behavioral scores when domination filtering or the
    /// diversity penalty needs them.
    fn score_candidates(
        &self,
        mut candidates: Vec<ScoredProgram<S::Program>>,
    ) -> Vec<ScoredProgram<S::Program>> {
        if self.config.include_dominated && !self.config.use_diversity_penalty {
            return candidates;
        }
        debug!(
            "computing behavioral scores of {} candidates",
            candidates.len()
        );
        let bscorer = &self.bscorer;
        let fill = |candidate: &mut ScoredProgram<S::Program>| {
            candidate.bscore = bscorer.behavioral(&candidate.program).bscore;
        };
        match &self.pool {
            Some(pool) => {
                pool.install(|| candidates.par_iter_mut().for_each(fill))
            }
            None => candidates.iter_mut().for_each(fill),
        }
        candidates
    }

    /// Merge candidates into the store and apply size pressure.
    fn merge_candidates(&mut self, candidates: Vec<ScoredProgram<S::Program>>) {
        if self.config.include_dominated {
            for candidate in candidates {
                self.store.insert(candidate);
            }
        } else {
            self.merge_nondominated(candidates);
        }
        self.resize_metapop();
    }

    /// Merge candidates assumed internally non-dominated, erasing the
    /// pool entries they now dominate.
    fn merge_nondominated(&mut self, candidates: Vec<ScoredProgram<S::Program>>) {
        let n_candidates = candidates.len();
        let pool: Vec<&ScoredProgram<S::Program>> =
            candidates.iter().chain(self.store.iter()).collect();
        let candidate_ids: Vec<usize> = (0..n_candidates).collect();
        let store_ids: Vec<usize> = (n_candidates..pool.len()).collect();

        let (keep_candidates, keep_store) = pareto::nondominated_disjoint(
            &pool,
            candidate_ids,
            store_ids,
            self.config.jobs.max(1),
        );

        let keep_store: HashSet<usize> = keep_store.into_iter().collect();
        let dead: Vec<S::Program> = (n_candidates..pool.len())
            .filter(|id| !keep_store.contains(id))
            .map(|id| pool[id].program.clone())
            .collect();
        let keep_candidates: HashSet<usize> =
            keep_candidates.into_iter().collect();
        drop(pool);

        for program in &dead {
            self.store.remove_program(program);
        }
        for (id, candidate) in candidates.into_iter().enumerate() {
            if keep_candidates.contains(&id) {
                self.store.insert(candidate);
            }
        }
    }

    /// Weed out entries the softmax would never pick, then bound the pool
    /// size, evicting random entries outside the protected head.
    fn resize_metapop(&mut self) {
        if self.store.len() < MIN_POOL {
            return;
        }

        let top = self.store.top_weighted().unwrap_or(WORST_SCORE);
        let floor = top - self.useful_score_range();
        let removed = self.store.trim_below(MIN_POOL, floor);
        if removed > 0 {
            debug!("evicted {removed} low-scoring entries");
        }

        let expansions = self.n_expansions as f64;
        let cap = (50.0
            * (expansions + 250.0)
            * (1.0 + 2.0 * (-expansions / 500.0).exp())) as usize;
        self.enforce_cap(cap);
    }

    fn enforce_cap(&mut self, cap: usize) {
        while self.store.len() > cap.max(OFFSET) {
            let index = self.rng.gen_range(OFFSET..self.store.len());
            self.store.remove_nth(index);
        }
    }

    /// Record candidates beating or tying the best score seen. Returns
    /// whether the record improved.
    fn update_best(&mut self, candidates: &[ScoredProgram<S::Program>]) -> bool {
        let mut improved = false;
        for candidate in candidates {
            let score = candidate.score.score;
            let complexity = candidate.score.complexity;
            let best_score = self.best.score.score;
            let best_complexity = self.best.score.complexity;

            if score > best_score
                || (score == best_score && complexity <= best_complexity)
            {
                if score > best_score
                    || (score == best_score && complexity < best_complexity)
                {
                    self.best.score = candidate.score;
                    self.best.programs.clear();
                    improved = true;
                    debug!("new best score: {}", self.best.score);
                }
                if !self.best.programs.contains(&candidate.program) {
                    self.best.programs.push(candidate.program.clone());
                }
            }
        }
        improved
    }

    fn log_best(&self) {
        info!("best score so far: {}", self.best.score);
        for program in &self.best.programs {
            info!("  {program}");
        }
    }

    /// Run one full expansion cycle. Returns `true` when the merge
    /// callback requested termination.
    pub fn expand(&mut self, max_evals: u64) -> Result<bool, SearchError> {
        let best_before = self.best.score;

        self.create_deme()?;
        self.n_expansions += 1;
        self.optimize_deme(max_evals);
        let done = self.close_deme();

        if self.best.score != best_before {
            info!(
                "expansion {}: {} evaluations so far, new best {}",
                self.n_expansions, self.n_evals, self.best.score
            );
        } else {
            info!(
                "expansion {}: {} evaluations so far",
                self.n_expansions, self.n_evals
            );
        }

        Ok(done)
    }

    /// Drive repeated expansions until a stop condition is met.
    pub fn run(&mut self, max_evals: u64) -> SearchResult<S::Program> {
        let stop_reason = loop {
            if self.cancelled.load(Ordering::Relaxed) {
                break StopReason::Cancelled;
            }
            if self.n_evals >= max_evals {
                break StopReason::EvaluationBudget;
            }
            if self.store.is_empty() {
                break StopReason::EmptyPopulation;
            }

            match self.expand(max_evals - self.n_evals) {
                Ok(false) => {}
                Ok(true) => break StopReason::MergeCallback,
                Err(SearchError::EmptyMetapopulation) => {
                    break StopReason::EmptyPopulation;
                }
                Err(_) => break StopReason::Exhausted,
            }
        };

        info!(
            "search stopped ({stop_reason:?}) after {} expansions and {} \
             evaluations; best {}",
            self.n_expansions, self.n_evals, self.best.score
        );

        SearchResult {
            best_score: self.best.score,
            best_programs: self.best.programs.clone(),
            evaluations: self.n_evals,
            expansions: self.n_expansions,
            metapop_size: self.store.len(),
            stop_reason,
        }
    }

    /// Dump candidates in rank order, one per line:
    /// `<score> [<complexity>] <tree>`.
    pub fn write_candidates<W: io::Write>(
        &self,
        out: &mut W,
        limit: Option<usize>,
        with_complexity: bool,
    ) -> io::Result<()> {
        for entry in self.store.iter().take(limit.unwrap_or(usize::MAX)) {
            if with_complexity {
                writeln!(
                    out,
                    "{} {} {}",
                    entry.score.score, entry.score.complexity, entry.program
                )?;
            } else {
                writeln!(out, "{} {}", entry.score.score, entry.program)?;
            }
        }
        Ok(())
    }
}
