//! Search space definitions and the strategies that walk it.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use pt_types::{ExperimentError, PtResult};

use crate::experiment::{ExperimentConfig, ObjectiveDirection};

/// One sampled point: parameter name to value.
pub type ParameterSet = HashMap<String, ParameterValue>;

/// Fraction of a dimension's width that one exploitation step may move.
const PERTURBATION: f64 = 0.1;

/// A named dimension of the search space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
    pub name: String,
    pub kind: ParameterKind,
}

/// Inclusive bounds of one dimension.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ParameterKind {
    Float { low: f64, high: f64 },
    Int { low: i64, high: i64 },
}

impl ParameterKind {
    fn sample(&self, rng: &mut ChaCha8Rng) -> ParameterValue {
        match *self {
            Self::Float { low, high } => ParameterValue::Float(rng.gen_range(low..=high)),
            Self::Int { low, high } => ParameterValue::Int(rng.gen_range(low..=high)),
        }
    }

    fn lower_bound(&self) -> ParameterValue {
        match *self {
            Self::Float { low, .. } => ParameterValue::Float(low),
            Self::Int { low, .. } => ParameterValue::Int(low),
        }
    }

    /// Move `value` by a random step proportional to the dimension's width,
    /// staying inside the bounds. Values of the wrong type are resampled.
    fn perturb(&self, value: &ParameterValue, rng: &mut ChaCha8Rng) -> ParameterValue {
        match (*self, value) {
            (Self::Float { low, high }, ParameterValue::Float(v)) => {
                let reach = PERTURBATION * (high - low);
                ParameterValue::Float((v + rng.gen_range(-reach..=reach)).clamp(low, high))
            }
            (Self::Int { low, high }, ParameterValue::Int(v)) => {
                // at least two steps so narrow ranges still move
                let reach = ((high - low) as f64 * PERTURBATION).ceil().max(2.0) as i64;
                ParameterValue::Int((v + rng.gen_range(-reach..=reach)).clamp(low, high))
            }
            _ => self.sample(rng),
        }
    }

    /// Evenly spaced points from low to high. Integer ranges no wider than
    /// `steps` are enumerated in full.
    fn grid(&self, steps: usize) -> Vec<ParameterValue> {
        let fraction = |i: usize| i as f64 / (steps - 1) as f64;
        match *self {
            Self::Float { low, high } => (0..steps)
                .map(|i| ParameterValue::Float(low + fraction(i) * (high - low)))
                .collect(),
            Self::Int { low, high } if (high - low + 1) as usize <= steps => {
                (low..=high).map(ParameterValue::Int).collect()
            }
            Self::Int { low, high } => {
                let mut points: Vec<i64> = (0..steps)
                    .map(|i| low + (fraction(i) * (high - low) as f64).round() as i64)
                    .collect();
                points.dedup();
                points.into_iter().map(ParameterValue::Int).collect()
            }
        }
    }
}

/// A concrete value for one dimension.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
}

impl ParameterValue {
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Float(v) => Some(v),
            Self::Int(v) => Some(v as f64),
        }
    }

    /// Integral values only; a float with a fractional part yields `None`.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Int(v) => Some(v),
            Self::Float(v) if v.is_finite() && v.fract() == 0.0 => Some(v as i64),
            Self::Float(_) => None,
        }
    }
}

impl std::fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
        }
    }
}

/// Ordered list of dimensions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    pub parameters: Vec<ParameterDef>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_float(self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.with_dimension(name.into(), ParameterKind::Float { low, high })
    }

    pub fn add_int(self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.with_dimension(name.into(), ParameterKind::Int { low, high })
    }

    fn with_dimension(mut self, name: String, kind: ParameterKind) -> Self {
        self.parameters.push(ParameterDef { name, kind });
        self
    }

    fn sample(&self, rng: &mut ChaCha8Rng) -> ParameterSet {
        self.parameters
            .iter()
            .map(|p| (p.name.clone(), p.kind.sample(rng)))
            .collect()
    }

    /// Every dimension at its lower bound.
    fn low_corner(&self) -> ParameterSet {
        self.parameters
            .iter()
            .map(|p| (p.name.clone(), p.kind.lower_bound()))
            .collect()
    }
}

/// Proposes points to evaluate and optionally learns from their results.
pub trait SearchStrategy: Send {
    /// Up to `count` new points. Fewer (or none) means the strategy is exhausted.
    fn suggest(&mut self, count: usize) -> Vec<ParameterSet>;

    /// Objective observed for a point previously suggested.
    fn report(&mut self, _params: &ParameterSet, _objective: f64) {}

    fn name(&self) -> &str;
}

/// Build the strategy named by `config.strategy` over `space`.
pub fn build_strategy(config: &ExperimentConfig, space: SearchSpace) -> PtResult<Box<dyn SearchStrategy>> {
    config.validate()?;
    let strategy: Box<dyn SearchStrategy> = match config.strategy.as_str() {
        "grid" => Box::new(GridSearch::new(space, config.grid_steps)),
        "random" => Box::new(RandomSearch::new(space, config.seed)),
        "frugal" => Box::new(FrugalSearch::new(
            space,
            config.direction,
            config.exploration_weight,
            config.seed,
        )),
        other => {
            return Err(ExperimentError::UnknownStrategy {
                name: other.to_string(),
            }
            .into())
        }
    };
    Ok(strategy)
}

// ---- Grid search ----

/// Walks the Cartesian product of each dimension's grid, in order.
#[derive(Debug, Clone)]
pub struct GridSearch {
    points: Vec<ParameterSet>,
    next: usize,
}

impl GridSearch {
    /// `steps` points per float dimension (at least two).
    pub fn new(space: SearchSpace, steps: usize) -> Self {
        let steps = steps.max(2);
        let axes: Vec<(&str, Vec<ParameterValue>)> = space
            .parameters
            .iter()
            .map(|p| (p.name.as_str(), p.kind.grid(steps)))
            .collect();

        let total: usize = axes.iter().map(|(_, values)| values.len()).product();
        let mut points = Vec::with_capacity(total);
        for mut index in 0..total {
            // mixed-radix decode: the last dimension varies fastest
            let mut point = ParameterSet::with_capacity(axes.len());
            for (name, values) in axes.iter().rev() {
                point.insert(name.to_string(), values[index % values.len()]);
                index /= values.len();
            }
            points.push(point);
        }

        Self { points, next: 0 }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl SearchStrategy for GridSearch {
    fn suggest(&mut self, count: usize) -> Vec<ParameterSet> {
        let end = self.points.len().min(self.next + count);
        let batch = self.points[self.next..end].to_vec();
        self.next = end;
        batch
    }

    fn name(&self) -> &str {
        "grid"
    }
}

// ---- Random search ----

/// Independent uniform samples from every dimension.
#[derive(Debug, Clone)]
pub struct RandomSearch {
    space: SearchSpace,
    rng: ChaCha8Rng,
}

impl RandomSearch {
    pub fn new(space: SearchSpace, seed: u64) -> Self {
        Self {
            space,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl SearchStrategy for RandomSearch {
    fn suggest(&mut self, count: usize) -> Vec<ParameterSet> {
        (0..count).map(|_| self.space.sample(&mut self.rng)).collect()
    }

    fn name(&self) -> &str {
        "random"
    }
}

// ---- Frugal search ----

/// Local search that starts at the space's low corner and perturbs the best
/// point seen so far, mixing in uniform samples with probability
/// `exploration_weight`.
///
/// Starting low means the cheapest configuration (fewest iterations) is tried
/// first and costlier ones only win by improving the objective.
#[derive(Debug, Clone)]
pub struct FrugalSearch {
    space: SearchSpace,
    direction: ObjectiveDirection,
    exploration_weight: f64,
    observations: Vec<(ParameterSet, f64)>,
    started: bool,
    rng: ChaCha8Rng,
}

impl FrugalSearch {
    pub fn new(
        space: SearchSpace,
        direction: ObjectiveDirection,
        exploration_weight: f64,
        seed: u64,
    ) -> Self {
        Self {
            space,
            direction,
            exploration_weight,
            observations: Vec::new(),
            started: false,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Best usable observation; failed trials carry `f64::MAX` and are ignored.
    fn best(&self) -> Option<&ParameterSet> {
        self.observations
            .iter()
            .filter(|(_, objective)| objective.is_finite() && *objective < f64::MAX)
            .reduce(|best, candidate| {
                if self.direction.improves(candidate.1, best.1) {
                    candidate
                } else {
                    best
                }
            })
            .map(|(params, _)| params)
    }

    fn next_point(&mut self) -> ParameterSet {
        if !self.started {
            self.started = true;
            return self.space.low_corner();
        }
        if self.rng.gen::<f64>() < self.exploration_weight {
            return self.space.sample(&mut self.rng);
        }
        let Some(base) = self.best().cloned() else {
            return self.space.sample(&mut self.rng);
        };

        let mut point = ParameterSet::with_capacity(self.space.parameters.len());
        for param in &self.space.parameters {
            let value = match base.get(&param.name) {
                Some(current) => param.kind.perturb(current, &mut self.rng),
                None => param.kind.sample(&mut self.rng),
            };
            point.insert(param.name.clone(), value);
        }
        point
    }
}

impl SearchStrategy for FrugalSearch {
    fn suggest(&mut self, count: usize) -> Vec<ParameterSet> {
        (0..count).map(|_| self.next_point()).collect()
    }

    fn report(&mut self, params: &ParameterSet, objective: f64) {
        self.observations.push((params.clone(), objective));
    }

    fn name(&self) -> &str {
        "frugal"
    }
}
