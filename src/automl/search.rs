//! Hyperparameter search spaces and random sampling

use std::collections::BTreeMap;

use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// A concrete hyperparameter value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
}

impl ParamValue {
    pub fn as_f64(&self) -> f64 {
        match self {
            ParamValue::Int(v) => *v as f64,
            ParamValue::Float(v) => *v,
        }
    }

    pub fn as_usize(&self) -> usize {
        match self {
            ParamValue::Int(v) => (*v).max(0) as usize,
            ParamValue::Float(v) => v.max(0.0).round() as usize,
        }
    }
}

/// Named hyperparameters, ordered for stable serialization
pub type Hyperparams = BTreeMap<String, ParamValue>;

/// Look up a parameter with a fallback.
pub fn param_f64(params: &Hyperparams, name: &str, default: f64) -> f64 {
    params.get(name).map(ParamValue::as_f64).unwrap_or(default)
}

pub fn param_usize(params: &Hyperparams, name: &str, default: usize) -> usize {
    params.get(name).map(ParamValue::as_usize).unwrap_or(default)
}

/// Range a parameter is drawn from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamRange {
    Int { low: i64, high: i64 },
    Float { low: f64, high: f64, log_scale: bool },
}

/// A single tunable hyperparameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub range: ParamRange,
}

impl Parameter {
    /// Integer parameter in `[low, high]`
    pub fn int(name: impl Into<String>, low: i64, high: i64) -> Self {
        Self {
            name: name.into(),
            range: ParamRange::Int { low, high },
        }
    }

    /// Float parameter sampled uniformly on a log scale
    pub fn log_float(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            range: ParamRange::Float {
                low,
                high,
                log_scale: true,
            },
        }
    }

    pub fn sample(&self, rng: &mut impl Rng) -> ParamValue {
        match &self.range {
            ParamRange::Int { low, high } => ParamValue::Int(rng.gen_range(*low..=*high)),
            ParamRange::Float { low, high, log_scale } => {
                let val = if *log_scale {
                    rng.gen_range(low.ln()..=high.ln()).exp()
                } else {
                    rng.gen_range(*low..=*high)
                };
                ParamValue::Float(val)
            }
        }
    }
}

/// Collection of tunable parameters for one model family
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchSpace {
    params: Vec<Parameter>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, param: Parameter) -> Self {
        self.params.push(param);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    /// Draw one value per parameter, on top of `base`.
    pub fn sample(&self, base: &Hyperparams, rng: &mut impl Rng) -> Hyperparams {
        let mut drawn = base.clone();
        for param in &self.params {
            drawn.insert(param.name.clone(), param.sample(rng));
        }
        drawn
    }
}

/// Seeded random sampler
#[derive(Debug)]
pub struct RandomSampler {
    rng: Xoshiro256PlusPlus,
}

impl RandomSampler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
        }
    }

    pub fn sample(&mut self, space: &SearchSpace, base: &Hyperparams) -> Hyperparams {
        space.sample(base, &mut self.rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space() -> SearchSpace {
        SearchSpace::new()
            .add(Parameter::int("n_neighbors", 1, 25))
            .add(Parameter::log_float("C", 0.01, 10.0))
    }

    #[test]
    fn test_samples_stay_in_range() {
        let mut sampler = RandomSampler::new(7);
        for _ in 0..200 {
            let params = sampler.sample(&space(), &Hyperparams::new());
            let k = params["n_neighbors"].as_usize();
            let c = params["C"].as_f64();
            assert!((1..=25).contains(&k));
            assert!((0.01..=10.0).contains(&c));
        }
    }

    #[test]
    fn test_same_seed_same_draws() {
        let mut a = RandomSampler::new(42);
        let mut b = RandomSampler::new(42);
        for _ in 0..10 {
            assert_eq!(a.sample(&space(), &Hyperparams::new()), b.sample(&space(), &Hyperparams::new()));
        }
    }

    #[test]
    fn test_base_params_are_kept() {
        let mut base = Hyperparams::new();
        base.insert("max_iter".to_string(), ParamValue::Int(300));
        let params = RandomSampler::new(1).sample(&space(), &base);
        assert_eq!(params["max_iter"], ParamValue::Int(300));
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_param_value_json_shape() {
        let json = serde_json::to_string(&ParamValue::Int(5)).unwrap();
        assert_eq!(json, "5");
        let back: ParamValue = serde_json::from_str("0.25").unwrap();
        assert_eq!(back, ParamValue::Float(0.25));
    }
}
