//! Outcome prediction engine
//!
//! Turns an outcome history into a calibrated next-round prediction:
//! - Multi-order Markov transition tables
//! - Shape and sliding-window pattern detection
//! - Bayesian feature posterior
//! - Monte Carlo dice resampling
//! - Self-learning correction cascade
//! - Expert panel of single-signal heuristics
//! - Vote combiner with entropy-based confidence

pub mod bayes;
pub mod cascade;
pub mod dictionary;
pub mod ensemble;
pub mod experts;
pub mod markov;
pub mod monte_carlo;
pub mod shape;

#[cfg(test)]
mod tests;

pub use cascade::{BreakAttempt, CascadeDecision, LearnedState, PatternStat, Rule};
pub use dictionary::TemplateDictionary;
pub use ensemble::{Ensemble, CONF_MAX, CONF_MIN};
pub use markov::{MarkovEnsemble, MAX_ORDER};
pub use shape::{current_streak, ShapeAnalysis, Streak};
