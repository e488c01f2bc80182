//! Self-tuning Metropolis-Hastings with optional parallel tempering over arbitrary
//! user-supplied likelihoods.
//!
//! Start with [`config::SamplerConfig`], then run either
//! [`single_chain::SingleChainSampler`] or [`tempering::ParallelTemperingSampler`].

pub mod config;
pub mod error;
pub mod history;
pub mod ladder;
pub mod likelihood;
pub mod metropolis;
pub mod parameters;
pub mod proposal;
pub mod single_chain;
pub mod tempering;
