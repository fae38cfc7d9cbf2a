//! AutoML Agent - natural-language driven AutoML
//!
//! Upload a tabular dataset, describe what to predict, and get back a tuned
//! model plus a leaderboard of the candidates that were compared. Saved
//! models can then be queried one row at a time.
//!
//! # Modules
//!
//! ## Core
//! - [`dataset`] - CSV / Excel loading and dataset validation
//! - [`task`] - Task kinds and the two task-inference rules
//! - [`intent`] - Prompt to target / task kind extraction
//! - [`orchestrator`] - The fixed training sequence
//! - [`normalize`] - Stable response shape for training output
//! - [`registry`] - Listing, resolving and scoring persisted models
//!
//! ## AutoML backend
//! - [`automl`] - Preprocessing, candidate estimators, cross-validated
//!   comparison, random-search tuning and persistence
//!
//! ## Services
//! - [`agent`] - LLM tool-calling agent
//! - [`service`] - Request routing (explicit, prompt, agent)
//! - [`server`] - HTTP server
//! - [`cli`] - Command-line interface

pub mod error;
pub mod config;

pub mod dataset;
pub mod task;
pub mod intent;
pub mod automl;
pub mod orchestrator;
pub mod normalize;
pub mod registry;

pub mod agent;
pub mod service;
pub mod server;
pub mod cli;

pub use error::{AutomlError, ErrorKind, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{AutomlError, ErrorKind, Result};
    pub use crate::config::{AgentSettings, AppConfig, AutoMlSettings};

    pub use crate::dataset::{validate_dataset, Dataset, DatasetLoader};
    pub use crate::task::{infer_by_distinct_count, infer_by_distinct_ratio, TaskKind};
    pub use crate::intent::{Intent, IntentParser, KeywordIntentParser};

    pub use crate::automl::{Algorithm, AutoMl, Metric, NativeAutoMl};
    pub use crate::orchestrator::{TrainingOrchestrator, TrainingRequest, TrainingSummary};
    pub use crate::normalize::{normalize, RawTrainingOutput, TrainingResponse};
    pub use crate::registry::{ModelEntry, ModelRegistry, PredictionOutcome};

    pub use crate::agent::{Agent, OpenAiAgent, TrainingTool};
    pub use crate::service::{AutoMlService, TrainCommand};
}
