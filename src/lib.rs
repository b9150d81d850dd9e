//! # MOOClet engine
//!
//! Adaptive content selection for quizzes. At each decision point (a
//! *mooclet*) the engine picks which content *version* a student sees,
//! using the selection policy bound to that mooclet, and records the
//! measurements needed to evaluate and adapt that choice.
//!
//! ## Core Concepts
//!
//! - **Variable / Value**: named scalar measurements attached to any
//!   catalog entity, optionally per user
//! - **Mooclet / Version / Policy**: a decision point, its alternatives and
//!   the strategy that chooses between them
//! - **Context**: the records a request is about, keyed by entity tag
//! - **Simulation**: a Monte-Carlo estimate of how often a policy picks
//!   each version
//!
//! ## Usage
//!
//! ```
//! use std::sync::Arc;
//!
//! use mooclet::{
//!     Catalog, Context, DecisionEngine, InMemoryMeasurementStore, Measurements, Mooclet,
//!     MoocletType, Policy, PolicyRegistry, Version,
//! };
//!
//! # fn main() -> Result<(), mooclet::MoocletError> {
//! let catalog = Arc::new(Catalog::new()?);
//! catalog.add_policy(Policy::new(1, "uniform_random"))?;
//! catalog.add_mooclet_type(MoocletType::new("standalone", None))?;
//! let mooclet = Mooclet::new(1, "hint", "standalone", 1);
//! catalog.add_mooclet(mooclet.clone())?;
//! catalog.add_version(Version::new(1, 1, "short hint"))?;
//! catalog.add_version(Version::new(2, 1, "long hint"))?;
//!
//! let measurements = Measurements::new(
//!     Arc::new(InMemoryMeasurementStore::new()),
//!     Arc::clone(catalog.resolver()),
//!     Default::default(),
//! );
//! let engine = DecisionEngine::new(catalog, measurements, Arc::new(PolicyRegistry::with_builtins()?));
//!
//! let version = engine.get_version(&mooclet, &Context::new().with(mooclet.clone()))?;
//! assert!(version.id == 1 || version.id == 2);
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod config;
pub mod context;
pub mod entity;
pub mod error;

// Catalog and measurements
pub mod catalog;
pub mod measure;
pub mod storage;

// Decisions
pub mod decision;
pub mod policy;
pub mod simulation;

// Flows and collaborators
pub mod gateway;
pub mod operations;

pub use catalog::{AssociationResolver, Catalog, CatalogRecord, EntityRepository, InMemoryRepository};
pub use config::{EngineConfig, MeasurementConfig, PersistentConfig, SimulationConfig};
pub use context::Context;
pub use decision::{DecisionEngine, Mooclet, MoocletType, Policy, Version};
pub use entity::{
    Answer, Course, EntityRecord, EntityTag, Explanation, OwnerRef, Question, Quiz, RecordId, User,
};
pub use error::{ExecutionError, MoocletError, MoocletResult, ValidationError};
pub use gateway::{GatewayError, LmsGateway, NoopLmsGateway, SurveyProvisioner};
pub use measure::{
    Measurements, RecordMode, Summary, Value, ValueId, Variable, VariableId, VariableSpec,
};
pub use operations::{
    ExplanationChoice, IntermediatesReport, Outcome, QuizService, ResultsMatrix, SubmissionCounts,
};
pub use policy::{
    PolicyRegistry, SelectionInput, SelectionStrategy, ThompsonSampling, UniformRandom,
    WeightedRandom,
};
pub use simulation::{SimulationReport, SimulationRunId, SimulationRunner};
pub use storage::{InMemoryMeasurementStore, MeasurementStore, StorageError};

#[cfg(feature = "persistent")]
pub use storage::persistent::PersistentMeasurementStore;
