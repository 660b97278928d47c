//! Activities module - domain models and the activity store contract.

mod activities_constants;
mod activities_model;
mod activities_traits;

#[cfg(test)]
mod activities_model_tests;

pub use activities_constants::*;
pub use activities_model::{sort_activities, Activity, ActivityType, SymbolProfile};
pub use activities_traits::ActivityRepositoryTrait;
