//! Typed stage registry.
//!
//! Handlers are registered against a [`StageDef`] marker, so the input and
//! output types of every stage are checked at compile time. Internally the
//! registry erases them to JSON so jobs can sit in a queue (or, later, a
//! broker) as plain payloads.

use std::{collections::HashMap, future::Future, sync::Arc};

use futures::{FutureExt as _, future::BoxFuture};
use newsdesk_core::ErrorKind;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use strum::{EnumIter, IntoEnumIterator as _, IntoStaticStr};

use super::{DispatchError, JobFailure};

/// Every stage the dispatcher knows how to run.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  serde::Serialize,
  serde::Deserialize,
  EnumIter,
  IntoStaticStr,
  strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
  Ingest,
  Normalize,
  Dedupe,
  IndexFacts,
  Analyze,
  Verify,
  Build,
  Publish,
}

/// Compile-time description of one stage: its identifier and payload types.
pub trait StageDef: Send + Sync + 'static {
  const STAGE: Stage;
  type Input: Serialize + DeserializeOwned + Send + 'static;
  type Output: Serialize + DeserializeOwned + Send + 'static;
}

pub(crate) type ErasedHandler =
  Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, JobFailure>> + Send + Sync>;

/// Maps each [`Stage`] to its handler.
#[derive(Default, Clone)]
pub struct Registry {
  handlers: HashMap<Stage, ErasedHandler>,
}

impl Registry {
  pub fn new() -> Self { Self::default() }

  /// Register `handler` for `D::STAGE`, replacing any previous handler.
  pub fn register<D, F, Fut>(&mut self, handler: F) -> &mut Self
  where
    D: StageDef,
    F: Fn(D::Input) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = newsdesk_core::Result<D::Output>> + Send + 'static,
  {
    let handler = Arc::new(handler);
    let erased: ErasedHandler = Arc::new(move |payload: Value| {
      let handler = handler.clone();
      async move {
        let input = serde_json::from_value::<D::Input>(payload).map_err(|e| {
          JobFailure::new(ErrorKind::Invalid, format!("bad {} payload: {e}", D::STAGE))
        })?;
        let output = (*handler)(input).await.map_err(JobFailure::from)?;
        serde_json::to_value(output).map_err(|e| {
          JobFailure::new(ErrorKind::Invalid, format!("bad {} output: {e}", D::STAGE))
        })
      }
      .boxed()
    });
    self.handlers.insert(D::STAGE, erased);
    self
  }

  pub fn contains(&self, stage: Stage) -> bool { self.handlers.contains_key(&stage) }

  /// Fail if any stage lacks a handler.
  pub fn validate(&self) -> Result<(), DispatchError> {
    match Stage::iter().find(|s| !self.contains(*s)) {
      Some(stage) => Err(DispatchError::MissingHandler(stage)),
      None => Ok(()),
    }
  }

  pub(crate) fn get(&self, stage: Stage) -> Option<&ErasedHandler> { self.handlers.get(&stage) }
}

impl std::fmt::Debug for Registry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let mut stages: Vec<&Stage> = self.handlers.keys().collect();
    stages.sort();
    f.debug_struct("Registry").field("stages", &stages).finish()
  }
}
