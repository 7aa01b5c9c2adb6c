//! Interpreter - Execute Effects using a Provider
//!
//! The Interpreter executes Effects contained in a Plan in order,
//! collecting the results. This is where side effects actually occur.

use tracing::{info, warn};

use crate::effect::Effect;
use crate::plan::Plan;
use crate::provider::{Provider, ProviderError, ProviderResult};
use crate::resource::{ResourceId, State};

/// Result of executing each Effect
#[derive(Debug)]
pub enum EffectOutcome {
    /// Create succeeded
    Created { state: State },
    /// Update succeeded
    Updated { state: State },
    /// Delete followed by create succeeded
    Replaced { state: State },
    /// Delete succeeded
    Deleted { id: ResourceId },
    /// Skipped (e.g., dry-run)
    Skipped { reason: String },
}

/// Result of executing the entire Plan
#[derive(Debug)]
pub struct ApplyResult {
    pub outcomes: Vec<Result<EffectOutcome, ProviderError>>,
    pub success_count: usize,
    pub failure_count: usize,
}

impl ApplyResult {
    pub fn is_success(&self) -> bool {
        self.failure_count == 0
    }
}

/// Interpreter configuration
#[derive(Debug, Clone, Default)]
pub struct InterpreterConfig {
    /// If true, skip actual side effects
    pub dry_run: bool,
    /// Continue on error
    pub continue_on_error: bool,
}

/// Interpreter that executes Effects using a Provider
pub struct Interpreter<P: Provider> {
    provider: P,
    config: InterpreterConfig,
}

impl<P: Provider> Interpreter<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            config: InterpreterConfig::default(),
        }
    }

    pub fn with_config(mut self, config: InterpreterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Execute a Plan, interpreting all Effects and causing side effects
    pub async fn apply(&self, plan: &Plan) -> ApplyResult {
        let mut outcomes = Vec::new();
        let mut success_count = 0;
        let mut failure_count = 0;

        for effect in plan.effects() {
            let result = self.execute_effect(effect).await;

            match &result {
                Ok(_) => success_count += 1,
                Err(e) => {
                    warn!("{} failed: {}", effect, e);
                    failure_count += 1;
                    if !self.config.continue_on_error {
                        outcomes.push(result);
                        break;
                    }
                }
            }

            outcomes.push(result);
        }

        ApplyResult {
            outcomes,
            success_count,
            failure_count,
        }
    }

    /// Execute a single Effect
    async fn execute_effect(&self, effect: &Effect) -> ProviderResult<EffectOutcome> {
        if self.config.dry_run {
            return Ok(EffectOutcome::Skipped {
                reason: "dry-run mode".to_string(),
            });
        }

        info!("applying {}", effect);

        match effect {
            Effect::Create(resource) => {
                let state = self.provider.create(resource).await?;
                Ok(EffectOutcome::Created { state })
            }
            Effect::Update { id, from, to, .. } => {
                let identifier = identifier_of(id, from)?;
                let state = self.provider.update(id, identifier, from, to).await?;
                Ok(EffectOutcome::Updated { state })
            }
            Effect::Replace { id, from, to, .. } => {
                let identifier = identifier_of(id, from)?;
                self.provider.delete(id, identifier).await?;
                let state = self.provider.create(to).await?;
                Ok(EffectOutcome::Replaced { state })
            }
            Effect::Delete { id, identifier } => {
                self.provider.delete(id, identifier).await?;
                Ok(EffectOutcome::Deleted { id: id.clone() })
            }
        }
    }
}

fn identifier_of<'a>(id: &ResourceId, state: &'a State) -> ProviderResult<&'a str> {
    state.identifier.as_deref().ok_or_else(|| {
        ProviderError::validation("no identifier recorded in state").for_resource(id.clone())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::tests::MockProvider;
    use crate::resource::Resource;
    use std::collections::HashMap;

    fn replace_effect() -> Effect {
        let id = ResourceId::new("test", "example");
        Effect::Replace {
            id: id.clone(),
            from: State::existing(id, HashMap::new()).with_identifier("old-id"),
            to: Resource::new("test", "example"),
            changed_attributes: vec!["location".to_string()],
        }
    }

    #[tokio::test]
    async fn apply_empty_plan() {
        let interpreter = Interpreter::new(MockProvider::default());
        let plan = Plan::new();
        let result = interpreter.apply(&plan).await;

        assert!(result.is_success());
        assert_eq!(result.success_count, 0);
    }

    #[tokio::test]
    async fn apply_create_effect() {
        let interpreter = Interpreter::new(MockProvider::default());
        let mut plan = Plan::new();
        plan.add(Effect::Create(Resource::new("test", "example")));

        let result = interpreter.apply(&plan).await;

        assert!(result.is_success());
        assert_eq!(result.success_count, 1);
    }

    #[tokio::test]
    async fn replace_deletes_then_creates() {
        let interpreter = Interpreter::new(MockProvider::default());
        let mut plan = Plan::new();
        plan.add(replace_effect());

        let result = interpreter.apply(&plan).await;

        assert!(result.is_success());
        assert_eq!(
            interpreter.provider().calls(),
            vec!["delete test.example", "create test.example"]
        );
    }

    #[tokio::test]
    async fn stops_at_first_failure() {
        let provider = MockProvider {
            fail_on: Some("create test.a".to_string()),
            ..Default::default()
        };
        let interpreter = Interpreter::new(provider);
        let mut plan = Plan::new();
        plan.add(Effect::Create(Resource::new("test", "a")));
        plan.add(Effect::Create(Resource::new("test", "b")));

        let result = interpreter.apply(&plan).await;

        assert_eq!(result.failure_count, 1);
        assert_eq!(result.outcomes.len(), 1);
        assert_eq!(interpreter.provider().calls(), vec!["create test.a"]);
    }

    #[tokio::test]
    async fn continue_on_error_runs_remaining_effects() {
        let provider = MockProvider {
            fail_on: Some("create test.a".to_string()),
            ..Default::default()
        };
        let config = InterpreterConfig {
            continue_on_error: true,
            ..Default::default()
        };
        let interpreter = Interpreter::new(provider).with_config(config);
        let mut plan = Plan::new();
        plan.add(Effect::Create(Resource::new("test", "a")));
        plan.add(Effect::Create(Resource::new("test", "b")));

        let result = interpreter.apply(&plan).await;

        assert_eq!(result.failure_count, 1);
        assert_eq!(result.success_count, 1);
        assert_eq!(result.outcomes.len(), 2);
    }

    #[tokio::test]
    async fn borrowed_provider_stays_usable() {
        let provider = MockProvider::default();
        let mut plan = Plan::new();
        plan.add(Effect::Delete {
            id: ResourceId::new("test", "a"),
            identifier: "id-a".to_string(),
        });

        let result = Interpreter::new(&provider).apply(&plan).await;

        assert!(result.is_success());
        assert_eq!(provider.calls(), vec!["delete test.a"]);
    }

    #[tokio::test]
    async fn dry_run_skips_effects() {
        let config = InterpreterConfig {
            dry_run: true,
            ..Default::default()
        };
        let interpreter = Interpreter::new(MockProvider::default()).with_config(config);
        let mut plan = Plan::new();
        plan.add(Effect::Create(Resource::new("test", "example")));

        let result = interpreter.apply(&plan).await;

        assert!(result.is_success());
        assert!(matches!(
            result.outcomes[0],
            Ok(EffectOutcome::Skipped { .. })
        ));
        assert!(interpreter.provider().calls().is_empty());
    }
}
