//! Rewrites challenge instructions to carry canary probes.
//!
//! The answer hash is always computed from the original payload before
//! injection, so adding canaries never changes the correctness criterion.

use serde_json::{json, Value};

use super::catalog::{CanaryCatalog, SelectOptions};
use super::{Canary, InjectionMethod};
use crate::types::ChallengePayload;

pub struct InjectionResult {
    pub payload: ChallengePayload,
    pub injected: Vec<Canary>,
}

pub struct CanaryInjector {
    catalog: CanaryCatalog,
}

impl CanaryInjector {
    pub fn new(catalog: CanaryCatalog) -> Self {
        CanaryInjector { catalog }
    }

    /// Select `count` canaries and weave their prompts into the payload's
    /// instructions. `data` and `steps` are left untouched.
    pub fn inject(&self, payload: &ChallengePayload, count: usize) -> InjectionResult {
        self.inject_excluding(payload, count, &[])
    }

    pub fn inject_excluding(
        &self,
        payload: &ChallengePayload,
        count: usize,
        exclude: &[String],
    ) -> InjectionResult {
        if count == 0 {
            return InjectionResult {
                payload: payload.clone(),
                injected: Vec::new(),
            };
        }

        let selected = self.catalog.select(
            count,
            &SelectOptions {
                method: None,
                exclude: exclude.to_vec(),
            },
        );
        if selected.is_empty() {
            return InjectionResult {
                payload: payload.clone(),
                injected: Vec::new(),
            };
        }

        let prefix: Vec<&Canary> = selected
            .iter()
            .filter(|c| c.injection_method == InjectionMethod::Prefix)
            .collect();
        let side_tasks: Vec<&Canary> = selected
            .iter()
            .filter(|c| c.injection_method != InjectionMethod::Prefix)
            .collect();

        let mut instructions = payload.instructions.clone();

        if !prefix.is_empty() {
            let block = prefix
                .iter()
                .map(|c| format!("- {}: {}", c.id, c.prompt))
                .collect::<Vec<_>>()
                .join("\n");
            instructions = format!(
                "Before starting, answer these briefly (include in canary_responses):\n{block}\n\n{instructions}"
            );
        }

        if !side_tasks.is_empty() {
            let block = side_tasks
                .iter()
                .map(|c| format!("- {}: {}", c.id, c.prompt))
                .collect::<Vec<_>>()
                .join("\n");
            instructions = format!(
                "{instructions}\n\nAlso, complete these side tasks (include answers in canary_responses field):\n{block}"
            );
        }

        let mut context = match &payload.context {
            Some(Value::Object(map)) => map.clone(),
            _ => serde_json::Map::new(),
        };
        context.insert(
            "canary_ids".into(),
            json!(selected.iter().map(|c| c.id.clone()).collect::<Vec<_>>()),
        );

        InjectionResult {
            payload: ChallengePayload {
                challenge_type: payload.challenge_type.clone(),
                instructions,
                data: payload.data.clone(),
                steps: payload.steps,
                context: Some(Value::Object(context)),
            },
            injected: selected,
        }
    }
}
