// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! `checkDeploymentReadiness` (`SPEC_FULL.md` §4.2 supplemental operation).
//!
//! This lives in `hermes-gates` rather than `hermes-benchmarks` because it
//! needs both a `GateReport` and a `BenchmarkResult`, and `hermes-gates`
//! already depends on `hermes-benchmarks` — putting it the other way round
//! would make the two crates depend on each other.

use hermes_benchmarks::BenchmarkOrchestrator;
use hermes_core::Result;
use hermes_prompts::{Prompt, PromptStorage};

use crate::evaluator::evaluate_gates;
use crate::types::GateConfig;

/// Whether a prompt is clear to deploy right now, and why not if it isn't.
#[derive(Debug, Clone)]
pub struct Readiness {
    pub ready: bool,
    pub blockers: Vec<String>,
}

pub async fn check_deployment_readiness<S>(
    orchestrator: &BenchmarkOrchestrator<S>,
    prompt: &Prompt,
    gates: &[GateConfig],
) -> Result<Readiness>
where
    S: PromptStorage + ?Sized + 'static,
{
    let latest = orchestrator.history(prompt.id, 1).await?.into_iter().next();
    let report = evaluate_gates(prompt.id, prompt.version.clone(), latest.as_ref(), gates);

    let mut blockers = Vec::new();
    if !report.can_deploy {
        blockers.push(format!("quality gates: {}", report.summary));
    }
    if latest.is_none() {
        blockers.push("no benchmark result exists for this prompt".to_string());
    }

    Ok(Readiness { ready: blockers.is_empty(), blockers })
}
