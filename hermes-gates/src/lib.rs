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

//! # Hermes Gates
//!
//! The Quality-Gate Evaluator (C3): a pure pipeline that turns a prompt's
//! latest benchmark result and a set of gate configurations into a single
//! deployability verdict, plus `checkDeploymentReadiness`.

pub mod evaluator;
pub mod readiness;
pub mod types;

pub use evaluator::evaluate_gates;
pub use readiness::{check_deployment_readiness, Readiness};
pub use types::{
    default_gates, CustomGatePredicate, EvaluationState, GateConfig, GateEvaluation, GateKind,
    GateReport,
};
