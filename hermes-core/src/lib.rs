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

//! # Hermes Core
//!
//! Shared error taxonomy, timestamp helpers, and the trait interfaces to the
//! three external collaborators the prompt lifecycle engine orchestrates:
//! the benchmark evaluator, the self-critique service, and the notification
//! bus. Every other `hermes-*` crate depends on this one.

pub mod error;
pub mod external;
pub mod time;

pub use error::{HermesError, Result};
pub use external::{
    AnalysisDepth, CritiqueProvider, CritiqueRequest, CritiqueReport, Evaluator,
    EvaluatorRequest, EvaluatorResponse, NotificationKind, NotificationPayload, Notifier,
    RecordingNotifier, Severity, SimulationCritiqueProvider, SimulationEvaluator, Suggestion,
};
pub use time::{age_hours, now_millis};
