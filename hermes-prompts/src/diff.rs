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

//! Unified diff generation between two versions' content.
//!
//! Per `spec.md` §4.1 the diff is advisory: it exists for humans and for
//! audit trails, while the version's stored content remains the authoritative
//! artifact.

use similar::TextDiff;

/// A standard unified diff (3-line context), line-based.
pub fn unified_diff(before: &str, after: &str) -> String {
    TextDiff::from_lines(before, after)
        .unified_diff()
        .context_radius(3)
        .header("before", "after")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_contains_removed_and_added_lines() {
        let diff = unified_diff("A", "B");
        assert!(diff.contains("-A"));
        assert!(diff.contains("+B"));
    }

    #[test]
    fn diff_of_identical_content_has_no_hunks() {
        let diff = unified_diff("same", "same");
        assert!(!diff.contains("@@"));
    }
}
