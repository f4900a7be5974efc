//! Attribution of validation issues to form fields.
//!
//! Validators report issue paths as structured segment lists while fields are addressed by
//! path strings.  [`is_issue_path_equal`] is the single place where the two meet, so an array
//! index `1`, the key `"1"`, and the bracket path `[1]` all address the same field.

use crate::issue::IssueSegment;
use crate::path::PathSegment;

/// Unwraps a structured issue segment to the key it carries.
pub fn normalize_segment(segment: &IssueSegment) -> &PathSegment {
    segment.key()
}

/// Checks whether an issue's path addresses exactly `target`.
///
/// An issue without a path never matches.  Paths of different lengths never match.  Segment
/// pairs compare numerically when either side is an index, and as keys otherwise.
pub fn is_issue_path_equal(issue_path: Option<&[IssueSegment]>, target: &[PathSegment]) -> bool {
    let Some(issue_path) = issue_path else {
        return false;
    };
    issue_path.len() == target.len()
        && issue_path
            .iter()
            .zip(target)
            .all(|(segment, target)| segments_equal(normalize_segment(segment), target))
}

fn segments_equal(lhs: &PathSegment, rhs: &PathSegment) -> bool {
    if lhs.is_index() || rhs.is_index() {
        match (numeric(lhs), numeric(rhs)) {
            (Some(lhs), Some(rhs)) => lhs == rhs,
            _ => false,
        }
    } else {
        lhs == rhs
    }
}

fn numeric(segment: &PathSegment) -> Option<f64> {
    match segment {
        PathSegment::Index(index) => Some(*index as f64),
        PathSegment::Key(key) => key.trim().parse().ok(),
    }
}
