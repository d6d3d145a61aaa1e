//! Pure transition logic for the iteration tracker.
//!
//! The tracker has no storage of its own: the tracking issue's comment
//! thread is the event log, and the iteration number is reconstructed by
//! scanning it for the marker that tags tracker-authored progress comments.
//! Everything in this module is a pure function of that thread, so the
//! count survives process restarts and re-runs.

/// Fingerprint embedded in every tracker-authored progress comment.
///
/// An HTML comment renders invisibly on GitHub, so neither a human nor the
/// reviewing bot will ever write it unprompted. Counting occurrences of this
/// string is the sole source of truth for the iteration number.
pub const ITERATION_MARKER: &str = "<!-- buildperf-iteration -->";

/// Maximum optimization rounds before the tracker closes the loop.
pub const MAX_ITERATIONS: u64 = 5;

/// Label carried by the tracking issue. At most one open issue per
/// repository may carry it; the resolver query enforces this before any
/// create.
pub const TRACKING_LABEL: &str = "build-performance";

/// Tracker-internal view of an open tracking issue.
#[derive(Debug, Clone)]
pub struct TrackingIssue {
    pub number: u64,
    /// Bodies of every comment on the issue, oldest first. Must be the
    /// complete thread: an undercounted thread would restart the loop.
    pub comments: Vec<String>,
}

/// Next side effect to perform against the issue tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// No open issue: open a fresh tracking issue.
    Create,
    /// Within budget: append progress comment number `iteration`.
    Comment { number: u64, iteration: u64 },
    /// Budget exhausted: post the terminal comment, then close the issue.
    Close { number: u64, iteration: u64 },
}

/// Whether a comment body is a tracker-authored progress comment.
///
/// This predicate is the only place the matching rule lives; the transition
/// logic never inspects comment text itself.
pub fn is_iteration_comment(body: &str) -> bool {
    body.contains(ITERATION_MARKER)
}

/// Iteration number the current run is about to record: one more than the
/// number of marker comments already on the thread. Always >= 1.
pub fn iteration_count(comments: &[String]) -> u64 {
    1 + comments.iter().filter(|c| is_iteration_comment(c)).count() as u64
}

/// Map the resolved tracker state to the next action.
///
/// The close transition fires strictly on exceeding the budget: a count equal
/// to the budget is still a progress comment (the final `n == max` round),
/// and only the following invocation closes the issue. An open issue with no
/// comments at all still gets a comment, never a second create.
pub fn decide(issue: Option<&TrackingIssue>, budget: u64) -> Action {
    match issue {
        None => Action::Create,
        Some(issue) => {
            let iteration = iteration_count(&issue.comments);
            if iteration > budget {
                Action::Close {
                    number: issue.number,
                    iteration,
                }
            } else {
                Action::Comment {
                    number: issue.number,
                    iteration,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker_comment(n: u64) -> String {
        format!("{ITERATION_MARKER}\n### Iteration {n}/{MAX_ITERATIONS}\nnew trace")
    }

    fn issue(comments: Vec<String>) -> TrackingIssue {
        TrackingIssue {
            number: 42,
            comments,
        }
    }

    #[test]
    fn counting_is_idempotent() {
        let comments = vec![
            marker_comment(1),
            "human reply".to_string(),
            marker_comment(2),
            "bot analysis without the fingerprint".to_string(),
        ];

        let first = iteration_count(&comments);
        let second = iteration_count(&comments);
        assert_eq!(first, 3);
        assert_eq!(first, second);
    }

    #[test]
    fn count_grows_by_one_per_recorded_iteration() {
        let mut comments = Vec::new();
        for expected in 1..=4 {
            assert_eq!(iteration_count(&comments), expected);
            comments.push(marker_comment(expected));
        }
    }

    #[test]
    fn no_open_issue_always_creates() {
        assert_eq!(decide(None, MAX_ITERATIONS), Action::Create);
        assert_eq!(decide(None, 0), Action::Create);
    }

    #[test]
    fn open_issue_with_no_comments_gets_first_comment() {
        let issue = issue(Vec::new());
        assert_eq!(
            decide(Some(&issue), MAX_ITERATIONS),
            Action::Comment {
                number: 42,
                iteration: 1
            }
        );
    }

    #[test]
    fn count_equal_to_budget_still_comments() {
        let issue = issue((1..=4).map(marker_comment).collect());
        assert_eq!(
            decide(Some(&issue), 5),
            Action::Comment {
                number: 42,
                iteration: 5
            }
        );
    }

    #[test]
    fn count_over_budget_closes() {
        let issue = issue((1..=5).map(marker_comment).collect());
        assert_eq!(
            decide(Some(&issue), 5),
            Action::Close {
                number: 42,
                iteration: 6
            }
        );
    }

    #[test]
    fn unmarked_comments_never_count() {
        let comments = vec![
            "Iteration 1/5 written by a helpful human".to_string(),
            "maximum iterations reached".to_string(),
        ];
        assert_eq!(iteration_count(&comments), 1);
    }
}
