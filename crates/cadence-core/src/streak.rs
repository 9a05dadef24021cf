//! Streak computation over completion history.

use std::collections::BTreeSet;

use chrono::NaiveDate;

/// Count of consecutive completed days ending at `today`.
///
/// The walk is today-anchored: a history with no completion for
/// `today` scores 0 no matter how long the prior run was, and days
/// older than the first gap never contribute. Input order and
/// duplicates do not matter, so callers may hand this denormalized
/// history (e.g. a bulk import) safely.
pub fn current_streak<I>(history: I, today: NaiveDate) -> u32
where
    I: IntoIterator<Item = NaiveDate>,
{
    let days: BTreeSet<NaiveDate> = history.into_iter().collect();

    let mut streak = 0;
    let mut cursor = today;
    for day in days.iter().rev() {
        if *day > cursor {
            // Malformed input ahead of the anchor; skip it.
            continue;
        }
        if *day < cursor {
            break;
        }
        streak += 1;
        match cursor.pred_opt() {
            Some(prev) => cursor = prev,
            None => break,
        }
    }
    streak
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    const TODAY: &str = "2024-03-10";

    #[test]
    fn empty_history_is_zero() {
        assert_eq!(current_streak([], d(TODAY)), 0);
    }

    #[test]
    fn today_only_is_one() {
        assert_eq!(current_streak([d(TODAY)], d(TODAY)), 1);
    }

    #[test]
    fn consecutive_run_counts_every_day() {
        let history = [d("2024-03-10"), d("2024-03-09"), d("2024-03-08")];
        assert_eq!(current_streak(history, d(TODAY)), 3);
    }

    #[test]
    fn missing_today_breaks_currency() {
        let history = [d("2024-03-09"), d("2024-03-08")];
        assert_eq!(current_streak(history, d(TODAY)), 0);
    }

    #[test]
    fn gap_stops_the_run_after_today() {
        let history = [d("2024-03-10"), d("2024-03-08")];
        assert_eq!(current_streak(history, d(TODAY)), 1);
    }

    #[test]
    fn run_older_than_the_gap_never_contributes() {
        let history = [
            d("2024-03-10"),
            d("2024-03-09"),
            d("2024-03-06"),
            d("2024-03-05"),
            d("2024-03-04"),
        ];
        assert_eq!(current_streak(history, d(TODAY)), 2);
    }

    #[test]
    fn invariant_under_reordering_and_duplicates() {
        let sorted = [d("2024-03-10"), d("2024-03-09"), d("2024-03-08")];
        let shuffled = [
            d("2024-03-08"),
            d("2024-03-10"),
            d("2024-03-09"),
            d("2024-03-10"),
            d("2024-03-08"),
        ];
        assert_eq!(
            current_streak(sorted, d(TODAY)),
            current_streak(shuffled, d(TODAY))
        );
    }

    #[test]
    fn future_days_are_skipped_not_counted() {
        // Malformed input: a completion "tomorrow" must not inflate or
        // reset the walk.
        let history = [d("2024-03-11"), d("2024-03-10"), d("2024-03-09")];
        assert_eq!(current_streak(history, d(TODAY)), 2);
    }

    #[test]
    fn pure_and_repeatable() {
        let history = [d("2024-03-10"), d("2024-03-09")];
        let first = current_streak(history, d(TODAY));
        let second = current_streak(history, d(TODAY));
        assert_eq!(first, second);
        assert_eq!(first, 2);
    }
}
