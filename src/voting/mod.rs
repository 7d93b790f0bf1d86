pub mod ballot;
pub mod plurality;
pub mod stats;

use serde::Serialize;

use crate::models::PollOption;

// Display-ready results for one poll
#[derive(Debug, Clone, Serialize)]
pub struct PollResults {
    pub poll_id: String,
    pub question: String,
    pub total_votes: u64,
    pub options: Vec<OptionTally>,
}

// One row of the results bar chart
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionTally {
    pub option_id: String,
    pub label: String,
    pub votes: u64,
    pub percentage: u32,
    pub is_leading: bool,
}

/// Share of `total` held by `count`, rounded half away from zero. Zero when nobody has voted.
pub fn percentage(count: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    ((count as f64 / total as f64) * 100.0).round() as u32
}

/// The option to highlight as leading: the first one, in display order, holding
/// the strictly highest count. `None` while the poll has no votes.
pub fn leading_option(options: &[PollOption]) -> Option<&PollOption> {
    let mut leader: Option<&PollOption> = None;
    for option in options {
        match leader {
            Some(current) if option.vote_count <= current.vote_count => {}
            _ => leader = Some(option),
        }
    }
    leader.filter(|o| o.vote_count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(id: &str, votes: u64) -> PollOption {
        PollOption {
            id: id.to_string(),
            label: id.to_string(),
            vote_count: votes,
            position: 0,
        }
    }

    #[test]
    fn percentages_are_zero_without_votes() {
        assert_eq!(percentage(0, 0), 0);
        assert_eq!(percentage(5, 0), 0);
    }

    #[test]
    fn percentages_round_to_nearest() {
        assert_eq!(percentage(3, 10), 30);
        assert_eq!(percentage(4, 11), 36);
        assert_eq!(percentage(7, 11), 64);
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
    }

    #[test]
    fn percentages_sum_close_to_hundred() {
        let distributions: [&[u64]; 5] = [&[1, 1, 1], &[3, 7], &[1, 2, 3, 4, 5], &[999, 1], &[5, 5, 5, 5, 5, 5, 5]];
        for counts in distributions {
            let total: u64 = counts.iter().sum();
            let sum: u32 = counts.iter().map(|c| percentage(*c, total)).sum();
            let tolerance = counts.len() as i64;
            assert!(
                (sum as i64 - 100).abs() <= tolerance,
                "{:?} summed to {}",
                counts,
                sum
            );
        }
    }

    #[test]
    fn first_of_tied_leaders_wins() {
        let options = vec![option("a", 2), option("b", 5), option("c", 5)];
        assert_eq!(leading_option(&options).map(|o| o.id.as_str()), Some("b"));
    }

    #[test]
    fn no_leader_without_votes() {
        let options = vec![option("a", 0), option("b", 0)];
        assert!(leading_option(&options).is_none());
        assert!(leading_option(&[]).is_none());
    }
}
