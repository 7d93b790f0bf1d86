use crate::models::Poll;
use crate::voting::{leading_option, percentage, OptionTally, PollResults};

pub fn calculate_results(poll: &Poll) -> PollResults {
    let total_votes = poll.total_votes();
    let leader_id = leading_option(&poll.options).map(|o| o.id.clone());

    let options = poll
        .options
        .iter()
        .map(|option| OptionTally {
            option_id: option.id.clone(),
            label: option.label.clone(),
            votes: option.vote_count,
            percentage: percentage(option.vote_count, total_votes),
            is_leading: leader_id.as_deref() == Some(option.id.as_str()),
        })
        .collect();

    PollResults {
        poll_id: poll.id.clone(),
        question: poll.question.clone(),
        total_votes,
        options,
    }
}

/// Most-voted polls first; ties ordered by question text.
pub fn rank_results(mut results: Vec<PollResults>) -> Vec<PollResults> {
    results.sort_by(|a, b| {
        b.total_votes
            .cmp(&a.total_votes)
            .then_with(|| a.question.cmp(&b.question))
    });
    results
}
