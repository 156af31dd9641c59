use crate::{Constants, Contestant, MatchState};

pub(crate) fn contestant_score(contestant: &Contestant, constants: &Constants) -> f64 {
    f64::from(contestant.territory) * constants.score_per_tile
        + f64::from(contestant.stats.kills) * constants.score_per_kill
        + f64::from(contestant.stats.captures) * constants.score_per_capture
        + contestant.stats.gold_earned * constants.score_per_gold
}

pub(crate) fn update_scores(state: &mut MatchState, constants: &Constants) {
    for contestant in state.contestants.iter_mut().filter(|c| c.alive) {
        contestant.score = contestant_score(contestant, constants);
    }
}
