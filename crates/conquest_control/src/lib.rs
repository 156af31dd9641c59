//! Bot decision engine.
//!
//! Bots read the match only through [`MatchView`] and answer with ordinary
//! commands, the same vocabulary a human client sends.

use std::collections::BTreeMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use conquest_core::{
    Command, CommandEnvelope, CommandId, CommandSource, Constants, ContestantId, MatchPhase,
    MatchView,
};

mod brain;

pub use brain::{choose_state, survey, BotBrain, BotState, Plan, Survey};

/// Drives every bot contestant in a match, one [`BotBrain`] each.
///
/// Bots activate on a jittered interval rather than every tick, so a room
/// full of bots doesn't act in lockstep.
#[derive(Debug)]
pub struct BotDirector {
    rng: ChaCha8Rng,
    brains: BTreeMap<ContestantId, BotBrain>,
}

impl BotDirector {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            brains: BTreeMap::new(),
        }
    }

    pub fn brain(&self, id: &ContestantId) -> Option<&BotBrain> {
        self.brains.get(id)
    }

    pub fn brain_count(&self) -> usize {
        self.brains.len()
    }

    fn jitter(&mut self, constants: &Constants) -> f64 {
        let jitter = constants.bot_interval_jitter_secs.max(0.0);
        if jitter > 0.0 {
            self.rng.gen_range(-jitter..=jitter)
        } else {
            0.0
        }
    }

    fn next_interval(&mut self, constants: &Constants) -> f64 {
        (constants.bot_interval_secs + self.jitter(constants)).max(0.1)
    }
}

/// Allocates a command ID and builds a `CommandEnvelope`.
fn make_cmd(
    owner: &ContestantId,
    tick: u64,
    next_id: &mut u64,
    command: Command,
) -> CommandEnvelope {
    let cmd_id = CommandId(format!("bot_cmd_{:06}", *next_id));
    *next_id += 1;
    CommandEnvelope {
        id: cmd_id,
        issued_by: owner.clone(),
        issued_tick: tick,
        command,
    }
}

impl CommandSource for BotDirector {
    fn generate_commands(
        &mut self,
        view: &dyn MatchView,
        next_command_id: &mut u64,
    ) -> Vec<CommandEnvelope> {
        if view.phase() != MatchPhase::Playing {
            return Vec::new();
        }
        let constants = &view.content().constants;
        let now = view.phase_elapsed_secs();
        let tick = view.tick();
        let mut commands = Vec::new();

        for contestant in view.contestants().iter().filter(|c| c.is_bot) {
            if !contestant.alive {
                self.brains.remove(&contestant.id);
                continue;
            }
            if !self.brains.contains_key(&contestant.id) {
                // First activation lands anywhere inside one jitter window.
                let offset = self.jitter(constants).abs();
                self.brains
                    .insert(contestant.id.clone(), BotBrain::new(now + offset));
            }
            let Some(brain) = self.brains.get(&contestant.id) else {
                continue;
            };
            if now < brain.next_activation_secs {
                continue;
            }
            let interval = self.next_interval(constants);
            let Some(brain) = self.brains.get_mut(&contestant.id) else {
                continue;
            };
            brain.next_activation_secs = now + interval;

            let Some(survey) = survey(view, contestant) else {
                continue;
            };
            let state = choose_state(&survey, constants, brain.attack_ready(now, constants));
            if state != brain.state {
                debug!(
                    bot = %contestant.id.0,
                    from = ?brain.state,
                    to = ?state,
                    army = survey.army,
                    gold = survey.gold,
                    "bot state change"
                );
                brain.state = state;
            }

            let mut plan = Plan::new(view, &survey);
            match state {
                BotState::Defending => plan.defend(),
                BotState::Attacking => {
                    if plan.attack() {
                        brain.last_attack_secs = Some(now);
                    }
                }
                BotState::Training => plan.train(true),
                BotState::Expanding => plan.expand(&mut brain.claimed_targets),
                BotState::Building => plan.build(),
            }
            plan.opportunistic();

            commands.extend(
                plan.commands
                    .into_iter()
                    .map(|command| make_cmd(&contestant.id, tick, next_command_id, command)),
            );
        }
        commands
    }

    fn reset(&mut self) {
        self.brains.clear();
    }
}
