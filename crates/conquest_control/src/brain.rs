use conquest_core::{
    Command, Constants, Contestant, MatchView, PlayerSlot, SquadId, StructureKind,
    Terrain, TilePos, UnitKind,
};
use conquest_core::pathfinding::find_path;

/// Behaviour a bot commits to between activations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotState {
    Expanding,
    Building,
    Training,
    Attacking,
    Defending,
}

/// Per-bot memory. Never touches match state; only remembers what it decided.
#[derive(Debug, Clone)]
pub struct BotBrain {
    pub state: BotState,
    /// Phase time at which this bot next activates.
    pub next_activation_secs: f64,
    pub last_attack_secs: Option<f64>,
    /// Resource tiles squads were last sent toward, so idle squads spread out.
    pub claimed_targets: Vec<TilePos>,
}

impl BotBrain {
    pub fn new(first_activation_secs: f64) -> Self {
        Self {
            state: BotState::Expanding,
            next_activation_secs: first_activation_secs,
            last_attack_secs: None,
            claimed_targets: Vec::new(),
        }
    }

    pub fn attack_ready(&self, now: f64, constants: &Constants) -> bool {
        self.last_attack_secs
            .is_none_or(|at| now - at >= constants.bot_attack_cooldown_secs)
    }
}

// ---------------------------------------------------------------------------
// Survey
// ---------------------------------------------------------------------------

/// What a bot can read about its surroundings at one activation.
#[derive(Debug, Clone)]
pub struct Survey {
    pub slot: PlayerSlot,
    pub capital: TilePos,
    pub gold: f64,
    pub army: usize,
    /// Squads without a path, sorted by id.
    pub idle_squads: Vec<(SquadId, TilePos)>,
    pub all_squads: Vec<SquadId>,
    /// Enemy units within the threat radius of the capital.
    pub threat_units: usize,
    pub nearest_threat: Option<TilePos>,
    /// Unowned resource tiles near the capital that a squad can reach, nearest first.
    pub open_resources: Vec<TilePos>,
    /// Own connected resource tiles that still have room for a mine or an upgrade.
    pub mine_sites: Vec<TilePos>,
    /// Own connected buildings that can train, with their queue length.
    pub trainers: Vec<(TilePos, usize)>,
    pub has_barracks: bool,
    pub tower_count: usize,
    /// Own connected, empty, buildable tiles around the capital, nearest first.
    pub build_sites: Vec<TilePos>,
}

pub fn survey(view: &dyn MatchView, me: &Contestant) -> Option<Survey> {
    let capital = me.capital?;
    let constants = &view.content().constants;
    let map = view.map();
    let slot = me.slot;
    let capital_center = capital.center();

    let own = view.squads_owned_by(slot);
    let army = own.iter().map(|s| s.units.len()).sum();
    let mut idle_squads: Vec<(SquadId, TilePos)> = own
        .iter()
        .filter(|s| !s.is_moving())
        .map(|s| (s.id, s.tile()))
        .collect();
    idle_squads.sort_by_key(|(id, _)| *id);
    let mut all_squads: Vec<SquadId> = own.iter().map(|s| s.id).collect();
    all_squads.sort();

    let threat_sq = constants.bot_threat_radius * constants.bot_threat_radius;
    let mut threat_units = 0;
    let mut nearest_threat: Option<(f32, TilePos)> = None;
    for squad in view.squads().iter().filter(|s| s.owner != slot) {
        let d = squad.position.distance_sq(capital_center);
        if d > threat_sq {
            continue;
        }
        threat_units += squad.units.len();
        if nearest_threat.is_none_or(|(best, _)| d < best) {
            nearest_threat = Some((d, squad.tile()));
        }
    }

    let mut open_resources = Vec::new();
    let mut mine_sites = Vec::new();
    let mut trainers = Vec::new();
    let mut has_barracks = false;
    let mut tower_count = 0;
    let mut build_sites = Vec::new();
    let content = view.content();
    let expand_sq = (constants.bot_expand_radius * constants.bot_expand_radius) as f32;

    for (pos, tile) in map.tiles() {
        if tile.owner.is_none()
            && tile.terrain == Terrain::Resource
            && pos.distance_sq(capital) <= expand_sq
            && find_path(map, capital, pos, constants.max_path_expansions).is_some()
        {
            open_resources.push(pos);
        }
        if tile.owner != Some(slot) || !tile.connected {
            continue;
        }
        match tile.structure_kind() {
            Some(kind) => {
                if kind == StructureKind::Barracks {
                    has_barracks = true;
                }
                if kind == StructureKind::Tower {
                    tower_count += 1;
                }
                if kind == StructureKind::Mine
                    && tile.resource_level < constants.max_resource_upgrade
                {
                    mine_sites.push(pos);
                }
                let trains = content.structure(kind).is_some_and(|def| !def.trains.is_empty());
                if trains {
                    let queued = view.training_queue(pos).map_or(0, |q| q.len());
                    trainers.push((pos, queued));
                }
            }
            None if tile.terrain == Terrain::Resource => mine_sites.push(pos),
            None if matches!(tile.terrain, Terrain::Plains | Terrain::Forest) => {
                build_sites.push(pos);
            }
            None => {}
        }
    }

    let by_distance = |a: &TilePos, b: &TilePos| {
        a.distance_sq(capital)
            .total_cmp(&b.distance_sq(capital))
            .then_with(|| a.cmp(b))
    };
    open_resources.sort_by(by_distance);
    mine_sites.sort_by(by_distance);
    build_sites.sort_by(by_distance);

    Some(Survey {
        slot,
        capital,
        gold: me.gold,
        army,
        idle_squads,
        all_squads,
        threat_units,
        nearest_threat: nearest_threat.map(|(_, pos)| pos),
        open_resources,
        mine_sites,
        trainers,
        has_barracks,
        tower_count,
        build_sites,
    })
}

/// Picks the behaviour for this activation, highest priority first.
pub fn choose_state(survey: &Survey, constants: &Constants, attack_ready: bool) -> BotState {
    if survey.threat_units >= constants.bot_threat_units {
        BotState::Defending
    } else if survey.army >= constants.bot_attack_army
        && survey.gold >= constants.bot_attack_gold
        && attack_ready
    {
        BotState::Attacking
    } else if survey.army < constants.bot_min_army {
        BotState::Training
    } else if !survey.open_resources.is_empty() {
        BotState::Expanding
    } else if survey.gold >= constants.bot_build_gold {
        BotState::Building
    } else {
        BotState::Expanding
    }
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// Commands from one activation plus the gold they are expected to spend.
pub struct Plan<'a> {
    pub view: &'a dyn MatchView,
    pub survey: &'a Survey,
    pub budget: f64,
    pub commands: Vec<Command>,
}

impl<'a> Plan<'a> {
    pub fn new(view: &'a dyn MatchView, survey: &'a Survey) -> Self {
        Self {
            view,
            survey,
            budget: survey.gold,
            commands: Vec::new(),
        }
    }

    fn constants(&self) -> &Constants {
        &self.view.content().constants
    }

    fn spendable(&self) -> f64 {
        self.budget - self.constants().bot_gold_reserve
    }

    fn structure_cost(&self, kind: StructureKind) -> Option<f64> {
        self.view.content().structure(kind).map(|def| def.cost)
    }

    fn has_command(&self, pred: impl Fn(&Command) -> bool) -> bool {
        self.commands.iter().any(pred)
    }

    fn move_squad(&mut self, squad_id: SquadId, target: TilePos) {
        self.commands.push(Command::MoveSquad { squad_id, target });
    }

    /// Queues one unit at every trainer with room. `cheapest` favours head count over strength.
    pub fn train(&mut self, cheapest: bool) {
        let view = self.view;
        let queue_max = view.content().constants.training_queue_max;
        let survey = self.survey;
        for &(building, queued) in &survey.trainers {
            if queued >= queue_max {
                continue;
            }
            let Some(kind) = view.map().get(building).and_then(|t| t.structure_kind()) else {
                continue;
            };
            let Some(def) = view.content().structure(kind) else {
                continue;
            };
            let spendable = self.spendable();
            let mut options: Vec<(UnitKind, f64)> = def
                .trains
                .iter()
                .filter_map(|unit| view.content().unit(*unit).map(|u| (*unit, u.cost)))
                .filter(|(_, cost)| *cost <= spendable)
                .collect();
            options.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
            let pick = if cheapest { options.first() } else { options.last() };
            if let Some(&(unit, cost)) = pick {
                self.budget -= cost;
                self.commands.push(Command::TrainUnit { building, unit });
            }
        }
    }

    /// Sends idle squads at distinct unclaimed resources, then builds mines on owned ones.
    pub fn expand(&mut self, remembered: &mut Vec<TilePos>) {
        let survey = self.survey;
        remembered.retain(|pos| survey.open_resources.contains(pos));
        let targets: Vec<TilePos> = survey
            .open_resources
            .iter()
            .copied()
            .filter(|pos| !remembered.contains(pos))
            .collect();
        // Keep one squad home.
        for (&(squad, _), target) in survey.idle_squads.iter().skip(1).zip(targets) {
            remembered.push(target);
            self.move_squad(squad, target);
        }
        if survey.open_resources.is_empty() {
            self.push_frontier();
        }
        self.build_mine();
    }

    /// Without resources to chase, idle squads walk to the nearest unowned tile.
    fn push_frontier(&mut self) {
        let survey = self.survey;
        let map = self.view.map();
        let capital = survey.capital;
        let radius = self.constants().bot_expand_radius;
        let mut frontier: Vec<TilePos> = map
            .square(capital, radius)
            .filter(|pos| {
                map.get(*pos)
                    .is_some_and(|t| t.owner.is_none() && t.terrain.is_passable())
            })
            .collect();
        frontier.sort_by(|a, b| {
            a.distance_sq(capital)
                .total_cmp(&b.distance_sq(capital))
                .then_with(|| a.cmp(b))
        });
        let movers = survey.idle_squads.iter().skip(1).map(|(id, _)| *id);
        for (squad, target) in movers.zip(frontier) {
            self.move_squad(squad, target);
        }
    }

    pub fn build_mine(&mut self) {
        let Some(site) = self.survey.mine_sites.first().copied() else {
            return;
        };
        let Some(base) = self.structure_cost(StructureKind::Mine) else {
            return;
        };
        let level = self.view.map().get(site).map_or(0, |t| {
            if t.structure_kind() == Some(StructureKind::Mine) {
                t.resource_level
            } else {
                0
            }
        });
        let cost = base * f64::from(level + 1);
        if cost <= self.spendable()
            && !self.has_command(|c| matches!(c, Command::BuildStructure { at, .. } if *at == site))
        {
            self.budget -= cost;
            self.commands.push(Command::BuildStructure {
                at: site,
                kind: StructureKind::Mine,
            });
        }
    }

    /// Barracks first, then towers around the capital, then mine upgrades.
    pub fn build(&mut self) {
        let kind = if self.survey.has_barracks {
            if self.survey.tower_count < 2 {
                StructureKind::Tower
            } else {
                self.build_mine();
                return;
            }
        } else {
            StructureKind::Barracks
        };
        let Some(cost) = self.structure_cost(kind) else {
            return;
        };
        if cost > self.spendable() {
            return;
        }
        let used: Vec<TilePos> = self
            .commands
            .iter()
            .filter_map(|c| match c {
                Command::BuildStructure { at, .. } => Some(*at),
                _ => None,
            })
            .collect();
        let capital = self.survey.capital;
        // Skip the ring the starting squad stands on.
        let Some(at) = self
            .survey
            .build_sites
            .iter()
            .copied()
            .find(|pos| pos.chebyshev(capital) >= 2 && !used.contains(pos))
        else {
            return;
        };
        self.budget -= cost;
        self.commands.push(Command::BuildStructure { at, kind });
    }

    pub fn defend(&mut self) {
        let Some(threat) = self.survey.nearest_threat else {
            return;
        };
        let survey = self.survey;
        for &squad in &survey.all_squads {
            self.move_squad(squad, threat);
        }
    }

    /// Sends every squad at the nearest living enemy capital. Returns false with no target.
    pub fn attack(&mut self) -> bool {
        let survey = self.survey;
        let capital = survey.capital;
        let target = self
            .view
            .contestants()
            .iter()
            .filter(|c| c.slot != survey.slot && c.alive)
            .filter_map(|c| c.capital)
            .min_by(|a, b| {
                a.distance_sq(capital)
                    .total_cmp(&b.distance_sq(capital))
                    .then_with(|| a.cmp(b))
            });
        let Some(target) = target else {
            return false;
        };
        for &squad in &survey.all_squads {
            self.move_squad(squad, target);
        }
        true
    }

    /// Spends whatever the chosen behaviour left over.
    pub fn opportunistic(&mut self) {
        if self
            .survey
            .trainers
            .iter()
            .any(|(building, queued)| {
                *queued == 0
                    && !self.has_command(
                        |c| matches!(c, Command::TrainUnit { building: b, .. } if b == building),
                    )
            })
        {
            self.train(true);
        }
        self.build_mine();
    }
}
