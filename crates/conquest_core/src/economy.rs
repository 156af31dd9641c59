use crate::map::{GameMap, Tile};
use crate::{Constants, MatchState, PlayerSlot, Terrain};

fn tile_income(tile: &Tile, constants: &Constants) -> f64 {
    let mut income = constants.passive_income_per_tile;
    if tile.terrain == Terrain::Resource {
        income += constants.resource_base_income
            + constants.resource_upgrade_bonus * f64::from(tile.resource_level);
    }
    income
}

/// `1 / (1 + (territory / divisor) ^ exponent)`.
pub fn diminishing_multiplier(territory: u32, constants: &Constants) -> f64 {
    let divisor = constants.diminishing_divisor.max(f64::EPSILON);
    1.0 / (1.0 + (f64::from(territory) / divisor).powf(constants.diminishing_exponent))
}

/// Income per second from connected tiles before the territory multiplier.
pub fn raw_income(map: &GameMap, owner: PlayerSlot, constants: &Constants) -> f64 {
    map.tiles()
        .filter(|(_, tile)| tile.owner == Some(owner) && tile.connected)
        .map(|(_, tile)| tile_income(tile, constants))
        .sum()
}

pub(crate) fn accrue_income(state: &mut MatchState, constants: &Constants, dt: f64) {
    let mut raw = vec![0.0_f64; state.contestants.len()];
    for (_, tile) in state.map.tiles() {
        let Some(owner) = tile.owner.filter(|_| tile.connected) else {
            continue;
        };
        let Some(slot_income) = raw.get_mut(owner.index()) else {
            continue;
        };
        *slot_income += tile_income(tile, constants);
    }

    for (contestant, raw) in state.contestants.iter_mut().zip(raw) {
        if !contestant.alive {
            contestant.income_rate = 0.0;
            continue;
        }
        let rate = raw * diminishing_multiplier(contestant.territory, constants);
        contestant.income_rate = rate;
        contestant.gold += rate * dt;
        contestant.stats.gold_earned += rate * dt;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::base_content;

    #[test]
    fn multiplier_halves_at_divisor() {
        let c = base_content().constants;
        let at_divisor = diminishing_multiplier(c.diminishing_divisor as u32, &c);
        assert!((at_divisor - 0.5).abs() < 1e-9);
        assert!((diminishing_multiplier(0, &c) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn multiplier_decreases_with_territory() {
        let c = base_content().constants;
        let mut previous = diminishing_multiplier(0, &c);
        for territory in [10, 50, 150, 400, 1000] {
            let m = diminishing_multiplier(territory, &c);
            assert!(m < previous);
            previous = m;
        }
    }
}
