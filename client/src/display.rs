//! Text formatting for the console: timer, tank info, roster and game feed

use crate::mirror::{Mirror, MirrorTank};
use shared::session::RosterEntry;
use shared::{GridPosition, StateEvent};

/// Grid position as players see it, 1-indexed
pub fn position_text(position: GridPosition) -> String {
    format!("({},{})", position.x + 1, position.y + 1)
}

/// The info panel shown next to a tank
pub fn tank_info(name: &str, tank: &MirrorTank) -> String {
    let position = tank
        .position
        .map(position_text)
        .unwrap_or_else(|| "(-,-)".to_string());

    format!(
        "{}\nHealth: {}\nAction Points: {}\nRange: {}\n{}",
        name, tank.stats.health, tank.stats.action_points, tank.stats.range, position
    )
}

pub fn roster_text(roster: &[RosterEntry]) -> String {
    let mut text = String::new();
    for entry in roster {
        let state = if entry.alive { "alive" } else { "dead" };
        let line = match entry.color {
            Some(color) => format!("  {} [{}] {}\n", entry.name, state, color),
            None => format!("  {} [{}]\n", entry.name, state),
        };
        text.push_str(&line);
    }
    text
}

pub fn status_text(mirror: &Mirror) -> String {
    let (width, height) = mirror.board_size();

    let phase = if mirror.is_active() {
        format!("in play, next action point in {}", mirror.timer_text())
    } else {
        "waiting for the host to start".to_string()
    };
    let mut text = format!("Board {}x{}, {}\n", width, height, phase);
    if mirror.is_host() {
        text.push_str("You are the host\n");
    }

    if let Some(tank) = mirror.own_tank() {
        let name = mirror.owner_name(tank).unwrap_or("You");
        text.push_str(&tank_info(name, tank));
        text.push('\n');
    }

    let own = mirror.own_tank().map(|tank| tank.id);
    for tank in mirror.tanks().filter(|tank| Some(tank.id) != own) {
        let name = mirror.owner_name(tank).unwrap_or("?");
        let position = tank.position.map(position_text).unwrap_or_default();
        text.push_str(&format!(
            "  tank {} {} at {} health {}\n",
            tank.id, name, position, tank.stats.health
        ));
    }

    text
}

/// One console line for the events worth announcing
pub fn event_line(mirror: &Mirror, event: &StateEvent) -> Option<String> {
    let player_name = |id| {
        mirror
            .player(id)
            .map(|player| player.name.clone())
            .unwrap_or_else(|| format!("Player {}", id))
    };

    match event {
        StateEvent::PlayerJoined { name, .. } => Some(format!("{} joined", name)),
        StateEvent::PlayerLeft { player } => Some(format!("{} left", player_name(*player))),
        StateEvent::NameChanged { name, .. } => Some(format!("Now known as {}", name)),
        StateEvent::BoardResized { width, height } => {
            Some(format!("Board resized to {}x{}", width, height))
        }
        StateEvent::TankSpawned { owner, position, .. } => Some(format!(
            "{} spawned at {}",
            player_name(*owner),
            position_text(*position)
        )),
        StateEvent::PlayerDied { player } => {
            Some(format!("{} has been eliminated", player_name(*player)))
        }
        StateEvent::Notice { text, .. } => Some(text.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::color::Rgb;
    use shared::tank::TankStats;
    use shared::TankId;

    fn tank_at(x: i32, y: i32) -> MirrorTank {
        MirrorTank {
            id: TankId(1),
            owner: Some(1),
            color: Some(Rgb::new(255, 0, 0)),
            position: Some(GridPosition::new(x, y)),
            stats: TankStats::default(),
        }
    }

    #[test]
    fn test_position_is_one_indexed() {
        assert_eq!(position_text(GridPosition::new(0, 0)), "(1,1)");
        assert_eq!(position_text(GridPosition::new(3, 8)), "(4,9)");
    }

    #[test]
    fn test_tank_info_lines() {
        let info = tank_info("ada", &tank_at(2, 5));
        let lines: Vec<&str> = info.lines().collect();

        assert_eq!(
            lines,
            vec!["ada", "Health: 3", "Action Points: 1", "Range: 1", "(3,6)"]
        );
    }

    #[test]
    fn test_roster_text() {
        let roster = vec![
            RosterEntry {
                player: 2,
                name: "bo".into(),
                alive: true,
                color: Some(Rgb::new(0, 255, 0)),
            },
            RosterEntry {
                player: 1,
                name: "ada".into(),
                alive: false,
                color: None,
            },
        ];

        assert_eq!(
            roster_text(&roster),
            "  bo [alive] #00ff00\n  ada [dead]\n"
        );
    }

    #[test]
    fn test_lobby_status() {
        let mut mirror = Mirror::new();
        mirror.apply_event(&StateEvent::BoardResized {
            width: 8,
            height: 6,
        });
        mirror.set_identity(1, true);

        let status = status_text(&mirror);
        assert!(status.starts_with("Board 8x6, waiting for the host to start"));
        assert!(status.contains("You are the host"));
    }

    #[test]
    fn test_status_in_play() {
        let mut mirror = Mirror::new();
        for (player, name) in [(1, "ada"), (2, "bo")] {
            mirror.apply_event(&StateEvent::PlayerJoined {
                player,
                name: name.into(),
            });
        }
        for (tank, owner, x, y) in [(1, 1, 0, 0), (2, 2, 2, 3)] {
            mirror.apply_event(&StateEvent::TankSpawned {
                tank: TankId(tank),
                owner,
                color: Rgb::new(255, 0, 0),
                position: GridPosition::new(x, y),
            });
        }
        mirror.apply_event(&StateEvent::GameStarted);
        mirror.set_identity(1, false);

        let status = status_text(&mirror);
        let lines: Vec<&str> = status.lines().collect();
        assert_eq!(lines[0], "Board 0x0, in play, next action point in 0:00");
        assert_eq!(&lines[1..6], ["ada", "Health: 3", "Action Points: 1", "Range: 1", "(1,1)"]);
        assert_eq!(lines[6], "  tank #2 bo at (3,4) health 3");
        assert!(!status.contains("You are the host"));
    }

    #[test]
    fn test_quiet_events_have_no_line() {
        let mirror = Mirror::new();
        assert_eq!(
            event_line(&mirror, &StateEvent::ActionPointsGranted),
            None
        );
        assert_eq!(
            event_line(&mirror, &StateEvent::PlayerDied { player: 4 }),
            Some("Player 4 has been eliminated".to_string())
        );
    }
}
