// Integration tests for the tick engine
//
// Small hand-built levels exercise one rule at a time:
// - Simultaneous head-to-head and position swaps
// - Apple consumption and growth on the consumption tick
// - Reversal rejection and command freshness
// - Kill attribution, corpse removal and effect aging
// - Wrap-around versus edge walls
// A seeded random run then checks the board invariants over many ticks.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

use snake_arena::board::Cell;
use snake_arena::command::{self, Command};
use snake_arena::config::RulesConfig;
use snake_arena::engine::{Engine, GameEvent, RoundOutcome};
use snake_arena::entities::{DeathCause, EffectKind, PlayerSpec};
use snake_arena::level::{builtin_level, AppleRule, Level, SpawnPoint, WinCondition};
use snake_arena::snapshot::{self, Snapshot};
use snake_arena::types::{Coord, Direction};

fn rules() -> RulesConfig {
    RulesConfig {
        effect_lifetime_ticks: 3,
        seed: None,
    }
}

fn spawn(x: i32, y: i32, direction: Direction) -> SpawnPoint {
    SpawnPoint {
        position: Coord::new(x, y),
        direction,
    }
}

fn level(size: i32, wrap: bool, spawns: Vec<SpawnPoint>, apples: Vec<Coord>, length: usize) -> Level {
    Level {
        name: "Test".to_string(),
        width: size,
        height: size,
        wrap,
        walls: vec![],
        spawns,
        apple_count: 1,
        apple_rule: AppleRule::Fixed(apples),
        win_condition: WinCondition::LastStanding,
        initial_length: length,
    }
}

fn engine(level: Level) -> Engine {
    let roster: Vec<PlayerSpec> = (0..level.spawns.len()).map(PlayerSpec::numbered).collect();
    Engine::new(level, &roster, &rules(), 42).expect("level should be valid")
}

#[test]
fn test_head_to_head_kills_both_without_credit() {
    let mut engine = engine(level(
        5,
        false,
        vec![spawn(1, 2, Direction::Right), spawn(3, 2, Direction::Left)],
        vec![Coord::new(2, 4)],
        2,
    ));

    let events = engine.tick(Vec::new()).unwrap();

    for snake in engine.snakes() {
        assert!(!snake.is_alive());
        assert_eq!(snake.kills(), 0);
        assert!(matches!(
            snake.death_cause(),
            Some(DeathCause::HeadToHead { .. })
        ));
    }
    assert!(!events.iter().any(|e| matches!(e, GameEvent::Kill { .. })));
    assert_eq!(engine.outcome(), Some(RoundOutcome::Draw));
}

#[test]
fn test_position_swap_kills_both_and_credits_each() {
    let mut engine = engine(level(
        5,
        false,
        vec![spawn(1, 2, Direction::Right), spawn(2, 2, Direction::Left)],
        vec![Coord::new(2, 4)],
        2,
    ));

    engine.tick(Vec::new()).unwrap();

    assert_eq!(
        engine.snakes()[0].death_cause(),
        Some(&DeathCause::Body { owner: 1 })
    );
    assert_eq!(
        engine.snakes()[1].death_cause(),
        Some(&DeathCause::Body { owner: 0 })
    );
    assert_eq!(engine.snakes()[0].kills(), 1);
    assert_eq!(engine.snakes()[1].kills(), 1);
    assert_eq!(engine.outcome(), Some(RoundOutcome::Draw));
}

#[test]
fn test_apple_ahead_grows_this_tick_and_respawns() {
    let mut engine = engine(level(
        7,
        false,
        vec![spawn(1, 3, Direction::Right)],
        vec![Coord::new(2, 3), Coord::new(5, 5)],
        2,
    ));
    assert_eq!(engine.snakes()[0].len(), 2);

    let events = engine.tick(Vec::new()).unwrap();

    let snake = &engine.snakes()[0];
    assert_eq!(snake.len(), 3);
    assert_eq!(snake.head(), Some(Coord::new(2, 3)));
    assert!(events.contains(&GameEvent::AppleEaten {
        player: 0,
        at: Coord::new(2, 3)
    }));

    // Replacement follows the fixed list and lands on a free cell
    assert_eq!(engine.apples().len(), 1);
    let apple = engine.apples()[0].position;
    assert_eq!(apple, Coord::new(5, 5));
    assert_eq!(engine.board().get(apple), Some(Cell::Apple));

    // Sparkle marks the eaten apple
    assert!(engine
        .effects()
        .iter()
        .any(|e| e.kind == EffectKind::Sparkle && e.at == Coord::new(2, 3)));

    // No apple ahead: length holds
    engine.tick(Vec::new()).unwrap();
    assert_eq!(engine.snakes()[0].len(), 3);
}

#[test]
fn test_reversal_is_ignored() {
    let mut engine = engine(level(
        7,
        false,
        vec![spawn(3, 3, Direction::Right)],
        vec![Coord::new(6, 6)],
        3,
    ));

    let events = engine
        .tick(vec![Command::new(0, Direction::Left, 0)])
        .unwrap();

    assert!(events.contains(&GameEvent::ReversalIgnored {
        player: 0,
        requested: Direction::Left
    }));
    assert!(engine.snakes()[0].is_alive());
    assert_eq!(engine.snakes()[0].head(), Some(Coord::new(4, 3)));
    assert_eq!(engine.snakes()[0].facing(), Direction::Right);
}

#[test]
fn test_freshest_command_wins() {
    let mut engine = engine(level(
        7,
        false,
        vec![spawn(3, 3, Direction::Right)],
        vec![Coord::new(6, 6)],
        2,
    ));
    let (sender, mut receiver) = command::channel();
    sender.send(Command::new(0, Direction::Up, 0)).unwrap();
    sender.send(Command::new(0, Direction::Down, 0)).unwrap();

    let drained = receiver.drain();
    assert_eq!(drained.len(), 1);
    engine.tick(drained).unwrap();

    assert_eq!(engine.snakes()[0].head(), Some(Coord::new(3, 4)));
    assert_eq!(engine.snakes()[0].facing(), Direction::Down);
}

#[test]
fn test_body_hit_credits_owner_and_corpse_clears_next_tick() {
    // Player 1 stands vertically across player 0's path
    let mut engine = engine(level(
        7,
        false,
        vec![spawn(1, 3, Direction::Right), spawn(2, 2, Direction::Up)],
        vec![Coord::new(6, 6)],
        2,
    ));

    let events = engine.tick(Vec::new()).unwrap();

    assert_eq!(
        engine.snakes()[0].death_cause(),
        Some(&DeathCause::Body { owner: 1 })
    );
    assert_eq!(engine.snakes()[1].kills(), 1);
    assert!(events.contains(&GameEvent::Kill {
        killer: 1,
        victim: 0
    }));
    assert_eq!(engine.outcome(), Some(RoundOutcome::Winner(1)));

    // Corpse still on the board this tick, with a burst at the head
    let corpse: Vec<Coord> = engine.snakes()[0].body().iter().copied().collect();
    assert_eq!(corpse.len(), 2);
    for cell in &corpse {
        assert_eq!(engine.board().get(*cell), Some(Cell::Snake(0)));
    }
    assert!(engine
        .effects()
        .iter()
        .any(|e| e.kind == EffectKind::Burst && e.at == Coord::new(1, 3)));

    engine.tick(Vec::new()).unwrap();
    assert!(engine.snakes()[0].body().is_empty());
    for cell in &corpse {
        assert_eq!(engine.board().get(*cell), Some(Cell::Empty));
    }
}

#[test]
fn test_effects_expire_after_lifetime() {
    let mut engine = engine(level(
        5,
        false,
        vec![spawn(4, 2, Direction::Right)],
        vec![Coord::new(2, 4)],
        2,
    ));

    engine.tick(Vec::new()).unwrap();
    assert_eq!(engine.effects().len(), 1);
    assert_eq!(engine.effects()[0].remaining_ticks, 3);

    engine.tick(Vec::new()).unwrap();
    engine.tick(Vec::new()).unwrap();
    assert_eq!(engine.effects()[0].remaining_ticks, 1);

    engine.tick(Vec::new()).unwrap();
    assert!(engine.effects().is_empty());
}

#[test]
fn test_wrap_versus_edge_wall() {
    let mut wrapped = engine(level(
        5,
        true,
        vec![spawn(4, 2, Direction::Right)],
        vec![Coord::new(2, 4)],
        2,
    ));
    wrapped.tick(Vec::new()).unwrap();
    assert!(wrapped.snakes()[0].is_alive());
    assert_eq!(wrapped.snakes()[0].head(), Some(Coord::new(0, 2)));

    let mut walled = engine(level(
        5,
        false,
        vec![spawn(4, 2, Direction::Right)],
        vec![Coord::new(2, 4)],
        2,
    ));
    walled.tick(Vec::new()).unwrap();
    assert_eq!(walled.snakes()[0].death_cause(), Some(&DeathCause::Wall));
    // Solo death is a draw
    assert_eq!(walled.outcome(), Some(RoundOutcome::Draw));
}

#[test]
fn test_tail_cell_counts_as_occupied() {
    // Player 0's head sits right behind player 1's tail, which moves away this tick
    let mut engine = engine(level(
        7,
        false,
        vec![spawn(2, 3, Direction::Right), spawn(4, 3, Direction::Right)],
        vec![Coord::new(6, 6)],
        2,
    ));

    engine.tick(Vec::new()).unwrap();

    assert_eq!(
        engine.snakes()[0].death_cause(),
        Some(&DeathCause::Body { owner: 1 })
    );
    assert!(engine.snakes()[1].is_alive());
    assert_eq!(engine.snakes()[1].head(), Some(Coord::new(5, 3)));
}

#[test]
fn test_commands_for_dead_players_are_dropped() {
    let mut engine = engine(level(
        5,
        false,
        vec![spawn(4, 2, Direction::Right), spawn(1, 0, Direction::Down)],
        vec![Coord::new(2, 4)],
        1,
    ));
    engine.tick(Vec::new()).unwrap();
    assert!(!engine.snakes()[0].is_alive());

    let result = engine.tick(vec![Command::new(0, Direction::Up, 1)]);
    assert!(result.is_ok());
    assert_eq!(engine.snakes()[0].pending(), None);
}

#[test]
fn test_snapshot_is_detached_from_engine() {
    let mut engine = engine(builtin_level("Open Field").unwrap());
    let captured = Snapshot::capture(&engine);
    let bytes = snapshot::encode(&captured).unwrap();

    engine.tick(Vec::new()).unwrap();

    let decoded = snapshot::decode(&bytes).unwrap();
    assert_eq!(decoded, captured);
    assert_eq!(decoded.tick, 0);
    assert_ne!(Snapshot::capture(&engine), captured);
}

#[test]
fn test_seeded_random_round_keeps_board_consistent() {
    let level = builtin_level("Crossroads").unwrap();
    let apple_count = level.apple_count;
    let roster: Vec<PlayerSpec> = (0..4).map(PlayerSpec::numbered).collect();
    let mut engine = Engine::new(level, &roster, &rules(), 7).unwrap();
    let mut rng = StdRng::seed_from_u64(99);

    for _ in 0..300 {
        let before: Vec<usize> = engine.snakes().iter().map(|s| s.len()).collect();
        let commands: Vec<Command> = (0..4)
            .filter_map(|p| {
                if !rng.random_bool(0.5) {
                    return None;
                }
                let dir = Direction::all()[rng.random_range(0..4)];
                Some(Command::new(p, dir, engine.tick_count()))
            })
            .collect();

        let events = engine.tick(commands).expect("tick should not violate invariants");

        // Every segment is unique and mirrored on the board
        let mut seen = HashSet::new();
        for snake in engine.snakes() {
            for segment in snake.body() {
                assert!(seen.insert(*segment), "overlap at {:?}", segment);
                assert_eq!(engine.board().get(*segment), Some(Cell::Snake(snake.index)));
            }
        }
        for apple in engine.apples() {
            assert!(seen.insert(apple.position));
            assert_eq!(engine.board().get(apple.position), Some(Cell::Apple));
        }
        assert!(engine.apples().len() <= apple_count);

        // Growth law for snakes that survived the tick
        for snake in engine.snakes().iter().filter(|s| s.is_alive()) {
            let ate = events.iter().any(
                |e| matches!(e, GameEvent::AppleEaten { player, .. } if *player == snake.index),
            );
            assert_eq!(snake.len(), before[snake.index] + usize::from(ate));
        }

        // Every reachable state survives the wire codec, corpses included
        let captured = Snapshot::capture(&engine);
        let decoded = snapshot::decode(&snapshot::encode(&captured).unwrap()).unwrap();
        assert_eq!(decoded, captured, "codec mismatch at tick {}", engine.tick_count());

        if engine.alive_count() == 0 {
            break;
        }
    }
}
