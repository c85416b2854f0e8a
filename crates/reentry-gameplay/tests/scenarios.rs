//! End-to-end move scenarios through the public engine API.

use std::cell::RefCell;
use std::rc::Rc;

use reentry_gameplay::prelude::*;

/// Actuator that keeps every meta it was shown.
#[derive(Default)]
struct RecordingActuator {
    metas: Vec<ActuateMeta>,
    continued: usize,
}

impl Actuator for RecordingActuator {
    fn actuate(&mut self, _grid: &Grid, meta: &ActuateMeta) {
        self.metas.push(*meta);
    }

    fn continue_game(&mut self) {
        self.continued += 1;
    }
}

struct Harness {
    engine: GameEngine,
    store: MemoryStore,
    recorder: EventRecorder,
    actuator: Rc<RefCell<RecordingActuator>>,
}

fn harness(rows: &[&[u32]], seed: u64) -> Harness {
    harness_with(GameConfig::default(), rows, seed)
}

fn harness_with(config: GameConfig, rows: &[&[u32]], seed: u64) -> Harness {
    let bus = EventBus::new();
    let store = MemoryStore::new();
    let actuator = Rc::new(RefCell::new(RecordingActuator::default()));
    let mut engine = GameEngine::new(
        config,
        bus.clone(),
        Box::new(store.clone()),
        Box::new(Rc::clone(&actuator)),
        fastrand::Rng::with_seed(seed),
    );

    let mut snapshot = engine.snapshot();
    snapshot.grid = Grid::from_rows(rows).snapshot();
    engine.restore(&snapshot).expect("valid snapshot");

    let recorder = EventRecorder::attach(&bus);
    Harness {
        engine,
        store,
        recorder,
        actuator,
    }
}

#[test]
fn merge_scenario() {
    let mut h = harness(&[&[0, 0, 0, 0], &[2, 2, 0, 0], &[0; 4], &[0; 4]], 11);

    let outcome = h.engine.move_tiles(Direction::Left);

    assert!(outcome.moved);
    assert_eq!(h.engine.score(), 4);
    assert_eq!(h.engine.grid().tile_count(), 2);
    assert_eq!(h.engine.grid().to_rows()[1][0], 4);
    assert!(outcome.spawned.is_some());
    assert_eq!(
        h.recorder.of_topic(EventTopic::Merge),
        vec![GameEvent::Merge { value: 4 }]
    );
    assert_eq!(h.recorder.of_topic(EventTopic::Move).len(), 1);

    let merged = h
        .engine
        .grid()
        .cell_content(reentry_common::CellCoord::new(0, 1))
        .copied()
        .expect("merged tile");
    let sources = merged.merged_from().expect("merge sources");
    assert_eq!(sources[0].value + sources[1].value, merged.value());
}

#[test]
fn noop_scenario() {
    let rows: &[&[u32]] = &[&[2, 4, 0, 0], &[8, 0, 0, 0], &[16, 2, 0, 0], &[0; 4]];
    let mut h = harness(rows, 5);
    let before = h.engine.snapshot();
    let actuations = h.actuator.borrow().metas.len();
    let writes = h.store.writes();

    let outcome = h.engine.move_tiles(Direction::Left);

    assert!(!outcome.moved);
    assert!(outcome.spawned.is_none());
    assert_eq!(h.engine.snapshot(), before);
    assert!(h.recorder.events().is_empty());
    assert_eq!(h.store.writes(), writes);
    assert_eq!(h.actuator.borrow().metas.len(), actuations);
}

#[test]
fn merged_tile_does_not_merge_again() {
    let mut h = harness(&[&[0, 2, 2, 4], &[0; 4], &[0; 4], &[0; 4]], 1);

    h.engine.move_tiles(Direction::Right);

    assert_eq!(&h.engine.grid().to_rows()[0][2..], &[4, 4]);
    assert_eq!(h.engine.score(), 4);
}

#[test]
fn full_board_without_pairs_is_over() {
    // One empty cell; moving left fills it with the spawn and locks the board.
    // Only 2s spawn, and the cell above the gap holds a 4.
    let config = GameConfig {
        four_probability: 0.0,
        ..GameConfig::default()
    };
    let mut h = harness_with(
        config,
        &[&[2, 4, 2, 4], &[4, 2, 4, 2], &[2, 4, 2, 4], &[0, 8, 16, 32]],
        9,
    );
    let mut store = h.store.clone();
    store
        .save_game(&h.engine.snapshot())
        .expect("seed saved game");

    let outcome = h.engine.move_tiles(Direction::Left);

    assert!(outcome.moved);
    assert!(outcome.over);
    assert_eq!(h.engine.grid().to_rows()[3], vec![8, 16, 32, 2]);
    assert!(h.engine.is_over());
    assert!(h.engine.is_game_terminated());
    assert!(h.store.game().is_none());

    // Over closes the move's events; the progression update follows.
    let topics: Vec<EventTopic> = h.recorder.events().iter().map(GameEvent::topic).collect();
    assert_eq!(
        topics,
        vec![EventTopic::Move, EventTopic::Over, EventTopic::Progression]
    );
    assert_eq!(
        h.recorder.of_topic(EventTopic::Over),
        vec![GameEvent::Over { score: 0 }]
    );
    let last = h.actuator.borrow().metas.last().copied().expect("actuated");
    assert!(last.over && last.terminated);
}

#[test]
fn full_board_with_one_pair_is_not_over() {
    let locked = Grid::from_rows(&[&[2, 4, 2, 4], &[4, 2, 4, 2], &[2, 4, 2, 4], &[4, 2, 4, 2]]);
    assert!(!locked.cells_available());
    assert!(!locked.has_adjacent_match());

    let open = Grid::from_rows(&[&[2, 4, 2, 4], &[4, 2, 4, 2], &[2, 4, 2, 4], &[4, 2, 4, 4]]);
    assert!(open.has_adjacent_match());

    let mut h = harness(&[&[2, 4, 2, 4], &[4, 2, 4, 2], &[2, 4, 2, 4], &[4, 2, 4, 4]], 2);
    assert!(h.engine.moves_available());
    let outcome = h.engine.move_tiles(Direction::Right);
    assert_eq!(outcome.merges, vec![8]);
    assert_eq!(&h.engine.grid().to_rows()[3][1..], &[4, 2, 8]);
}

#[test]
fn snapshot_round_trip() {
    let mut h = harness(&[&[2, 2, 8, 0], &[0, 64, 0, 0], &[0; 4], &[4, 0, 0, 2]], 21);
    h.engine.move_tiles(Direction::Up);
    let snapshot = h.engine.snapshot();

    let json = snapshot.to_json().expect("serialize");
    let parsed = GameSnapshot::from_json(&json).expect("parse");

    let mut other = harness(&[&[0; 4], &[0; 4], &[0; 4], &[0; 4]], 0);
    other.engine.restore(&parsed).expect("restore");

    assert_eq!(other.engine.grid().to_rows(), h.engine.grid().to_rows());
    assert_eq!(other.engine.score(), h.engine.score());
    assert_eq!(other.engine.is_over(), h.engine.is_over());
    assert_eq!(other.engine.is_won(), h.engine.is_won());
    assert_eq!(other.engine.snapshot(), snapshot);
}

#[test]
fn persisted_after_every_move() {
    let mut h = harness(&[&[0, 0, 0, 2], &[0; 4], &[0; 4], &[0; 4]], 4);

    h.engine.move_tiles(Direction::Left);
    let saved = h.store.game().expect("snapshot saved");
    assert_eq!(saved, h.engine.snapshot());
}

#[test]
fn keep_playing_after_win() {
    let mut h = harness(&[&[1024, 1024, 0, 0], &[0; 4], &[0; 4], &[0; 4]], 8);

    h.engine.move_tiles(Direction::Left);
    assert!(h.engine.is_won());
    assert!(h.engine.is_game_terminated());
    assert_eq!(h.recorder.of_topic(EventTopic::Won).len(), 1);

    h.engine.handle_command(GameCommand::KeepPlaying);
    assert!(!h.engine.is_game_terminated());
    assert_eq!(h.actuator.borrow().continued, 1);

    // A second 2048 does not announce another win.
    let mut snapshot = h.engine.snapshot();
    snapshot.grid = Grid::from_rows(&[&[2048, 1024, 1024, 0], &[0; 4], &[0; 4], &[0; 4]]).snapshot();
    h.engine.restore(&snapshot).expect("restore");
    h.recorder.clear();
    h.engine.move_tiles(Direction::Left);
    assert!(h.recorder.of_topic(EventTopic::Won).is_empty());
}

#[test]
fn progression_follows_every_move() {
    // Sum 198 before the move; any spawn pushes it past 200.
    let mut h = harness(&[&[0, 0, 0, 128], &[0, 0, 0, 64], &[0, 0, 0, 4], &[0, 0, 0, 2]], 13);

    h.engine.move_tiles(Direction::Left);

    let progression = h.recorder.of_topic(EventTopic::Progression);
    assert_eq!(progression.len(), 1);
    let GameEvent::Progression(state) = &progression[0] else {
        panic!("expected progression payload");
    };
    assert_eq!(state.max_tile, 128);
    assert_eq!(state.tile_sum, h.engine.grid().tile_sum());
    assert_eq!(
        h.recorder.of_topic(EventTopic::OxygenChanged),
        vec![GameEvent::OxygenChanged {
            from: OxygenLevel::Stable,
            to: OxygenLevel::Medium,
        }]
    );
}

#[test]
fn three_in_a_row_merges_nearest_the_wall() {
    let mut h = harness(&[&[2, 2, 2, 0], &[0; 4], &[0; 4], &[0; 4]], 5);

    h.engine.move_tiles(Direction::Right);

    let row = &h.engine.grid().to_rows()[0];
    assert_eq!(row[3], 4);
    assert_eq!(row[2], 2);
    assert_eq!(h.engine.score(), 4);
}
