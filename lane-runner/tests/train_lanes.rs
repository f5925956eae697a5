use lane_runner::environment::{DiscreteState, LaneAction, LaneEnvironment, LaneParameter};
use lane_runner::trainer::TrainerParameter;
use ql::learn::q_table_agent;
use ql::prelude::{Action, DebugVisualizer, Environment};

mod common;

#[test]
fn test_initial_state_with_default_seed() {
    let mut env = LaneEnvironment::new(LaneParameter {
        horizon: 12,
        spawn_prob: 0.35,
        seed: 7,
        ..LaneParameter::default()
    })
    .unwrap();
    assert_eq!(env.reset(), DiscreteState::new(1, [5, 5, 5]));
}

#[test]
fn test_training_is_reproducible() {
    let t1 = common::trained(TrainerParameter::default(), 150, 25);
    let t2 = common::trained(TrainerParameter::default(), 150, 25);

    assert_eq!(t1.agent.q_table(), t2.agent.q_table());
    assert_eq!(t1.stats, t2.stats);
    assert_eq!(t1.episodes(), t2.episodes());
    assert_eq!(t1.best_index(), t2.best_index());
}

#[test]
fn test_different_seeds_diverge() {
    let other = TrainerParameter {
        environment: LaneParameter { seed: 8, ..LaneParameter::default() },
        agent: q_table_agent::Parameter { seed: 8, ..q_table_agent::Parameter::default() },
        ..TrainerParameter::default()
    };
    let t1 = common::trained(TrainerParameter::default(), 50, 10);
    let t2 = common::trained(other, 50, 10);
    assert_ne!(t1.stats.distances(), t2.stats.distances());
}

#[test]
fn test_training_statistics() {
    let trainer = common::trained(TrainerParameter::default(), 200, 50);
    let stats = &trainer.stats;

    assert_eq!(stats.episodes(), 200);
    assert_eq!(stats.rewards().len(), 200);
    assert_eq!(stats.crashes().len(), 200);
    assert_eq!(stats.epsilons().len(), 200);
    assert!(stats.epsilons().windows(2).all(|w| w[1] <= w[0]));
    assert!(stats.epsilons().iter().all(|&e| e >= 0.01));
    assert_eq!(stats.crash_rate_recent(), 1.0);

    // every training episode ends with a crash: distance - 1 survived steps and the crash penalty
    for (&distance, &reward) in stats.distances().iter().zip(stats.rewards()) {
        assert_eq!(reward, (distance as f32 - 1.0) - 10.0);
    }

    let kept = trainer.episodes().iter().map(|e| e.episode).collect::<Vec<_>>();
    assert_eq!(kept, vec![0, 50, 100, 150, 199]);

    // every visited state has a full row
    let q_table = trainer.agent.q_table();
    assert_eq!(q_table.action_space(), LaneAction::ACTION_SPACE as usize);
    for (_, row) in q_table.iter() {
        assert_eq!(row.len(), q_table.action_space());
    }
    assert!(trainer.agent.q_table().len() > 1);
}

#[test]
fn test_kept_episode_can_be_replayed() {
    let trainer = common::trained(TrainerParameter::default(), 20, 5);
    let best = trainer.best_episode().unwrap();
    for step in &best.steps {
        let road = &step.road;
        assert!(road.obstacles().iter().all(|ob| ob.y >= 0 && ob.y <= road.horizon()));
        assert!(!road.one_line_info().is_empty());
        let screen = road.render_to_console();
        assert_eq!(screen.get_height() as i32, road.horizon() + 1);
    }
    assert!(best.steps.last().unwrap().crashed);
}

#[test]
fn test_greedy_playback_after_training() {
    let mut trainer = common::trained(TrainerParameter::default(), 100, 100);
    let epsilon = trainer.agent.epsilon();
    trainer.reset_playback();

    let mut finished = 0;
    for _ in 0..5_000 {
        if trainer.play_step().unwrap().crashed {
            finished += 1;
        }
    }
    assert_eq!(trainer.stats.episodes(), 100 + finished);
    assert_eq!(trainer.agent.epsilon(), epsilon);
}

#[test]
fn test_training_can_continue() {
    let mut trainer = common::trained(TrainerParameter::default(), 10, 5);
    trainer.train(10, 5).unwrap();
    assert_eq!(trainer.stats.episodes(), 20);
    // each call keeps its own sample: 0, 5, 9
    assert_eq!(trainer.episodes().len(), 6);
    assert!((trainer.agent.epsilon() - 0.99_f32.powi(20)).abs() < 1e-4);
}
