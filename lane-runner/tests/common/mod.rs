use lane_runner::trainer::{Trainer, TrainerParameter};

#[ctor::ctor]
fn init() {
    ql::log::init_logging();
}

pub fn trained(
    param: TrainerParameter,
    n_episodes: usize,
    keep_every: usize,
) -> Trainer {
    let mut trainer = Trainer::new(param).unwrap();
    trainer.train(n_episodes, keep_every).unwrap();
    trainer
}
