use std::fmt::{Display, Formatter};

use anyhow::{ensure, Result};
use console_engine::pixel;
use console_engine::screen::Screen;
use rand::prelude::*;

use ql::prelude::{Action, DebugVisualizer, Environment, ModelActionType, QlError};

pub const LANES: usize = 3;
const CENTER_LANE: usize = 1;

const REWARD_SURVIVED: f32 = 1.0;
const REWARD_CRASH: f32 = -10.0;

/// Upper bounds of the distance bins 1..=5; everything up to 1 falls into bin 0, everything beyond 10 into bin 5.
const BIN_BOUNDS: [i32; 5] = [2, 4, 6, 8, 10];

#[derive(Clone, Debug, PartialEq)]
pub struct LaneParameter {
    /// Track length in steps; new obstacles appear at this distance
    pub horizon: i32,
    /// A new obstacle may only spawn if no alive obstacle is further away than `horizon - min_gap`
    pub min_gap: i32,
    /// Probability of a spawn in a step where the gap rule allows one
    pub spawn_prob: f32,
    pub seed: u64,
}

impl LaneParameter {
    fn validate(&self) -> Result<()> {
        ensure!(self.horizon > 0, "horizon must be positive, got {}", self.horizon);
        ensure!(self.min_gap >= 0, "min_gap must not be negative, got {}", self.min_gap);
        ensure!(
            (0.0..=1.0).contains(&self.spawn_prob),
            "spawn_prob must be in [0, 1], got {}",
            self.spawn_prob
        );
        Ok(())
    }
}

impl Default for LaneParameter {
    fn default() -> Self {
        Self {
            horizon: 12,
            min_gap: 3,
            spawn_prob: 0.35,
            seed: 7,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Obstacle {
    pub lane: usize,
    /// remaining distance to the car; 0 means level with the car
    pub y: i32,
}

/// The observable track: the car's lane and all obstacles still ahead of (or level with) the car.
#[derive(Clone, Debug, PartialEq)]
pub struct Road {
    horizon: i32,
    car_lane: usize,
    obstacles: Vec<Obstacle>,
}

impl Road {
    fn new(horizon: i32) -> Self {
        Self {
            horizon,
            car_lane: CENTER_LANE,
            obstacles: vec![],
        }
    }

    pub fn horizon(&self) -> i32 { self.horizon }

    pub fn car_lane(&self) -> usize { self.car_lane }

    pub fn obstacles(&self) -> &[Obstacle] { &self.obstacles }

    /// Distance of the nearest obstacle per lane; `horizon` for a free lane.
    pub fn nearest_distances(&self) -> [i32; LANES] {
        let mut dists = [self.horizon; LANES];
        for ob in &self.obstacles {
            if 0 <= ob.y && ob.y <= dists[ob.lane] {
                dists[ob.lane] = ob.y;
            }
        }
        dists
    }

    pub fn discretize(&self) -> DiscreteState {
        DiscreteState {
            car_lane: self.car_lane as u8,
            bins: self.nearest_distances().map(distance_bin),
        }
    }

    fn move_car(
        &mut self,
        action: LaneAction,
    ) {
        self.car_lane = match action {
            LaneAction::Left => self.car_lane.saturating_sub(1),
            LaneAction::Stay => self.car_lane,
            LaneAction::Right => usize::min(LANES - 1, self.car_lane + 1),
        }
    }

    /// Moves all obstacles one step closer and drops the ones which passed the car
    fn advance_obstacles(&mut self) {
        for ob in self.obstacles.iter_mut() {
            ob.y -= 1;
        }
        self.obstacles.retain(|ob| ob.y >= 0);
    }

    fn collision(&self) -> bool {
        self.obstacles.iter().any(|ob| ob.y == 0 && ob.lane == self.car_lane)
    }
}

fn distance_bin(distance: i32) -> u8 {
    if distance <= 1 {
        return 0;
    }
    BIN_BOUNDS.iter()
        .position(|&bound| distance <= bound)
        .map_or(5, |i| i as u8 + 1)
}

/// Learning state: the car lane plus the binned nearest obstacle distance of the left, middle and right lane.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DiscreteState {
    pub car_lane: u8,
    pub bins: [u8; LANES],
}

impl DiscreteState {
    pub fn new(
        car_lane: u8,
        bins: [u8; LANES],
    ) -> Self {
        Self { car_lane, bins }
    }
}

impl Display for DiscreteState {
    fn fmt(
        &self,
        f: &mut Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "({}, {}, {}, {})", self.car_lane, self.bins[0], self.bins[1], self.bins[2])
    }
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum LaneAction {
    Left,
    Stay,
    Right,
}

impl Display for LaneAction {
    fn fmt(
        &self,
        f: &mut Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            LaneAction::Left => f.write_str("←"),
            LaneAction::Stay => f.write_str("o"),
            LaneAction::Right => f.write_str("→"),
        }
    }
}

impl Action for LaneAction {
    const ACTION_SPACE: ModelActionType = 3;

    fn numeric(&self) -> ModelActionType {
        use LaneAction::*;
        match self {
            Left => 0,
            Stay => 1,
            Right => 2,
        }
    }

    fn try_from_numeric(value: ModelActionType) -> Result<Self> {
        use LaneAction::*;
        match value {
            0 => Ok(Left),
            1 => Ok(Stay),
            2 => Ok(Right),
            _ => Err(QlError(format!("value {} out of range", value)).into()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepInfo {
    pub crashed: bool,
    /// steps survived in the current episode
    pub distance: usize,
}

/// Three-lane obstacle track.
///
/// The car sits at distance 0 and may switch one lane per step. Obstacles spawn at `horizon`
/// and come one step closer each step. Car and obstacles move simultaneously; a crash happens
/// when an obstacle reaches distance 0 in the car's lane after both moved.
///
/// Every survived step earns `+1`, a crash `-10` and ends the episode.
/// Spawning uses the environment's own seeded generator, so a fixed seed reproduces the same track.
pub struct LaneEnvironment {
    param: LaneParameter,
    rng: StdRng,
    road: Road,
    step_count: usize,
    done: bool,
}

impl LaneEnvironment {
    pub fn new(param: LaneParameter) -> Result<Self> {
        param.validate()?;
        Ok(Self {
            rng: StdRng::seed_from_u64(param.seed),
            road: Road::new(param.horizon),
            step_count: 0,
            done: false,
            param,
        })
    }

    pub fn param(&self) -> &LaneParameter { &self.param }

    pub fn road(&self) -> &Road { &self.road }

    pub fn car_lane(&self) -> usize { self.road.car_lane }

    pub fn obstacles(&self) -> &[Obstacle] { &self.road.obstacles }

    pub fn step_count(&self) -> usize { self.step_count }

    pub fn done(&self) -> bool { self.done }

    fn spawn(&mut self) {
        let spawn_line = self.param.horizon - self.param.min_gap;
        let too_close = self.road.obstacles.iter().any(|ob| ob.y > spawn_line);
        if !too_close && self.rng.gen::<f32>() < self.param.spawn_prob {
            let lane = self.rng.gen_range(0..LANES);
            log::trace!("spawn obstacle in lane {} at step {}", lane, self.step_count);
            self.road.obstacles.push(Obstacle {
                lane,
                y: self.param.horizon,
            });
        }
    }

    #[cfg(test)]
    pub(crate) fn with_road(
        param: LaneParameter,
        car_lane: usize,
        obstacles: Vec<Obstacle>,
    ) -> Self {
        let mut env = Self::new(param).unwrap();
        env.road.car_lane = car_lane;
        env.road.obstacles = obstacles;
        env
    }
}

impl Environment for LaneEnvironment {
    type S = DiscreteState;
    type A = LaneAction;
    type Info = StepInfo;

    fn reset(&mut self) -> Self::S {
        self.road = Road::new(self.param.horizon);
        self.step_count = 0;
        self.done = false;
        self.state()
    }

    fn state(&self) -> Self::S { self.road.discretize() }

    fn step(
        &mut self,
        action: Self::A,
    ) -> (Self::S, f32, bool, Self::Info) {
        self.road.move_car(action);
        self.road.advance_obstacles();
        let crashed = self.road.collision();
        self.spawn();
        self.step_count += 1;

        let reward = if crashed {
            log::trace!("crash in lane {} after {} steps", self.road.car_lane, self.step_count);
            self.done = true;
            REWARD_CRASH
        } else {
            REWARD_SURVIVED
        };

        let info = StepInfo {
            crashed,
            distance: self.step_count,
        };
        (self.state(), reward, self.done, info)
    }
}

impl DebugVisualizer for Road {
    fn one_line_info(&self) -> String {
        format!(
            "Road: car lane {}, {} obstacles, nearest per lane {:?}",
            self.car_lane,
            self.obstacles.len(),
            self.nearest_distances()
        )
    }

    /// North is the horizon, the car drives on the bottom row.
    fn render_to_console(&self) -> Screen {
        let height = self.horizon + 1;
        let mut screen = Screen::new_fill(LANES as u32, height as u32, pixel::pxl(' '));

        for ob in self.obstacles.iter().filter(|ob| ob.y <= self.horizon) {
            screen.set_pxl(ob.lane as i32, self.horizon - ob.y, pixel::pxl('x'));
        }
        let car = if self.collision() { '*' } else { 'A' };
        screen.set_pxl(self.car_lane as i32, self.horizon, pixel::pxl(car));
        screen
    }
}
