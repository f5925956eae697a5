use std::fmt::{Display, Formatter};

use anyhow::{ensure, Result};

use ql::learn::ring_buffer::RingBuffer;

pub const DEFAULT_WINDOW: usize = 30;

/// Per-episode training outcomes.
///
/// Four parallel series indexed by episode (distance, total reward, crash flag, epsilon at episode end)
/// plus the crash flags of the most recent `window` episodes.
#[derive(Clone, Debug, PartialEq)]
pub struct Stats {
    distances: Vec<usize>,
    rewards: Vec<f32>,
    crashes: Vec<u8>,
    epsilons: Vec<f32>,
    window: usize,
    recent_crashes: RingBuffer<u8>,
}

impl Stats {
    pub fn new(window: usize) -> Result<Self> {
        ensure!(window > 0, "stats window must be positive");
        Ok(Self {
            distances: vec![],
            rewards: vec![],
            crashes: vec![],
            epsilons: vec![],
            window,
            recent_crashes: RingBuffer::new(window),
        })
    }

    pub fn add_episode(
        &mut self,
        distance: usize,
        total_reward: f32,
        crashed: bool,
        epsilon: f32,
    ) {
        let crash_flag = u8::from(crashed);
        self.distances.push(distance);
        self.rewards.push(total_reward);
        self.crashes.push(crash_flag);
        self.epsilons.push(epsilon);
        self.recent_crashes.add(crash_flag);
    }

    /// Means of all windows of length `w` (clamped to `2..=series.len()`), computed with a running sum.
    /// Empty for less than two points.
    pub fn moving_avg(
        series: &[f32],
        w: usize,
    ) -> Vec<f32> {
        if series.len() < 2 {
            return vec![];
        }
        let w = w.clamp(2, series.len());
        let mut out = Vec::with_capacity(series.len() - w + 1);
        let mut sum = 0.0_f64;
        for (i, v) in series.iter().enumerate() {
            sum += *v as f64;
            if i >= w {
                sum -= series[i - w] as f64;
            }
            if i + 1 >= w {
                out.push((sum / w as f64) as f32);
            }
        }
        out
    }

    /// Share of crashed episodes among the most recent `window` ones; `0.0` without episodes.
    pub fn crash_rate_recent(&self) -> f32 {
        if self.recent_crashes.is_empty() {
            return 0.0;
        }
        let crashes = self.recent_crashes.iter().map(|&c| c as usize).sum::<usize>();
        crashes as f32 / self.recent_crashes.len() as f32
    }

    pub fn distances(&self) -> &[usize] { &self.distances }

    pub fn distances_f32(&self) -> Vec<f32> { self.distances.iter().map(|&d| d as f32).collect() }

    pub fn rewards(&self) -> &[f32] { &self.rewards }

    pub fn crashes(&self) -> &[u8] { &self.crashes }

    pub fn epsilons(&self) -> &[f32] { &self.epsilons }

    pub fn window(&self) -> usize { self.window }

    pub fn episodes(&self) -> usize { self.distances.len() }

    pub fn last_distance(&self) -> usize { self.distances.last().copied().unwrap_or(0) }

    /// `epsilon` is the agent's current exploration rate
    pub fn summary(
        &self,
        avg_window: usize,
        epsilon: f32,
    ) -> StatsSummary {
        StatsSummary {
            episodes: self.episodes(),
            last_distance: self.last_distance(),
            avg_window,
            distance_moving_avg: Self::moving_avg(&self.distances_f32(), avg_window)
                .last()
                .copied()
                .unwrap_or(0.0),
            window: self.window,
            crash_rate_pct: self.crash_rate_recent() * 100.0,
            epsilon,
        }
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            distances: vec![],
            rewards: vec![],
            crashes: vec![],
            epsilons: vec![],
            window: DEFAULT_WINDOW,
            recent_crashes: RingBuffer::new(DEFAULT_WINDOW),
        }
    }
}

/// Headline figures of a training run
#[derive(Clone, Debug, PartialEq)]
pub struct StatsSummary {
    pub episodes: usize,
    pub last_distance: usize,
    pub avg_window: usize,
    pub distance_moving_avg: f32,
    pub window: usize,
    pub crash_rate_pct: f32,
    pub epsilon: f32,
}

impl Display for StatsSummary {
    fn fmt(
        &self,
        f: &mut Formatter<'_>,
    ) -> std::fmt::Result {
        write!(
            f,
            "episodes: {}, last distance: {}, moving avg ({}): {:.1}, crash rate (last {}): {:.1}%, epsilon: {:.3}",
            self.episodes,
            self.last_distance,
            self.avg_window,
            self.distance_moving_avg,
            self.window,
            self.crash_rate_pct,
            self.epsilon
        )
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(vec![1.0, 2.0, 3.0], 2, vec![1.5, 2.5])]
    #[case(vec![5.0], 2, vec![])]
    #[case(vec![], 3, vec![])]
    #[case(vec![1.0, 2.0, 3.0, 4.0], 0, vec![1.5, 2.5, 3.5])]
    #[case(vec![1.0, 2.0, 3.0, 4.0], 10, vec![2.5])]
    #[case(vec![2.0, 4.0, 6.0, 8.0, 10.0], 3, vec![4.0, 6.0, 8.0])]
    fn test_moving_avg(
        #[case] series: Vec<f32>,
        #[case] w: usize,
        #[case] expected: Vec<f32>,
    ) {
        assert_eq!(Stats::moving_avg(&series, w), expected);
    }

    #[test]
    fn test_moving_avg_length() {
        let series = (0..50).map(|i| i as f32).collect::<Vec<_>>();
        assert_eq!(Stats::moving_avg(&series, 20).len(), 50 - 20 + 1);
    }

    #[test]
    fn test_moving_avg_keeps_small_values_next_to_large_ones() {
        // 2^24 + 1 is not representable in f32, an f32 sum would report 0.0 for the second window of ones
        let series = [16_777_216.0, 1.0, 1.0, 1.0];
        assert_eq!(Stats::moving_avg(&series, 2), vec![8_388_608.0, 1.0, 1.0]);
    }

    #[test]
    fn test_add_episode_appends_parallel_series() {
        let mut stats = Stats::default();
        stats.add_episode(14, 4.0, true, 0.99);
        stats.add_episode(3, -8.0, true, 0.98);
        assert_eq!(stats.distances(), &[14, 3]);
        assert_eq!(stats.rewards(), &[4.0, -8.0]);
        assert_eq!(stats.crashes(), &[1, 1]);
        assert_eq!(stats.epsilons(), &[0.99, 0.98]);
        assert_eq!(stats.episodes(), 2);
        assert_eq!(stats.last_distance(), 3);
    }

    #[test]
    fn test_crash_rate_recent_empty() {
        assert_eq!(Stats::default().crash_rate_recent(), 0.0);
    }

    #[test]
    fn test_crash_rate_recent_covers_only_the_window() {
        let mut stats = Stats::new(4).unwrap();
        for _ in 0..4 {
            stats.add_episode(10, 0.0, true, 1.0);
        }
        assert_eq!(stats.crash_rate_recent(), 1.0);

        stats.add_episode(10, 10.0, false, 1.0);
        assert_eq!(stats.crash_rate_recent(), 0.75);
        stats.add_episode(10, 10.0, false, 1.0);
        stats.add_episode(10, 10.0, false, 1.0);
        stats.add_episode(10, 10.0, false, 1.0);
        assert_eq!(stats.crash_rate_recent(), 0.0);
        // the full history is kept
        assert_eq!(stats.crashes().len(), 8);
    }

    #[test]
    fn test_crash_rate_recent_before_window_is_filled() {
        let mut stats = Stats::new(30).unwrap();
        stats.add_episode(1, -10.0, true, 1.0);
        stats.add_episode(1, 1.0, false, 1.0);
        assert_eq!(stats.crash_rate_recent(), 0.5);
    }

    #[test]
    fn test_zero_window_is_rejected() {
        assert!(Stats::new(0).is_err());
    }

    #[test]
    fn test_summary() {
        let mut stats = Stats::default();
        assert_eq!(
            stats.summary(20, 1.0).to_string(),
            "episodes: 0, last distance: 0, moving avg (20): 0.0, crash rate (last 30): 0.0%, epsilon: 1.000"
        );

        stats.add_episode(10, 0.0, true, 0.5);
        stats.add_episode(20, 0.0, true, 0.25);
        let summary = stats.summary(20, 0.25);
        assert_eq!(summary.episodes, 2);
        assert_eq!(summary.last_distance, 20);
        assert_eq!(summary.distance_moving_avg, 15.0);
        assert_eq!(summary.crash_rate_pct, 100.0);
        assert_eq!(
            summary.to_string(),
            "episodes: 2, last distance: 20, moving avg (20): 15.0, crash rate (last 30): 100.0%, epsilon: 0.250"
        );
    }

    #[test]
    fn test_summary_reports_given_epsilon() {
        let mut stats = Stats::default();
        stats.add_episode(10, 0.0, true, 0.5);
        // the last recorded epsilon is history; the summary shows the current one
        assert_eq!(stats.summary(20, 0.125).epsilon, 0.125);
    }
}
