//! Statistics of completed episodes.
use ndarray::Array2;
use std::collections::VecDeque;

const WINDOW: usize = 40;

/// Tracks lengths and returns of the last 40 completed episodes over all environments.
pub struct EpisodeStats {
    episode_rewards: Vec<Vec<f32>>,
    len_buffer: VecDeque<usize>,
    rew_buffer: VecDeque<f32>,
}

impl EpisodeStats {
    /// Constructs the statistics for `n_envs` environments.
    pub fn new(n_envs: usize) -> Self {
        Self {
            episode_rewards: vec![vec![]; n_envs],
            len_buffer: VecDeque::with_capacity(WINDOW),
            rew_buffer: VecDeque::with_capacity(WINDOW),
        }
    }

    /// Feeds rewards and episode ends of a segment, both `[n_envs, n_steps]`.
    pub fn feed(&mut self, rewards: &Array2<f32>, dones: &Array2<bool>) {
        for (e, episode) in self.episode_rewards.iter_mut().enumerate() {
            for (&r, &done) in rewards.row(e).iter().zip(dones.row(e).iter()) {
                episode.push(r);
                if done {
                    if self.len_buffer.len() == WINDOW {
                        self.len_buffer.pop_front();
                        self.rew_buffer.pop_front();
                    }
                    self.len_buffer.push_back(episode.len());
                    self.rew_buffer.push_back(episode.iter().sum());
                    episode.clear();
                }
            }
        }
    }

    /// Mean length of recent episodes, `0` if no episode has been completed.
    pub fn mean_length(&self) -> f32 {
        if self.len_buffer.is_empty() {
            0.0
        } else {
            self.len_buffer.iter().sum::<usize>() as f32 / self.len_buffer.len() as f32
        }
    }

    /// Mean return of recent episodes, `0` if no episode has been completed.
    pub fn mean_reward(&self) -> f32 {
        if self.rew_buffer.is_empty() {
            0.0
        } else {
            self.rew_buffer.iter().sum::<f32>() / self.rew_buffer.len() as f32
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_episodes_across_segments() {
        let mut stats = EpisodeStats::new(2);
        assert_eq!(stats.mean_length(), 0.0);
        assert_eq!(stats.mean_reward(), 0.0);

        stats.feed(
            &array![[1.0, 2.0, 3.0], [1.0, 1.0, 1.0]],
            &array![[false, true, false], [false, false, false]],
        );
        assert_eq!(stats.mean_length(), 2.0);
        assert_eq!(stats.mean_reward(), 3.0);

        // The second episode of env 0 spans two segments
        stats.feed(
            &array![[4.0, 0.0, 0.0], [1.0, 1.0, 1.0]],
            &array![[true, false, false], [false, false, true]],
        );
        // Lengths [2, 2, 6], returns [3, 7, 6]
        assert!((stats.mean_length() - 10.0 / 3.0).abs() < 1e-6);
        assert!((stats.mean_reward() - 16.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_window() {
        let mut stats = EpisodeStats::new(1);
        stats.feed(&array![[100.0]], &array![[true]]);
        for _ in 0..WINDOW {
            stats.feed(&array![[1.0]], &array![[true]]);
        }
        assert_eq!(stats.mean_reward(), 1.0);
    }
}
