use acer::{
    acer_candle_agent::{
        acer::{Acer, AcerConfig},
        mlp::{Mlp, MlpConfig},
        Device,
    },
    acer_core::{
        env::{IdentityEnv, IdentityEnvConfig},
        record::{AggregateRecorder, BufferedRecorder},
        LrSchedule, VecEnv,
    },
};
use anyhow::Result;
use std::{cell::RefCell, rc::Rc};

const N_ENVS: usize = 4;

struct SharedRecorder(Rc<RefCell<BufferedRecorder>>);

impl AggregateRecorder for SharedRecorder {
    fn store(&mut self, record: acer::acer_core::record::Record) {
        self.0.borrow_mut().store(record);
    }

    fn flush(&mut self, step: i64) {
        self.0.borrow_mut().flush(step);
    }
}

fn env_config() -> IdentityEnvConfig {
    IdentityEnvConfig::default()
        .n_envs(N_ENVS)
        .dim(2)
        .ep_length(1)
        .rewards(1.0, -1.0)
}

#[test]
fn test_acer_identity_converges() -> Result<()> {
    let env = IdentityEnv::build(&env_config(), 0)?;
    let config = AcerConfig::default()
        .net_config(MlpConfig::new(2, vec![32], 2))
        .n_steps(5)
        .nstack(1)
        .learning_rate(5e-3)
        .lr_schedule(LrSchedule::Constant)
        .replay_ratio(0.0)
        .verbose(1)
        .device(Device::Cpu);
    let mut agent =
        Acer::<Mlp>::build(config, env.observation_space(), env.action_space(), N_ENVS)?;

    let buffered = Rc::new(RefCell::new(BufferedRecorder::new()));
    let mut recorder: Box<dyn AggregateRecorder> = Box::new(SharedRecorder(buffered.clone()));
    agent.learn(env, 2000, Some(0), 10, &mut recorder)?;

    // 100 updates, logged every 10 updates
    assert_eq!(buffered.borrow().len(), 10);
    assert_eq!(agent.n_opts(), 100);

    // Held-out steps with the most probable actions
    let mut env = IdentityEnv::build(&env_config(), 1)?;
    let mut obs = env.reset()?;
    let mut total = 0f32;
    for _ in 0..100 {
        let (actions, _) = agent.predict(&obs, None, None, true)?;
        let step = env.step(&actions)?;
        total += step.reward.iter().sum::<f32>();
        obs = step.obs;
    }
    let mean_reward = total / (100 * N_ENVS) as f32;
    assert!(mean_reward > 0.5, "mean reward = {}", mean_reward);

    Ok(())
}
