use acer_candle_agent::{
    acer::{Acer, AcerConfig},
    mlp::{Mlp, MlpConfig},
    Device,
};
use acer_core::{
    env::{IdentityEnv, IdentityEnvConfig},
    record::{AggregateRecorder, NullRecorder},
    FrameStack, LrSchedule, VecEnv,
};
use acer_tensorboard::TensorboardRecorder;
use anyhow::Result;
use clap::Parser;
use log::info;
use std::{fs, path::Path};

const N_ENVS: usize = 4;
const DIM: usize = 2;
const N_STEPS: usize = 5;
const NSTACK: usize = 1;
const LR: f64 = 5e-3;
const TOTAL_TIMESTEPS: usize = 10000;
const LOG_INTERVAL: usize = 20;
const N_EVAL_STEPS: usize = 100;
const MODEL_DIR: &str = "./acer/examples/model/acer_identity";

fn env_config() -> IdentityEnvConfig {
    IdentityEnvConfig::default()
        .n_envs(N_ENVS)
        .dim(DIM)
        .ep_length(1)
        .rewards(1.0, -1.0)
}

fn agent_config(args: &Args) -> AcerConfig<MlpConfig> {
    let in_dim = (DIM * NSTACK) as i64;
    AcerConfig::default()
        .net_config(MlpConfig::new(in_dim, vec![32], DIM as _))
        .n_steps(N_STEPS)
        .nstack(NSTACK)
        .learning_rate(LR)
        .lr_schedule(LrSchedule::Constant)
        .replay_ratio(args.replay_ratio)
        .buffer_size(500)
        .replay_start(50)
        .trust_region(!args.no_trust_region)
        .verbose(1)
        .device(Device::Cpu)
}

/// Train ACER agent in the identity environment
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Number of environment steps for training
    #[arg(long, default_value_t = TOTAL_TIMESTEPS)]
    total_timesteps: usize,

    /// Mean number of off-policy steps per on-policy step
    #[arg(long, default_value_t = 0.0)]
    replay_ratio: f64,

    /// Disable the trust region
    #[arg(long, default_value_t = false)]
    no_trust_region: bool,

    /// Random seed
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Write metrics with TensorBoard
    #[arg(short, long, default_value_t = false)]
    tensorboard: bool,
}

fn create_recorder(args: &Args, model_dir: &Path) -> Box<dyn AggregateRecorder> {
    match args.tensorboard {
        true => Box::new(TensorboardRecorder::new(model_dir)),
        false => Box::new(NullRecorder::new()),
    }
}

fn train(args: &Args, model_dir: &Path) -> Result<()> {
    fs::create_dir_all(model_dir)?;
    let env = IdentityEnv::build(&env_config(), args.seed as i64)?;
    let mut agent = Acer::<Mlp>::build(
        agent_config(args),
        env.observation_space(),
        env.action_space(),
        N_ENVS,
    )?;
    let mut recorder = create_recorder(args, model_dir);

    agent.learn(
        env,
        args.total_timesteps,
        Some(args.seed),
        LOG_INTERVAL,
        &mut recorder,
    )?;
    agent.save(model_dir.join("acer.bin"))?;
    agent.config().save(model_dir.join("agent.yaml"))?;

    Ok(())
}

/// Returns the mean reward of the most probable actions.
fn eval(model_dir: &Path, seed: i64) -> Result<f32> {
    let mut agent = Acer::<Mlp>::load(model_dir.join("acer.bin"), Some(Device::Cpu))?;
    let mut env = IdentityEnv::build(&env_config(), seed)?;
    let mut frames = FrameStack::new(N_ENVS, &env.observation_space(), NSTACK);
    frames.update(&env.reset()?, None)?;

    let mut total = 0f32;
    for _ in 0..N_EVAL_STEPS {
        let (actions, _) = agent.predict(frames.stacked(), None, None, true)?;
        let step = env.step(&actions)?;
        total += step.reward.iter().sum::<f32>();
        frames.update(&step.obs, Some(&step.is_done))?;
    }

    Ok(total / (N_EVAL_STEPS * N_ENVS) as f32)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let model_dir = Path::new(MODEL_DIR);

    train(&args, model_dir)?;
    let mean_reward = eval(model_dir, args.seed as i64 + 1)?;
    info!("Mean reward of evaluation: {:.3}", mean_reward);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{eval, train, Args};
    use anyhow::Result;
    use tempdir::TempDir;

    #[test]
    fn test_acer_identity() -> Result<()> {
        let tmp_dir = TempDir::new("acer_identity")?;
        let args = Args {
            total_timesteps: 200,
            replay_ratio: 1.0,
            no_trust_region: false,
            seed: 0,
            tensorboard: true,
        };
        train(&args, tmp_dir.path())?;
        let mean_reward = eval(tmp_dir.path(), 1)?;
        assert!((-1.0..=1.0).contains(&mean_reward));
        Ok(())
    }
}
