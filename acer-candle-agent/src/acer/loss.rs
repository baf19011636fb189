//! Losses and gradients of ACER.
use crate::util::{avg_norm, explained_variance, global_norm};
use acer_core::{
    q_retrace,
    record::{Record, RecordValue::Scalar},
    TrainBatch,
};
use anyhow::{Context, Result};
use candle_core::{backprop::GradStore, Device, Tensor, Var, D};

const EPS: f64 = 1e-6;

/// Metrics of a gradient step.
#[derive(Debug, Clone, PartialEq)]
pub struct AcerStats {
    /// Total loss.
    pub loss: f32,

    /// Loss of the action-value.
    pub loss_q: f32,

    /// Entropy of the policy.
    pub entropy: f32,

    /// `loss_f + loss_bc`.
    pub loss_policy: f32,

    /// Truncated importance sampling term.
    pub loss_f: f32,

    /// Bias correction term.
    pub loss_bc: f32,

    /// Explained variance of the action-value w.r.t. the Retrace targets.
    pub explained_variance: f32,

    /// Global norm of gradients before clipping.
    pub norm_grads: f32,

    /// Metrics of the trust region, `None` if it is disabled.
    pub trust_region: Option<TrustRegionStats>,
}

/// Metrics of the trust region projection.
#[derive(Debug, Clone, PartialEq)]
pub struct TrustRegionStats {
    /// Global norm of the gradients of the action-value loss.
    pub norm_grads_q: f32,

    /// Global norm of the projected policy gradients.
    pub norm_grads_policy: f32,

    /// Mean norm of the projected gradients w.r.t. the policy, per sample.
    pub avg_norm_grads_f: f32,

    /// Mean norm of the gradients of the KL divergence.
    pub avg_norm_k: f32,

    /// Mean norm of the gradients of the objective.
    pub avg_norm_g: f32,

    /// Mean absolute value of `k . g`.
    pub avg_norm_k_dot_g: f32,

    /// Mean absolute value of the projection coefficient.
    pub avg_norm_adj: f32,
}

impl AcerStats {
    /// Converts the metrics into a [`Record`].
    pub fn to_record(&self) -> Record {
        let mut record = Record::from_slice(&[
            ("loss", Scalar(self.loss)),
            ("loss_q", Scalar(self.loss_q)),
            ("entropy", Scalar(self.entropy)),
            ("loss_policy", Scalar(self.loss_policy)),
            ("loss_f", Scalar(self.loss_f)),
            ("loss_bc", Scalar(self.loss_bc)),
            ("explained_variance", Scalar(self.explained_variance)),
            ("norm_grads", Scalar(self.norm_grads)),
        ]);

        if let Some(tr) = &self.trust_region {
            record.merge_inplace(Record::from_slice(&[
                ("norm_grads_q", Scalar(tr.norm_grads_q)),
                ("norm_grads_policy", Scalar(tr.norm_grads_policy)),
                ("avg_norm_grads_f", Scalar(tr.avg_norm_grads_f)),
                ("avg_norm_k", Scalar(tr.avg_norm_k)),
                ("avg_norm_g", Scalar(tr.avg_norm_g)),
                ("avg_norm_k_dot_g", Scalar(tr.avg_norm_k_dot_g)),
                ("avg_norm_adj", Scalar(tr.avg_norm_adj)),
            ]));
        }

        record
    }
}

/// Hyperparameters of the losses.
#[derive(Debug, Clone)]
pub(super) struct LossConfig {
    pub gamma: f32,
    pub q_coef: f64,
    pub ent_coef: f64,
    pub correction_term: f64,
    pub delta: f64,
}

/// Removes the last (bootstrap) step of every environment.
///
/// `t` is `[n_envs * (n_steps + 1), ...]`, the output `[n_envs * n_steps, ...]`.
fn strip(t: &Tensor, n_envs: usize, n_steps: usize) -> Result<Tensor> {
    let rest = t.dims()[1..].to_vec();
    let mut shape = vec![n_envs, n_steps + 1];
    shape.extend_from_slice(&rest);
    let t = t.reshape(shape)?.narrow(1, 0, n_steps)?.contiguous()?;
    let mut shape = vec![n_envs * n_steps];
    shape.extend_from_slice(&rest);
    Ok(t.reshape(shape)?)
}

/// Policy losses as functions of the policy `f`, `[n, n_actions]`.
struct PolicyLoss {
    loss_f: Tensor,
    loss_bc: Tensor,
    entropy: Tensor,
}

/// Coefficients of the policy losses, constant w.r.t. parameters.
struct PolicyCoefs {
    actions: Tensor,
    // adv * min(c, rho_i), [n]
    coef_f: Tensor,
    // (q - v) * relu(1 - c / rho) * f, [n, n_actions]
    coef_bc: Tensor,
}

impl PolicyCoefs {
    fn policy_loss(&self, f: &Tensor) -> Result<PolicyLoss> {
        let log_f = (f + EPS)?.log()?;
        let log_f_i = log_f.gather(&self.actions, 1)?.squeeze(1)?;
        let loss_f = (log_f_i * &self.coef_f)?.mean_all()?.neg()?;
        let loss_bc = (&log_f * &self.coef_bc)?.sum(1)?.mean_all()?.neg()?;
        let entropy = (f * &log_f)?.sum(1)?.mean_all()?.neg()?;
        Ok(PolicyLoss {
            loss_f,
            loss_bc,
            entropy,
        })
    }
}

/// Losses of a batch, still connected to the parameters.
pub(super) struct AcerLoss {
    n: usize,
    f: Tensor,
    coefs: PolicyCoefs,
    policy: PolicyLoss,
    loss_q: Tensor,
    loss: Tensor,
    explained_variance: f32,
}

impl AcerLoss {
    /// Computes losses given policy probabilities `f_all` and action-values `q_all` of
    /// the live network, both `[n_envs * (n_steps + 1), n_actions]`.
    pub fn new(f_all: &Tensor, q_all: &Tensor, batch: &TrainBatch, config: &LossConfig) -> Result<Self> {
        let device = f_all.device();
        let (n_envs, n_steps) = (batch.n_envs, batch.n_steps);
        let n = n_envs * n_steps;
        let c = config.correction_term;

        let v_all = (f_all * q_all)?.sum(1)?.detach();
        let f = strip(f_all, n_envs, n_steps)?;
        let q = strip(q_all, n_envs, n_steps)?;
        let v = strip(&v_all, n_envs, n_steps)?;

        let actions = {
            let a = batch.actions.iter().map(|&a| a as u32).collect::<Vec<_>>();
            Tensor::from_vec(a, (n, 1), device)?
        };
        let mus = {
            let mus = batch.mus.iter().copied().collect::<Vec<_>>();
            Tensor::from_vec(mus, batch.mus.dim(), device)?
        };
        let rho = (f.detach() / (mus + EPS)?)?;
        let rho_i = rho.gather(&actions, 1)?.squeeze(1)?;
        let q_i = q.gather(&actions, 1)?.squeeze(1)?;

        let q_i_vec = q_i.to_vec1::<f32>()?;
        let qret = q_retrace(
            &batch.rewards,
            &batch.dones,
            &q_i_vec,
            &v_all.to_vec1::<f32>()?,
            &rho_i.to_vec1::<f32>()?,
            n_envs,
            n_steps,
            config.gamma,
        )?;
        let explained_variance = explained_variance(&q_i_vec, &qret);
        let qret = Tensor::from_vec(qret, n, device)?;

        let coefs = {
            let adv = (&qret - &v)?;
            let coef_f = (adv * rho_i.clamp(0f32, c as f32)?)?.detach();
            let adv_bc = q.detach().broadcast_sub(&v.unsqueeze(1)?)?;
            let gain_bc = (rho + EPS)?.recip()?.affine(-c, 1.0)?.relu()?;
            let coef_bc = ((adv_bc * gain_bc)? * f.detach())?.detach();
            PolicyCoefs {
                actions,
                coef_f,
                coef_bc,
            }
        };
        let policy = coefs.policy_loss(&f)?;
        let loss_q = ((qret - q_i)?.sqr()? * 0.5)?.mean_all()?;
        let loss = (((&policy.loss_f + &policy.loss_bc)? + (&loss_q * config.q_coef)?)?
            - (&policy.entropy * config.ent_coef)?)?;

        Ok(Self {
            n,
            f,
            coefs,
            policy,
            loss_q,
            loss,
            explained_variance,
        })
    }

    /// Gradients of the total loss.
    pub fn grads(&self) -> Result<GradStore> {
        Ok(self.loss.backward()?)
    }

    /// Gradients with the policy gradient projected into the trust region around the
    /// averaged policy `f_polyak`, `[n_envs * (n_steps + 1), n_actions]`.
    pub fn trust_region_grads(
        &self,
        f_polyak_all: &Tensor,
        batch: &TrainBatch,
        config: &LossConfig,
        vars: &[Var],
    ) -> Result<(GradStore, TrustRegionStats)> {
        let n = self.n as f64;
        let f_det = self.f.detach();
        let f_polyak = strip(f_polyak_all, batch.n_envs, batch.n_steps)?;

        // Gradient of the objective w.r.t. the policy
        let g = {
            let f_leaf = Var::from_tensor(&f_det)?;
            let pl = self.coefs.policy_loss(f_leaf.as_tensor())?;
            let obj = (((pl.loss_f + pl.loss_bc)? - (pl.entropy * config.ent_coef)?)? * -n)?;
            let grads = obj.backward()?;
            grads
                .get(&f_leaf)
                .context("No gradient w.r.t. the policy")?
                .clone()
        };

        // Gradient of the KL divergence from the averaged policy
        let k = (f_polyak / (&f_det + EPS)?)?.neg()?;
        let k_dot_g = (&k * &g)?.sum_keepdim(1)?;
        let adj = ((&k_dot_g - config.delta)? / (k.sqr()?.sum_keepdim(1)? + EPS)?)?.relu()?;
        let grads_f = ((&g - adj.broadcast_mul(&k)?)? * (-1.0 / n))?;

        let grads_policy = (&self.f * grads_f.detach())?.sum_all()?.backward()?;
        let grads_q = (&self.loss_q * config.q_coef)?.backward()?;

        let stats = TrustRegionStats {
            norm_grads_q: global_norm(&grads_q, vars)?,
            norm_grads_policy: global_norm(&grads_policy, vars)?,
            avg_norm_grads_f: avg_norm(&grads_f)? * n as f32,
            avg_norm_k: avg_norm(&k)?,
            avg_norm_g: avg_norm(&g)?,
            avg_norm_k_dot_g: k_dot_g.abs()?.mean_all()?.to_scalar::<f32>()?,
            avg_norm_adj: adj.abs()?.mean_all()?.to_scalar::<f32>()?,
        };

        let mut grads = grads_policy;
        for var in vars.iter() {
            if let Some(g_q) = grads_q.get(var) {
                let g = match grads.remove(var) {
                    Some(g_p) => (g_p + g_q)?,
                    None => g_q.clone(),
                };
                grads.insert(var, g);
            }
        }

        Ok((grads, stats))
    }

    /// Metrics without gradient norms.
    pub fn stats(&self) -> Result<AcerStats> {
        let loss_f = self.policy.loss_f.to_scalar::<f32>()?;
        let loss_bc = self.policy.loss_bc.to_scalar::<f32>()?;
        Ok(AcerStats {
            loss: self.loss.to_scalar::<f32>()?,
            loss_q: self.loss_q.to_scalar::<f32>()?,
            entropy: self.policy.entropy.to_scalar::<f32>()?,
            loss_policy: loss_f + loss_bc,
            loss_f,
            loss_bc,
            explained_variance: self.explained_variance,
            norm_grads: 0.0,
            trust_region: None,
        })
    }
}

/// Action probabilities given policy logits.
pub(super) fn probs(logits: &Tensor) -> Result<Tensor> {
    Ok(candle_nn::ops::softmax(logits, D::Minus1)?)
}

/// Converts observations of a batch into a tensor.
pub(super) fn obs_tensor(batch: &TrainBatch, device: &Device) -> Result<Tensor> {
    let obs = batch.obs.iter().copied().collect::<Vec<_>>();
    Ok(Tensor::from_vec(obs, batch.obs.shape(), device)?)
}
