//! Retrace targets.
use crate::error::AcerError;
use anyhow::Result;

/// Computes Retrace targets of the action-value.
///
/// Inputs are flattened env-major: `rewards`, `dones`, `q_i` and `rho_i` have
/// `n_envs * n_steps` elements, `values` has `n_envs * (n_steps + 1)`, the last value of
/// each environment being the bootstrap. `q_i` is the action-value of the taken action,
/// `rho_i` the importance ratio of the taken action.
///
/// Going backward from the bootstrap value,
///
/// ```text
/// qret = r[i] + gamma * qret * (1 - done[i])    // target of step i
/// qret = min(1, rho_i[i]) * (qret - q_i[i]) + v[i]
/// ```
///
/// The output is flattened env-major as the inputs.
#[allow(clippy::too_many_arguments)]
pub fn q_retrace(
    rewards: &[f32],
    dones: &[f32],
    q_i: &[f32],
    values: &[f32],
    rho_i: &[f32],
    n_envs: usize,
    n_steps: usize,
    gamma: f32,
) -> Result<Vec<f32>> {
    let n = n_envs * n_steps;
    for (what, len) in [
        ("rewards", rewards.len()),
        ("dones", dones.len()),
        ("q_i", q_i.len()),
        ("rho_i", rho_i.len()),
    ] {
        if len != n {
            return Err(AcerError::shape_mismatch(what, &[n], &[len]).into());
        }
    }
    if values.len() != n_envs * (n_steps + 1) {
        return Err(
            AcerError::shape_mismatch("values", &[n_envs * (n_steps + 1)], &[values.len()]).into(),
        );
    }

    let mut qret = vec![0f32; n];
    for e in 0..n_envs {
        let (b, bv) = (e * n_steps, e * (n_steps + 1));
        let mut q = values[bv + n_steps];
        for i in (0..n_steps).rev() {
            q = rewards[b + i] + gamma * q * (1.0 - dones[b + i]);
            qret[b + i] = q;
            q = rho_i[b + i].min(1.0) * (q - q_i[b + i]) + values[bv + i];
        }
    }

    Ok(qret)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_single_step_with_done() -> Result<()> {
        let qret = q_retrace(&[0.7], &[1.0], &[3.0], &[2.0, 100.0], &[0.5], 1, 1, 0.99)?;
        assert_eq!(qret, vec![0.7]);
        Ok(())
    }

    #[test]
    fn test_three_steps() -> Result<()> {
        let gamma = 0.9f32;
        let rewards = [1.0, 0.0, 2.0];
        let dones = [0.0, 0.0, 0.0];
        let q_i = [0.5, 1.0, 1.5];
        let values = [0.4, 0.8, 1.2, 3.0];
        let rho_i = [2.0, 0.5, 1.0];

        // Step 2: 2 + 0.9 * 3 = 4.7, carried: 1.0 * (4.7 - 1.5) + 1.2 = 4.4
        // Step 1: 0 + 0.9 * 4.4 = 3.96, carried: 0.5 * (3.96 - 1.0) + 0.8 = 2.28
        // Step 0: 1 + 0.9 * 2.28 = 3.052
        let qret = q_retrace(&rewards, &dones, &q_i, &values, &rho_i, 1, 3, gamma)?;
        let expected = [3.052, 3.96, 4.7];
        for (a, b) in qret.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-5, "{} != {}", a, b);
        }
        Ok(())
    }

    #[test]
    fn test_done_cuts_bootstrap_per_env() -> Result<()> {
        // Env 0 ends its episode at the last step, env 1 does not
        let qret = q_retrace(
            &[1.0, 1.0, 1.0, 1.0],
            &[0.0, 1.0, 0.0, 0.0],
            &[0.0; 4],
            &[0.0, 0.0, 10.0, 0.0, 0.0, 10.0],
            &[1.0; 4],
            2,
            2,
            0.5,
        )?;
        assert_eq!(qret, vec![1.5, 1.0, 4.0, 6.0]);
        Ok(())
    }

    #[test]
    fn test_length_mismatch() {
        assert!(q_retrace(&[1.0], &[0.0], &[0.0], &[0.0], &[1.0], 1, 1, 0.9).is_err());
    }
}
