//! Utilities.
use anyhow::{anyhow, Result};
use candle_core::{backprop::GradStore, Tensor, Var, WithDType};
use candle_nn::VarMap;
use log::trace;
use ndarray::ArrayD;
use num_traits::AsPrimitive;

/// Interface for handling output dimensions.
pub trait OutDim {
    /// Returns the output dimension.
    fn get_out_dim(&self) -> i64;

    /// Sets the  output dimension.
    fn set_out_dim(&mut self, v: i64);
}

/// Applies polyak averaging on variables.
///
/// Variables are identified by their names.
///
/// shadow = alpha * shadow + (1.0 - alpha) * live
pub fn polyak_update(shadow: &VarMap, live: &VarMap, alpha: f64) -> Result<()> {
    trace!("shadow");
    let shadow = shadow.data().lock().map_err(|e| anyhow!("{}", e))?;
    trace!("live");
    let live = live.data().lock().map_err(|e| anyhow!("{}", e))?;

    for (name, v_shadow) in shadow.iter() {
        let v_live = live
            .get(name)
            .ok_or_else(|| anyhow!("Variable {} not found", name))?;
        let t = ((alpha * v_shadow.as_tensor())? + ((1.0 - alpha) * v_live.as_tensor())?)?;
        v_shadow.set(&t)?;
    }

    Ok(())
}

/// Copies values of the variables in `src` to those in `dest` with the same names.
pub fn copy_params(dest: &VarMap, src: &VarMap) -> Result<()> {
    polyak_update(dest, src, 0.0)
}

/// Returns the global L2 norm of the gradients of the given variables.
///
/// Variables without gradients are skipped.
pub fn global_norm(grads: &GradStore, vars: &[Var]) -> Result<f32> {
    let mut sum = 0f32;
    for var in vars.iter() {
        if let Some(g) = grads.get(var) {
            sum += g.sqr()?.sum_all()?.to_scalar::<f32>()?;
        }
    }
    Ok(sum.sqrt())
}

/// Rescales the gradients so that their global norm does not exceed `max_norm`.
///
/// Returns the global norm before clipping.
pub fn clip_grad_norm(grads: &mut GradStore, vars: &[Var], max_norm: f64) -> Result<f32> {
    let norm = global_norm(grads, vars)?;
    if norm as f64 > max_norm {
        let scale = max_norm / (norm as f64 + 1e-6);
        for var in vars.iter() {
            if let Some(g) = grads.remove(var) {
                grads.insert(var, (g * scale)?);
            }
        }
    }
    Ok(norm)
}

/// Returns the mean over rows of the L2 norm along the last dimension.
pub fn avg_norm(t: &Tensor) -> Result<f32> {
    let rank = t.rank();
    Ok(t.sqr()?
        .sum(rank - 1)?
        .sqrt()?
        .mean_all()?
        .to_scalar::<f32>()?)
}

/// Returns `1 - Var[y - ypred] / Var[y]`.
///
/// The result is `NaN` when `y` is constant.
pub fn explained_variance(ypred: &[f32], y: &[f32]) -> f32 {
    fn var(xs: impl Iterator<Item = f32> + Clone) -> f32 {
        let n = xs.clone().count() as f32;
        let mean = xs.clone().sum::<f32>() / n;
        xs.map(|x| (x - mean).powi(2)).sum::<f32>() / n
    }

    let var_y = var(y.iter().copied());
    if var_y == 0.0 {
        return f32::NAN;
    }
    let var_diff = var(y.iter().zip(ypred.iter()).map(|(a, b)| a - b));
    1.0 - var_diff / var_y
}

/// Converts [`ArrayD`] into [`Tensor`] on CPU.
pub fn arrayd_to_tensor<T1, T2>(a: &ArrayD<T1>, add_batch_dim: bool) -> Result<Tensor>
where
    T1: AsPrimitive<T2>,
    T2: WithDType,
{
    let shape = a.shape();
    let v = a.iter().map(|e| e.as_()).collect::<Vec<T2>>();
    let t = Tensor::from_vec(v, shape, &candle_core::Device::Cpu)?;

    match add_batch_dim {
        true => Ok(t.unsqueeze(0)?),
        false => Ok(t),
    }
}

/// Converts [`Tensor`] into [`ArrayD`].
pub fn tensor_to_arrayd<T>(t: &Tensor, delete_batch_dim: bool) -> Result<ArrayD<T>>
where
    T: WithDType,
{
    let shape = match delete_batch_dim {
        false => t.dims().to_vec(),
        true => t.dims()[1..].to_vec(),
    };
    let v: Vec<T> = t.flatten_all()?.to_vec1()?;

    Ok(ArrayD::from_shape_vec(shape, v)?)
}

#[cfg(test)]
mod test {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::Init;

    fn varmap_with(values: &[f32]) -> Result<VarMap> {
        let vm = VarMap::new();
        let init = Init::Randn {
            mean: 0.0,
            stdev: 1.0,
        };
        vm.get((values.len(),), "var1", init, DType::F32, &Device::Cpu)?;
        let t = Tensor::from_slice(values, (values.len(),), &Device::Cpu)?;
        vm.data().lock().unwrap().get("var1").unwrap().set(&t)?;
        Ok(vm)
    }

    #[test]
    fn test_polyak_update() -> Result<()> {
        let alpha = 0.7;
        let vm_live = varmap_with(&[1.0, 2.0, 3.0])?;
        let vm_shadow = varmap_with(&[4.0, 5.0, 6.0])?;
        polyak_update(&vm_shadow, &vm_live, alpha)?;

        let t = vm_shadow
            .data()
            .lock()
            .unwrap()
            .get("var1")
            .unwrap()
            .as_tensor()
            .to_vec1::<f32>()?;
        let expected = [3.1f32, 4.1, 5.1];
        for (a, b) in t.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-5);
        }

        Ok(())
    }

    #[test]
    fn test_clip_grad_norm() -> Result<()> {
        let var = Var::from_slice(&[3f32, 4.0], (2,), &Device::Cpu)?;
        let loss = var.as_tensor().sum_all()?;
        let mut grads = loss.backward()?;
        let g = Tensor::from_slice(&[3f32, 4.0], (2,), &Device::Cpu)?;
        grads.insert(&var, g);

        let vars = vec![var.clone()];
        let norm = clip_grad_norm(&mut grads, &vars, 1.0)?;
        assert!((norm - 5.0).abs() < 1e-5);
        assert!((global_norm(&grads, &vars)? - 1.0).abs() < 1e-4);

        // Below the threshold, gradients are left as is
        let norm = clip_grad_norm(&mut grads, &vars, 10.0)?;
        assert!((norm - 1.0).abs() < 1e-4);

        Ok(())
    }

    #[test]
    fn test_explained_variance() {
        let y = [1f32, 2.0, 3.0, 4.0];
        assert!((explained_variance(&y, &y) - 1.0).abs() < 1e-6);
        assert!(explained_variance(&[0.0; 4], &[2.0; 4]).is_nan());
        let ypred = [2.5f32; 4];
        assert!(explained_variance(&ypred, &y).abs() < 1e-6);
    }

    #[test]
    fn test_avg_norm() -> Result<()> {
        let t = Tensor::from_slice(&[3f32, 4.0, 0.0, 1.0], (2, 2), &Device::Cpu)?;
        assert!((avg_norm(&t)? - 3.0).abs() < 1e-6);
        Ok(())
    }
}
