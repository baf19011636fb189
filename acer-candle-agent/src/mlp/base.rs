use super::MlpConfig;
use crate::model::SubModel1;
use anyhow::Result;
use candle_core::{Device, Module, Tensor};
use candle_nn::{linear, Linear, VarBuilder};

/// Returns the hidden layers given in [`MlpConfig`].
fn create_linear_layers(prefix: &str, vs: VarBuilder, config: &MlpConfig) -> Result<Vec<Linear>> {
    let mut dims = vec![config.in_dim];
    dims.extend(config.units.iter().copied());
    let vs = vs.pp(prefix);

    dims.windows(2)
        .enumerate()
        .map(|(i, w)| Ok(linear(w[0] as _, w[1] as _, vs.pp(format!("ln{}", i)))?))
        .collect()
}

/// Multilayer perceptron with ReLU activations and two linear heads.
///
/// Observations are flattened. The output is the pair of policy logits and
/// action-values, both `[batch_size, out_dim]`.
pub struct Mlp {
    device: Device,
    layers: Vec<Linear>,
    head_pi: Linear,
    head_q: Linear,
}

impl SubModel1 for Mlp {
    type Config = MlpConfig;
    type Input = Tensor;
    type Output = (Tensor, Tensor);

    fn forward(&self, xs: &Self::Input) -> Result<Self::Output> {
        let mut xs = xs.to_device(&self.device)?.flatten_from(1)?;
        for layer in self.layers.iter() {
            xs = layer.forward(&xs)?.relu()?;
        }
        let logits = self.head_pi.forward(&xs)?;
        let q = self.head_q.forward(&xs)?;
        Ok((logits, q))
    }

    fn build(vs: VarBuilder, config: Self::Config) -> Result<Self> {
        let device = vs.device().clone();
        let layers = create_linear_layers("mlp", vs.clone(), &config)?;
        let in_dim = *config.units.last().unwrap_or(&config.in_dim);
        let head_pi = linear(in_dim as _, config.out_dim as _, vs.pp("pi"))?;
        let head_q = linear(in_dim as _, config.out_dim as _, vs.pp("q"))?;

        Ok(Self {
            device,
            layers,
            head_pi,
            head_q,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use candle_core::DType;
    use candle_nn::VarMap;

    #[test]
    fn test_output_shapes_and_names() -> Result<()> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let mlp = Mlp::build(vb, MlpConfig::new(6, vec![8, 8], 3))?;

        // 4 observations of shape [2, 3]
        let xs = Tensor::zeros((4, 2, 3), DType::F32, &Device::Cpu)?;
        let (logits, q) = mlp.forward(&xs)?;
        assert_eq!(logits.dims(), &[4, 3]);
        assert_eq!(q.dims(), &[4, 3]);

        let mut names = varmap
            .data()
            .lock()
            .unwrap()
            .keys()
            .cloned()
            .collect::<Vec<_>>();
        names.sort();
        assert_eq!(
            names,
            vec![
                "mlp.ln0.bias",
                "mlp.ln0.weight",
                "mlp.ln1.bias",
                "mlp.ln1.weight",
                "pi.bias",
                "pi.weight",
                "q.bias",
                "q.weight"
            ]
        );
        Ok(())
    }
}
