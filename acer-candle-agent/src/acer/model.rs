use crate::{
    model::SubModel1,
    opt::{Optimizer, OptimizerConfig},
    util::{copy_params, polyak_update},
};
use anyhow::Result;
use candle_core::{backprop::GradStore, DType, Device, Tensor, Var};
use candle_nn::{VarBuilder, VarMap};
use log::trace;

/// Policy/value network of ACER with its polyak-averaged copy.
///
/// The network outputs policy logits and action-values for every action. The averaged
/// copy is built from the same configuration on its own [`VarMap`] and is never updated
/// by the optimizer, only by [`AcerModel::update_polyak`].
pub struct AcerModel<P>
where
    P: SubModel1<Input = Tensor, Output = (Tensor, Tensor)>,
{
    device: Device,
    varmap: VarMap,
    net: P,
    polyak_varmap: VarMap,
    polyak_net: P,
    opt: Optimizer,
}

impl<P> AcerModel<P>
where
    P: SubModel1<Input = Tensor, Output = (Tensor, Tensor)>,
    P::Config: Clone,
{
    /// Constructs [`AcerModel`]. The averaged copy starts from the initial parameters.
    pub fn build(net_config: P::Config, opt_config: OptimizerConfig, device: Device) -> Result<Self> {
        let varmap = VarMap::new();
        let net = P::build(
            VarBuilder::from_varmap(&varmap, DType::F32, &device),
            net_config.clone(),
        )?;
        let polyak_varmap = VarMap::new();
        let polyak_net = P::build(
            VarBuilder::from_varmap(&polyak_varmap, DType::F32, &device),
            net_config,
        )?;
        copy_params(&polyak_varmap, &varmap)?;
        let opt = opt_config.build(varmap.all_vars())?;

        Ok(Self {
            device,
            varmap,
            net,
            polyak_varmap,
            polyak_net,
            opt,
        })
    }
}

impl<P> AcerModel<P>
where
    P: SubModel1<Input = Tensor, Output = (Tensor, Tensor)>,
{
    /// Returns policy logits and action-values of the live network.
    pub fn forward(&self, obs: &Tensor) -> Result<(Tensor, Tensor)> {
        self.net.forward(&obs.to_device(&self.device)?)
    }

    /// Returns policy logits and action-values of the averaged network, detached.
    pub fn forward_polyak(&self, obs: &Tensor) -> Result<(Tensor, Tensor)> {
        let (logits, q) = self.polyak_net.forward(&obs.to_device(&self.device)?)?;
        Ok((logits.detach(), q.detach()))
    }

    /// Variables of the live network.
    pub fn vars(&self) -> Vec<Var> {
        self.varmap.all_vars()
    }

    /// Applies gradients with the given learning rate.
    pub fn step(&mut self, grads: &GradStore, lr: f64) -> Result<()> {
        self.opt.set_learning_rate(lr);
        self.opt.step(grads)
    }

    /// `polyak = alpha * polyak + (1 - alpha) * live`.
    pub fn update_polyak(&mut self, alpha: f64) -> Result<()> {
        trace!("Update polyak average");
        polyak_update(&self.polyak_varmap, &self.varmap, alpha)
    }

    /// Device of the networks.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Parameters of the live network.
    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Parameters of the averaged network.
    pub fn polyak_varmap(&self) -> &VarMap {
        &self.polyak_varmap
    }
}
