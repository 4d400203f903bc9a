//! State value function.
use crate::{
    model::SubModel1,
    opt::{Optimizer, OptimizerConfig},
    util::OutDim,
};
use anyhow::{ensure, Context, Result};
use candle_core::{backprop::GradStore, DType, Device, Tensor, D};
use candle_nn::{VarBuilder, VarMap};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Value`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct ValueConfig<P> {
    /// Configuration of value function network.
    pub value_config: Option<P>,

    /// Configuration of optimizer.
    pub opt_config: OptimizerConfig,
}

impl<P> Default for ValueConfig<P> {
    fn default() -> Self {
        Self {
            value_config: None,
            opt_config: OptimizerConfig::default(),
        }
    }
}

impl<P> ValueConfig<P>
where
    P: DeserializeOwned + Serialize,
{
    /// Sets configurations for value function network.
    pub fn value_config(mut self, v: P) -> Self {
        self.value_config = Some(v);
        self
    }

    /// Sets optimizer configuration.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    /// Loads [`ValueConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`ValueConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// State value function.
///
/// The network is expected to have a single output, which is squeezed so that
/// a batch of observations maps to a vector of values.
pub struct Value<P>
where
    P: SubModel1<Input = Tensor, Output = Tensor>,
{
    varmap: VarMap,
    value: P,
    opt: Optimizer,
}

impl<P> Value<P>
where
    P: SubModel1<Input = Tensor, Output = Tensor>,
    P::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    /// Constructs [`Value`].
    ///
    /// Fails if the output dimension of the network is not 1.
    pub fn build(config: ValueConfig<P::Config>, device: &Device) -> Result<Value<P>> {
        let value_config = config.value_config.context("value_config is not set.")?;
        let out_dim = value_config.get_out_dim();
        ensure!(
            out_dim == 1,
            "Value network must have a single output, got {}",
            out_dim
        );
        let varmap = VarMap::new();
        let value = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, device).set_prefix("value");
            P::build(vb, value_config)?
        };
        let opt = config.opt_config.build(varmap.all_vars())?;

        Ok(Self { varmap, value, opt })
    }

    /// Returns the state-values for a batch of observations, shape `[batch_size]`.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        Ok(self.value.forward(x)?.squeeze(D::Minus1)?)
    }

    /// Applies an optimizer step with precomputed gradients.
    pub fn step(&mut self, grads: &GradStore) -> Result<()> {
        self.opt.step(grads)
    }

    /// Returns the variables of the value network.
    pub fn get_varmap(&self) -> &VarMap {
        &self.varmap
    }
}
