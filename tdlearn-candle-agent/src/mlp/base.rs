use super::{mlp_forward, Activation, MlpConfig};
use crate::model::SubModel1;
use anyhow::{ensure, Result};
use candle_core::{Device, Tensor};
use candle_nn::{linear, Init, Linear, VarBuilder};

/// Returns vector of linear modules from [`MlpConfig`].
fn create_linear_layers(prefix: &str, vs: VarBuilder, config: &MlpConfig) -> Result<Vec<Linear>> {
    ensure!(!config.units.is_empty(), "MLP needs at least one hidden layer");

    let mut in_out_pairs: Vec<(usize, usize)> = config
        .units
        .windows(2)
        .map(|w| (w[0], w[1]))
        .collect();
    in_out_pairs.insert(0, (config.in_dim, config.units[0]));
    in_out_pairs.push((config.units[config.units.len() - 1], config.out_dim));
    let vs = vs.pp(prefix);
    let n_layers = in_out_pairs.len();

    let mut layers = Vec::with_capacity(n_layers);
    for (i, &(in_dim, out_dim)) in in_out_pairs.iter().enumerate() {
        let vs = vs.pp(format!("ln{}", i));
        let layer = match config.out_init_std {
            Some(stdev) if i == n_layers - 1 => {
                let ws = vs.get_with_hints(
                    (out_dim, in_dim),
                    "weight",
                    Init::Randn { mean: 0.0, stdev },
                )?;
                let bs = vs.get_with_hints(out_dim, "bias", Init::Const(0.0))?;
                Linear::new(ws, Some(bs))
            }
            _ => linear(in_dim, out_dim, vs)?,
        };
        layers.push(layer);
    }

    Ok(layers)
}

/// Multilayer perceptron.
///
/// Hidden layers use the activation of [`MlpConfig`]; the output layer is linear.
pub struct Mlp {
    device: Device,
    layers: Vec<Linear>,
    activation: Activation,
}

impl SubModel1 for Mlp {
    type Config = MlpConfig;
    type Input = Tensor;
    type Output = Tensor;

    fn forward(&self, xs: &Self::Input) -> Result<Tensor> {
        let xs = xs.to_device(&self.device)?;
        Ok(mlp_forward(xs, &self.layers, &self.activation)?)
    }

    fn build(vs: VarBuilder, config: Self::Config) -> Result<Self> {
        let device = vs.device().clone();
        let layers = create_linear_layers("mlp", vs, &config)?;

        Ok(Mlp {
            device,
            layers,
            activation: config.activation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::DType;
    use candle_nn::VarMap;

    #[test]
    fn test_forward_shape() -> Result<()> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let config = MlpConfig::new(4, vec![64, 64], 3).activation(Activation::Tanh);
        let mlp = Mlp::build(vb, config)?;

        let xs = Tensor::zeros((5, 4), DType::F32, &Device::Cpu)?;
        let ys = mlp.forward(&xs)?;
        assert_eq!(ys.dims(), &[5, 3]);

        // three layers with weight and bias each
        assert_eq!(varmap.all_vars().len(), 6);

        Ok(())
    }

    #[test]
    fn test_out_init_std() -> Result<()> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let config = MlpConfig::new(2, vec![8], 1).out_init_std(0.0);
        let mlp = Mlp::build(vb, config)?;

        // zero output weights and bias give a zero output for any input
        let xs = Tensor::new(&[[1f32, -2.0], [0.5, 3.0]], &Device::Cpu)?;
        let ys: Vec<Vec<f32>> = mlp.forward(&xs)?.to_vec2()?;
        assert_eq!(ys, vec![vec![0.0], vec![0.0]]);

        Ok(())
    }

    #[test]
    fn test_empty_units() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        assert!(Mlp::build(vb, MlpConfig::new(2, vec![], 1)).is_err());
    }
}
