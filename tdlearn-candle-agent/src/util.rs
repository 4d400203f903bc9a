//! Utilities.
use anyhow::{anyhow, Result};
use candle_core::{backprop::GradStore, Tensor, Var};
use candle_nn::VarMap;
use log::trace;
mod named_tensors;
pub use named_tensors::NamedTensors;
use tdlearn_core::error::TdlError;

/// Apply soft update on variables.
///
/// Variables are identified by their names.
///
/// dest = tau * src + (1.0 - tau) * dest
pub fn track(dest: &VarMap, src: &VarMap, tau: f64) -> Result<()> {
    trace!("dest");
    let dest = dest.data().lock().map_err(|e| anyhow!("{}", e))?;
    trace!("src");
    let src = src.data().lock().map_err(|e| anyhow!("{}", e))?;

    for (k_dest, v_dest) in dest.iter() {
        let v_src = src
            .get(k_dest)
            .ok_or_else(|| TdlError::MissingTensor(k_dest.clone()))?;
        let t_src = v_src.as_tensor();
        let t_dest = v_dest.as_tensor();
        let t_dest = ((tau * t_src)? + ((1.0 - tau) * t_dest)?)?;
        v_dest.set(&t_dest)?;
    }

    Ok(())
}

/// Copies the values of all variables in `src` to the variables of the same
/// name in `dest`.
pub fn copy_vars(dest: &VarMap, src: &VarMap) -> Result<()> {
    let dest = dest.data().lock().map_err(|e| anyhow!("{}", e))?;
    let src = src.data().lock().map_err(|e| anyhow!("{}", e))?;

    for (k_dest, v_dest) in dest.iter() {
        let v_src = src
            .get(k_dest)
            .ok_or_else(|| TdlError::MissingTensor(k_dest.clone()))?;
        v_dest.set(v_src.as_tensor())?;
    }

    Ok(())
}

/// Clips the global norm of the gradients of `vars` in place.
///
/// The norm is taken over all gradients as if they were concatenated into a
/// single vector. When it exceeds `max_norm`, every gradient is scaled by
/// `max_norm / (norm + 1e-6)`. Returns the norm before clipping.
pub fn clip_grad_norm(grads: &mut GradStore, vars: &[Var], max_norm: f64) -> Result<f32> {
    let mut sum_sq = 0f32;
    for var in vars {
        if let Some(g) = grads.get(var.as_tensor()) {
            sum_sq += g.sqr()?.sum_all()?.to_scalar::<f32>()?;
        }
    }
    let total_norm = sum_sq.sqrt();

    let clip_coef = max_norm / (total_norm as f64 + 1e-6);
    if clip_coef < 1.0 {
        for var in vars {
            if let Some(g) = grads.remove(var.as_tensor()) {
                grads.insert(var.as_tensor(), (g * clip_coef)?);
            }
        }
    }

    Ok(total_norm)
}

/// Normalizes a 1-dimensional tensor to zero mean and unit variance.
///
/// The standard deviation is the unbiased estimate. A tensor with zero
/// variance, or a single element, yields non-finite values.
pub fn normalize(t: &Tensor) -> Result<Tensor> {
    let n = t.elem_count() as f64;
    let centered = t.broadcast_sub(&t.mean_all()?)?;
    let std = (centered.sqr()?.sum_all()? / (n - 1.0))?.sqrt()?;
    Ok(centered.broadcast_div(&std)?)
}

/// Interface for handling output dimensions.
pub trait OutDim {
    /// Returns the output dimension.
    fn get_out_dim(&self) -> usize;
}
