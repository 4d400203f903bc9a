//! Parameters of several variable maps grouped under names.
use anyhow::{anyhow, Result};
use candle_core::{Device, Tensor};
use candle_nn::VarMap;
use log::info;
use std::{collections::HashMap, path::Path};
use tdlearn_core::error::TdlError;

/// Named tensors collected from one or more [`VarMap`]s.
///
/// Each [`VarMap`] is registered under a group name, and its variables are
/// stored with the key `<group>.<variable name>`. This allows the parameters
/// of several networks to be written into a single safetensors file.
pub struct NamedTensors {
    /// Tensors keyed by `<group>.<variable name>`.
    pub named_tensors: HashMap<String, Tensor>,
}

impl NamedTensors {
    /// Copies the current values of the variables in the given groups.
    pub fn copy_from(groups: &[(&str, &VarMap)]) -> Result<Self> {
        let mut named_tensors = HashMap::new();

        for (group, varmap) in groups {
            let data = varmap.data().lock().map_err(|e| anyhow!("{}", e))?;
            for (name, var) in data.iter() {
                let t = var.as_tensor().detach().copy()?;
                named_tensors.insert(format!("{}.{}", group, name), t);
            }
        }

        Ok(Self { named_tensors })
    }

    /// Sets the variables in the given groups to the stored values.
    ///
    /// Every variable must have a stored counterpart; tensors without a
    /// matching variable are ignored.
    pub fn copy_to(&self, groups: &[(&str, &VarMap)]) -> Result<()> {
        for (group, varmap) in groups {
            let data = varmap.data().lock().map_err(|e| anyhow!("{}", e))?;
            for (name, var) in data.iter() {
                let key = format!("{}.{}", group, name);
                let t = self
                    .named_tensors
                    .get(&key)
                    .ok_or(TdlError::MissingTensor(key))?;
                var.set(&t.to_device(var.device())?)?;
            }
        }

        Ok(())
    }

    /// Returns the tensor stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Tensor> {
        self.named_tensors.get(key)
    }

    /// Returns the number of tensors.
    pub fn len(&self) -> usize {
        self.named_tensors.len()
    }

    /// Returns `true` if there are no tensors.
    pub fn is_empty(&self) -> bool {
        self.named_tensors.is_empty()
    }

    /// Writes the tensors to a safetensors file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        candle_core::safetensors::save(&self.named_tensors, path.as_ref())?;
        info!("Save named tensors to {:?}", path.as_ref());
        Ok(())
    }

    /// Reads tensors from a safetensors file onto the given device.
    pub fn load(path: impl AsRef<Path>, device: &Device) -> Result<Self> {
        let named_tensors = candle_core::safetensors::load(path.as_ref(), device)?;
        info!("Load named tensors from {:?}", path.as_ref());
        Ok(Self { named_tensors })
    }
}

impl Clone for NamedTensors {
    fn clone(&self) -> Self {
        Self {
            named_tensors: self.named_tensors.clone(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use candle_core::DType;
    use candle_nn::{linear, Module, VarBuilder};
    use tempdir::TempDir;

    fn model(varmap: &VarMap) -> Result<candle_nn::Linear> {
        let vb = VarBuilder::from_varmap(varmap, DType::F32, &Device::Cpu);
        Ok(linear(3, 2, vb.pp("layer1"))?)
    }

    #[test]
    fn test_named_tensors() -> Result<()> {
        let vm1 = VarMap::new();
        let vm2 = VarMap::new();
        let model1 = model(&vm1)?;
        let model2 = model(&vm2)?;
        let xs = Tensor::new(&[[1f32, 2.0, 3.0]], &Device::Cpu)?;

        let nt = NamedTensors::copy_from(&[("net", &vm1)])?;
        assert_eq!(nt.len(), 2);
        assert!(nt.get("net.layer1.weight").is_some());

        let dir = TempDir::new("named_tensors")?;
        let path = dir.path().join("net.pt");
        nt.save(&path)?;
        NamedTensors::load(&path, &Device::Cpu)?.copy_to(&[("net", &vm2)])?;

        let y1: Vec<Vec<f32>> = model1.forward(&xs)?.to_vec2()?;
        let y2: Vec<Vec<f32>> = model2.forward(&xs)?.to_vec2()?;
        assert_eq!(y1, y2);

        Ok(())
    }

    #[test]
    fn test_missing_group() -> Result<()> {
        let vm = VarMap::new();
        let _ = model(&vm)?;
        let nt = NamedTensors::copy_from(&[("policy", &vm)])?;
        let err = nt.copy_to(&[("value", &vm)]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TdlError>(),
            Some(TdlError::MissingTensor(_))
        ));
        Ok(())
    }
}
