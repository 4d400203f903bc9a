//! Agent.
use anyhow::Result;
use serde::de::DeserializeOwned;
use std::path::Path;

/// Represents a trainable agent.
pub trait Agent {
    /// Set the agent to training mode.
    fn train(&mut self);

    /// Set the agent to evaluation mode.
    fn eval(&mut self);

    /// Return if it is in training mode.
    fn is_train(&self) -> bool;

    /// Save the parameters of the agent in the given directory.
    fn save_params(&self, path: &Path) -> Result<()>;

    /// Load the parameters of the agent from the given directory.
    fn load_params(&mut self, path: &Path) -> Result<()>;
}

/// A configurable object.
pub trait Configurable {
    /// Configuration.
    type Config: Clone + DeserializeOwned;

    /// Builds the object.
    fn build(config: Self::Config) -> Result<Self>
    where
        Self: Sized;

    /// Build the object with the configuration in the yaml file of the given path.
    fn build_from_path(path: impl AsRef<Path>) -> Result<Self>
    where
        Self: Sized,
    {
        let file = std::fs::File::open(path)?;
        let rdr = std::io::BufReader::new(file);
        let config = serde_yaml::from_reader(rdr)?;
        Self::build(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Write;
    use tempdir::TempDir;

    #[derive(Clone, Deserialize)]
    struct CounterConfig {
        start: usize,
    }

    struct Counter(usize);

    impl Configurable for Counter {
        type Config = CounterConfig;

        fn build(config: Self::Config) -> Result<Self> {
            Ok(Counter(config.start))
        }
    }

    #[test]
    fn test_build_from_path() -> Result<()> {
        let dir = TempDir::new("configurable")?;
        let path = dir.path().join("counter.yaml");
        let mut file = std::fs::File::create(&path)?;
        file.write_all(b"start: 7\n")?;

        let counter = Counter::build_from_path(&path)?;
        assert_eq!(counter.0, 7);

        Ok(())
    }
}
