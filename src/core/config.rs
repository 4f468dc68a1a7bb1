use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::types::{Axis, AxisOrder};

#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LastActivation {
    Sigmoid,
    Softmax,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainLoss {
    BinaryCrossentropy,
    CategoricalCrossentropy,
    DiceBce,
    DiceCce,
}

/// U-Net configuration, suitable for JSON config files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UNetConfig {
    /// 2 or 3 spatial dimensions
    pub n_dim: usize,
    /// Network input axes; a missing channel axis is appended
    pub axes: String,
    /// Network output axes when the network drops an input axis
    #[serde(default)]
    pub axes_out: Option<String>,
    pub n_channel_in: usize,
    pub n_channel_out: usize,
    pub unet_n_depth: usize,
    pub unet_kern_size: usize,
    pub unet_n_first: usize,
    pub unet_last_activation: LastActivation,
    /// Probabilistic networks predict two values per output channel
    #[serde(default)]
    pub probabilistic: bool,
    pub patch_size: Vec<usize>,
    pub train_loss: TrainLoss,
    pub train_class_weight: Vec<f32>,
}

impl UNetConfig {
    pub fn new(n_dim: usize, n_channel_in: usize, n_channel_out: usize) -> Result<Self> {
        if !(2..=3).contains(&n_dim) {
            return Err(Error::Config(format!(
                "Invalid number of dimensions: {} (can be 2 or 3)",
                n_dim
            )));
        }
        let single = n_channel_out == 1;
        Ok(Self {
            n_dim,
            axes: if n_dim == 2 { "YX" } else { "ZYX" }.to_string(),
            axes_out: None,
            n_channel_in,
            n_channel_out,
            unet_n_depth: 4,
            unet_kern_size: 3,
            unet_n_first: 32,
            unet_last_activation: if single {
                LastActivation::Sigmoid
            } else {
                LastActivation::Softmax
            },
            probabilistic: false,
            patch_size: vec![128; n_dim],
            train_loss: if single {
                TrainLoss::DiceBce
            } else {
                TrainLoss::DiceCce
            },
            train_class_weight: vec![1.0; if single { 2 } else { n_channel_out }],
        })
    }

    fn normalize_axes(axes: &str, n_dim: usize) -> Result<AxisOrder> {
        let order: AxisOrder = axes
            .parse()
            .map_err(|e| Error::Config(format!("axes '{}': {}", axes, e)))?;
        let order = order.with_appended(Axis::C);
        if order.len() != n_dim + 1 {
            return Err(Error::Config(format!(
                "axes '{}' must have {} spatial axes plus a channel axis",
                axes, n_dim
            )));
        }
        if order.contains(Axis::S) {
            return Err(Error::Config(format!("axes '{}' must not contain 'S'", axes)));
        }
        if !order.contains(Axis::X) || !order.contains(Axis::Y) {
            return Err(Error::Config(format!("axes '{}' must contain X and Y", axes)));
        }
        if order.index_of(Axis::C) != Some(order.len() - 1) {
            return Err(Error::Config(format!(
                "channel axis must be last in '{}'",
                order
            )));
        }
        Ok(order)
    }

    /// Network input axes, channel last.
    pub fn net_axes_in(&self) -> Result<AxisOrder> {
        Self::normalize_axes(&self.axes, self.n_dim)
    }

    /// Network output axes; equal to the input axes unless `axes_out` is set.
    pub fn net_axes_out(&self) -> Result<AxisOrder> {
        match &self.axes_out {
            None => self.net_axes_in(),
            Some(axes) => {
                let order: AxisOrder = axes
                    .parse()
                    .map_err(|e| Error::Config(format!("axes_out '{}': {}", axes, e)))?;
                Ok(order.with_appended(Axis::C))
            }
        }
    }

    /// Channels the network emits.
    pub fn n_channel_predicted(&self) -> usize {
        self.n_channel_out * if self.probabilistic { 2 } else { 1 }
    }

    /// Names of all invalid parameters.
    pub fn invalid_keys(&self) -> Vec<&'static str> {
        let mut invalid = Vec::new();
        if !(2..=3).contains(&self.n_dim) {
            invalid.push("n_dim");
        }
        if self.net_axes_in().is_err() {
            invalid.push("axes");
        }
        if self.axes_out.is_some() && self.net_axes_out().is_err() {
            invalid.push("axes_out");
        }
        if self.n_channel_in < 1 {
            invalid.push("n_channel_in");
        }
        if self.n_channel_out < 1 {
            invalid.push("n_channel_out");
        }
        if self.unet_n_depth < 1 {
            invalid.push("unet_n_depth");
        }
        if self.unet_kern_size < 1 || self.unet_kern_size % 2 == 0 {
            invalid.push("unet_kern_size");
        }
        if self.unet_n_first < 1 {
            invalid.push("unet_n_first");
        }
        if self.patch_size.len() != self.n_dim || self.patch_size.contains(&0) {
            invalid.push("patch_size");
        }
        let single = self.n_channel_out == 1;
        let loss_ok = match self.train_loss {
            TrainLoss::BinaryCrossentropy | TrainLoss::DiceBce => single,
            TrainLoss::CategoricalCrossentropy | TrainLoss::DiceCce => true,
        };
        if !loss_ok {
            invalid.push("train_loss");
        }
        let n_weights = if single { 2 } else { self.n_channel_out };
        if self.train_class_weight.len() != n_weights {
            invalid.push("train_class_weight");
        }
        invalid
    }

    pub fn is_valid(&self) -> bool {
        self.invalid_keys().is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = self.invalid_keys();
        if invalid.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(format!(
                "invalid parameter(s): {}",
                invalid.join(", ")
            )))
        }
    }

    /// Write a commented header followed by pretty JSON.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let mut content = String::new();
        content.push_str("// ==========================================\n");
        content.push_str("// UNETILE network configuration\n");
        content.push_str(&format!("// Version: {}\n", env!("CARGO_PKG_VERSION")));
        content.push_str(&format!("// Generated: {}\n", chrono::Utc::now().to_rfc3339()));
        content.push_str("// ==========================================\n\n");
        content.push_str(&serde_json::to_string_pretty(self)?);
        fs::write(path, content)?;
        info!("Configuration saved to: {:?}", path);
        Ok(())
    }

    /// Read a configuration written by [`save_json`](Self::save_json) or plain JSON.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        // Skip the comment header: JSON starts at the first '{'
        let json_start = content
            .find('{')
            .ok_or_else(|| Error::Config(format!("no JSON content in {:?}", path)))?;
        let config: UNetConfig = serde_json::from_str(&content[json_start..])?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for UNetConfig {
    fn default() -> Self {
        Self {
            n_dim: 2,
            axes: "YX".to_string(),
            axes_out: None,
            n_channel_in: 1,
            n_channel_out: 1,
            unet_n_depth: 4,
            unet_kern_size: 3,
            unet_n_first: 32,
            unet_last_activation: LastActivation::Sigmoid,
            probabilistic: false,
            patch_size: vec![128, 128],
            train_loss: TrainLoss::DiceBce,
            train_class_weight: vec![1.0, 1.0],
        }
    }
}
