//! Feed-forward network inference.
//!
//! Models are read from the lwtnn "sequential" JSON layout:
//!
//! ```json
//! {
//!   "inputs":  [{"name": "pt_1", "offset": -40.0, "scale": 0.05}, ...],
//!   "layers":  [{"architecture": "dense", "activation": "rectified",
//!                "weights": [...], "bias": [...]}, ...],
//!   "outputs": ["ggh", "qqh", "ztt", ...]
//! }
//! ```
//!
//! Dense weights are stored flat and row-major with shape `(n_out, n_in)`.
//! Inputs are normalised as `(x + offset) * scale` before the first layer.

use serde::Deserialize;

use crate::error::{Error, KernelError, Result};

/// An inference engine with named inputs and labelled outputs.
pub trait Inference: Send + Sync {
    /// Input variable names, in the order `evaluate` expects them.
    fn input_names(&self) -> &[String];
    fn output_labels(&self) -> &[String];
    fn evaluate(&self, inputs: &[f64]) -> std::result::Result<Vec<f64>, KernelError>;

    /// [`Inference::evaluate`], failing unless there is one value per output label.
    fn evaluate_labelled(&self, inputs: &[f64]) -> std::result::Result<Vec<f64>, KernelError> {
        let outputs = self.evaluate(inputs)?;
        if outputs.len() != self.output_labels().len() {
            return Err(KernelError::new(format!(
                "network returned {} values for {} output labels",
                outputs.len(),
                self.output_labels().len()
            )));
        }
        Ok(outputs)
    }

    /// Position of an output label.
    fn output_index(&self, label: &str) -> Option<usize> {
        self.output_labels().iter().position(|l| l == label)
    }
}

/// For every network input, its position in `available`.
pub fn resolve_inputs<S: AsRef<str>>(network: &dyn Inference, available: &[S]) -> Result<Vec<usize>> {
    network
        .input_names()
        .iter()
        .map(|name| {
            available
                .iter()
                .position(|a| a.as_ref() == name)
                .ok_or_else(|| Error::Config(format!("network input '{name}' cannot be provided")))
        })
        .collect()
}

/// Output positions of the required labels.
pub fn resolve_outputs(network: &dyn Inference, labels: &[&str]) -> Result<Vec<usize>> {
    labels
        .iter()
        .map(|label| {
            network
                .output_index(label)
                .ok_or_else(|| Error::Config(format!("network has no output '{label}'")))
        })
        .collect()
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Linear,
    Rectified,
    Sigmoid,
    Tanh,
    Softmax,
}

impl Activation {
    fn apply(&self, values: &mut [f64]) {
        match self {
            Activation::Linear => {}
            Activation::Rectified => values.iter_mut().for_each(|v| *v = v.max(0.0)),
            Activation::Sigmoid => values
                .iter_mut()
                .for_each(|v| *v = 1.0 / (1.0 + (-*v).exp())),
            Activation::Tanh => values.iter_mut().for_each(|v| *v = v.tanh()),
            Activation::Softmax => {
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let mut total = 0.0;
                for v in values.iter_mut() {
                    *v = (*v - max).exp();
                    total += *v;
                }
                values.iter_mut().for_each(|v| *v /= total);
            }
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct InputVariable {
    pub name: String,
    #[serde(default)]
    pub offset: f64,
    #[serde(default = "unit_scale")]
    pub scale: f64,
}

fn unit_scale() -> f64 {
    1.0
}

#[derive(Clone, Debug, Deserialize)]
struct LayerFile {
    architecture: String,
    activation: Activation,
    weights: Vec<f64>,
    bias: Vec<f64>,
}

#[derive(Clone, Debug, Deserialize)]
struct NetworkFile {
    inputs: Vec<InputVariable>,
    layers: Vec<LayerFile>,
    outputs: Vec<String>,
}

#[derive(Clone, Debug)]
struct DenseLayer {
    n_in: usize,
    weights: Vec<f64>,
    bias: Vec<f64>,
    activation: Activation,
}

impl DenseLayer {
    fn forward(&self, input: &[f64]) -> Vec<f64> {
        let mut out: Vec<f64> = self
            .bias
            .iter()
            .enumerate()
            .map(|(o, b)| {
                let row = &self.weights[o * self.n_in..(o + 1) * self.n_in];
                b + row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>()
            })
            .collect();
        self.activation.apply(&mut out);
        out
    }
}

/// Dense feed-forward network.
#[derive(Clone, Debug)]
pub struct DenseNetwork {
    inputs: Vec<InputVariable>,
    input_names: Vec<String>,
    layers: Vec<DenseLayer>,
    outputs: Vec<String>,
}

impl DenseNetwork {
    pub fn from_json(text: &str) -> Result<Self> {
        let file: NetworkFile = serde_json::from_str(text)?;
        Self::build(file)
    }

    fn build(file: NetworkFile) -> Result<Self> {
        if file.inputs.is_empty() {
            return Err(Error::Config("network declares no inputs".into()));
        }
        let mut width = file.inputs.len();
        let mut layers = Vec::with_capacity(file.layers.len());
        for (i, layer) in file.layers.into_iter().enumerate() {
            if layer.architecture != "dense" {
                return Err(Error::Config(format!(
                    "layer {i}: unsupported architecture '{}'",
                    layer.architecture
                )));
            }
            let n_out = layer.bias.len();
            if n_out == 0 || layer.weights.len() != n_out * width {
                return Err(Error::Config(format!(
                    "layer {i}: expected {} weights for {n_out} outputs and {width} inputs, found {}",
                    n_out * width,
                    layer.weights.len()
                )));
            }
            layers.push(DenseLayer {
                n_in: width,
                weights: layer.weights,
                bias: layer.bias,
                activation: layer.activation,
            });
            width = n_out;
        }
        if width != file.outputs.len() {
            return Err(Error::Config(format!(
                "network produces {width} values but declares {} output labels",
                file.outputs.len()
            )));
        }
        let input_names = file.inputs.iter().map(|v| v.name.clone()).collect();
        Ok(Self {
            inputs: file.inputs,
            input_names,
            layers,
            outputs: file.outputs,
        })
    }
}

impl Inference for DenseNetwork {
    fn input_names(&self) -> &[String] {
        &self.input_names
    }

    fn output_labels(&self) -> &[String] {
        &self.outputs
    }

    fn evaluate(&self, inputs: &[f64]) -> std::result::Result<Vec<f64>, KernelError> {
        if inputs.len() != self.inputs.len() {
            return Err(KernelError::new(format!(
                "network expects {} inputs, got {}",
                self.inputs.len(),
                inputs.len()
            )));
        }
        let mut values: Vec<f64> = inputs
            .iter()
            .zip(&self.inputs)
            .map(|(x, var)| (x + var.offset) * var.scale)
            .collect();
        for layer in &self.layers {
            values = layer.forward(&values);
        }
        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            return Err(KernelError::new(format!(
                "non-finite network output '{}'",
                self.outputs[i]
            )));
        }
        Ok(values)
    }
}
