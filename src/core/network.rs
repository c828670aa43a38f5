//! Small fully-connected binary classifier.
//!
//! Dense layers with ReLU hidden activations and a single sigmoid output
//! unit, trained with mini-batch Adam on binary cross-entropy. Dropout is
//! applied to a layer's output during training only.

use crate::utils::error::{Result, RiskError};
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Axis, Zip};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Probabilities are clipped to `[EPSILON, 1 - EPSILON]` inside the loss.
const EPSILON: f64 = 1e-7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Relu,
    Sigmoid,
}

impl Activation {
    fn apply(self, z: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::Relu => z.mapv(|v| v.max(0.0)),
            Activation::Sigmoid => z.mapv(sigmoid),
        }
    }

    /// d(activation)/dz evaluated from the pre-activation and activation.
    fn derivative(self, z: &Array2<f64>, a: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::Relu => z.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 }),
            Activation::Sigmoid => a.mapv(|v| v * (1.0 - v)),
        }
    }
}

pub fn sigmoid(v: f64) -> f64 {
    if v >= 0.0 {
        1.0 / (1.0 + (-v).exp())
    } else {
        let e = v.exp();
        e / (1.0 + e)
    }
}

/// Hidden layer description used to build a network.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HiddenLayer {
    pub units: usize,
    #[serde(default)]
    pub dropout: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    /// Shape `(inputs, units)`.
    weights: Array2<f64>,
    bias: Array1<f64>,
    activation: Activation,
    #[serde(default)]
    dropout: f64,
}

impl DenseLayer {
    /// Glorot-uniform weights, zero bias.
    pub fn glorot(
        inputs: usize,
        units: usize,
        activation: Activation,
        dropout: f64,
        rng: &mut StdRng,
    ) -> Self {
        let limit = (6.0 / (inputs + units) as f64).sqrt();
        let weights = Array2::from_shape_fn((inputs, units), |_| rng.gen_range(-limit..limit));
        Self {
            weights,
            bias: Array1::zeros(units),
            activation,
            dropout,
        }
    }

    pub fn from_parts(
        weights: Array2<f64>,
        bias: Array1<f64>,
        activation: Activation,
        dropout: f64,
    ) -> Result<Self> {
        if weights.ncols() != bias.len() {
            return Err(RiskError::TrainingError {
                message: format!(
                    "bias length {} does not match {} units",
                    bias.len(),
                    weights.ncols()
                ),
            });
        }
        check_dropout(dropout)?;
        Ok(Self {
            weights,
            bias,
            activation,
            dropout,
        })
    }

    pub fn inputs(&self) -> usize {
        self.weights.nrows()
    }

    pub fn units(&self) -> usize {
        self.weights.ncols()
    }

    fn pre_activation(&self, input: &Array2<f64>) -> Array2<f64> {
        input.dot(&self.weights) + &self.bias
    }
}

fn check_dropout(dropout: f64) -> Result<()> {
    if !(0.0..1.0).contains(&dropout) {
        return Err(RiskError::TrainingError {
            message: format!("dropout must be within [0, 1), got {}", dropout),
        });
    }
    Ok(())
}

struct LayerCache {
    input: Array2<f64>,
    z: Array2<f64>,
    activated: Array2<f64>,
    mask: Option<Array2<f64>>,
    output: Array2<f64>,
}

struct Gradients {
    weights: Array2<f64>,
    bias: Array1<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitOptions {
    pub epochs: usize,
    pub batch_size: usize,
    pub validation_split: f64,
    pub learning_rate: f64,
    /// Log a progress line every `log_every` epochs (0 disables).
    pub log_every: usize,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            epochs: 100,
            batch_size: 32,
            validation_split: 0.2,
            learning_rate: 0.001,
            log_every: 10,
        }
    }
}

/// Per-epoch training curves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    pub loss: Vec<f64>,
    pub accuracy: Vec<f64>,
    pub val_loss: Vec<f64>,
    pub val_accuracy: Vec<f64>,
}

impl History {
    pub fn epochs(&self) -> usize {
        self.loss.len()
    }
}

struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    step: i32,
    m_weights: Vec<Array2<f64>>,
    v_weights: Vec<Array2<f64>>,
    m_bias: Vec<Array1<f64>>,
    v_bias: Vec<Array1<f64>>,
}

impl Adam {
    fn new(layers: &[DenseLayer], learning_rate: f64) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            step: 0,
            m_weights: layers.iter().map(|l| Array2::zeros(l.weights.raw_dim())).collect(),
            v_weights: layers.iter().map(|l| Array2::zeros(l.weights.raw_dim())).collect(),
            m_bias: layers.iter().map(|l| Array1::zeros(l.bias.len())).collect(),
            v_bias: layers.iter().map(|l| Array1::zeros(l.bias.len())).collect(),
        }
    }

    fn apply(&mut self, layers: &mut [DenseLayer], grads: &[Gradients]) {
        self.step += 1;
        let (b1, b2, lr) = (self.beta1, self.beta2, self.learning_rate);
        let bc1 = 1.0 - b1.powi(self.step);
        let bc2 = 1.0 - b2.powi(self.step);

        for (i, (layer, grad)) in layers.iter_mut().zip(grads).enumerate() {
            self.m_weights[i].zip_mut_with(&grad.weights, |m, &g| *m = b1 * *m + (1.0 - b1) * g);
            self.v_weights[i]
                .zip_mut_with(&grad.weights, |v, &g| *v = b2 * *v + (1.0 - b2) * g * g);
            Zip::from(&mut layer.weights)
                .and(&self.m_weights[i])
                .and(&self.v_weights[i])
                .for_each(|w, &m, &v| *w -= lr * (m / bc1) / ((v / bc2).sqrt() + EPSILON));

            self.m_bias[i].zip_mut_with(&grad.bias, |m, &g| *m = b1 * *m + (1.0 - b1) * g);
            self.v_bias[i].zip_mut_with(&grad.bias, |v, &g| *v = b2 * *v + (1.0 - b2) * g * g);
            Zip::from(&mut layer.bias)
                .and(&self.m_bias[i])
                .and(&self.v_bias[i])
                .for_each(|b, &m, &v| *b -= lr * (m / bc1) / ((v / bc2).sqrt() + EPSILON));
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuralNetwork {
    input_dim: usize,
    layers: Vec<DenseLayer>,
}

impl NeuralNetwork {
    /// Hidden ReLU layers followed by one sigmoid output unit.
    pub fn binary_classifier(
        input_dim: usize,
        hidden: &[HiddenLayer],
        rng: &mut StdRng,
    ) -> Result<Self> {
        if input_dim == 0 {
            return Err(RiskError::TrainingError {
                message: "input dimension must be positive".to_string(),
            });
        }

        let mut layers = Vec::with_capacity(hidden.len() + 1);
        let mut inputs = input_dim;
        for (i, spec) in hidden.iter().enumerate() {
            if spec.units == 0 {
                return Err(RiskError::TrainingError {
                    message: format!("hidden layer {} has zero units", i + 1),
                });
            }
            check_dropout(spec.dropout)?;
            layers.push(DenseLayer::glorot(
                inputs,
                spec.units,
                Activation::Relu,
                spec.dropout,
                rng,
            ));
            inputs = spec.units;
        }
        layers.push(DenseLayer::glorot(inputs, 1, Activation::Sigmoid, 0.0, rng));

        Ok(Self { input_dim, layers })
    }

    pub fn from_layers(layers: Vec<DenseLayer>) -> Result<Self> {
        let input_dim = layers.first().map(|l| l.inputs()).unwrap_or(0);
        let network = Self { input_dim, layers };
        network.check_structure()?;
        Ok(network)
    }

    /// Shape checks for a network that did not come from `binary_classifier`,
    /// e.g. one read back from `model.json`.
    pub fn check_structure(&self) -> Result<()> {
        let first = self.layers.first().ok_or_else(|| RiskError::TrainingError {
            message: "network needs at least one layer".to_string(),
        })?;
        if first.inputs() != self.input_dim {
            return Err(RiskError::TrainingError {
                message: format!(
                    "first layer expects {} inputs but the network declares {}",
                    first.inputs(),
                    self.input_dim
                ),
            });
        }

        for (i, layer) in self.layers.iter().enumerate() {
            if layer.bias.len() != layer.units() {
                return Err(RiskError::TrainingError {
                    message: format!(
                        "layer {} has {} biases for {} units",
                        i + 1,
                        layer.bias.len(),
                        layer.units()
                    ),
                });
            }
        }

        for pair in self.layers.windows(2) {
            if pair[0].units() != pair[1].inputs() {
                return Err(RiskError::TrainingError {
                    message: format!(
                        "layer width mismatch: {} units feed a layer expecting {} inputs",
                        pair[0].units(),
                        pair[1].inputs()
                    ),
                });
            }
        }

        // 只接受單一 sigmoid 輸出
        match self.layers.last() {
            Some(last) if last.units() == 1 && last.activation == Activation::Sigmoid => Ok(()),
            _ => Err(RiskError::TrainingError {
                message: "output layer must be a single sigmoid unit".to_string(),
            }),
        }
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    pub fn layer_widths(&self) -> Vec<usize> {
        self.layers.iter().map(|l| l.units()).collect()
    }

    pub fn parameter_count(&self) -> usize {
        self.layers
            .iter()
            .map(|l| l.weights.len() + l.bias.len())
            .sum()
    }

    /// Layer-by-layer description, one line per layer.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        for (i, layer) in self.layers.iter().enumerate() {
            let mut line = format!(
                "dense_{} ({:?}): {} -> {} ({} params)",
                i + 1,
                layer.activation,
                layer.inputs(),
                layer.units(),
                layer.weights.len() + layer.bias.len()
            );
            if layer.dropout > 0.0 {
                line.push_str(&format!(", dropout {}", layer.dropout));
            }
            lines.push(line);
        }
        lines.push(format!("total params: {}", self.parameter_count()));
        lines.join("\n")
    }

    fn check_input(&self, x: &ArrayView2<f64>) -> Result<()> {
        if x.ncols() != self.input_dim {
            return Err(RiskError::InferenceError {
                message: format!(
                    "network expects {} inputs, got {}",
                    self.input_dim,
                    x.ncols()
                ),
            });
        }
        Ok(())
    }

    /// Sigmoid output for each row (dropout disabled).
    pub fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        self.check_input(&x)?;
        let mut activation = x.to_owned();
        for layer in &self.layers {
            activation = layer.activation.apply(&layer.pre_activation(&activation));
        }
        Ok(activation.column(0).to_owned())
    }

    /// Mean binary cross-entropy and accuracy at a 0.5 threshold.
    pub fn evaluate(&self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<(f64, f64)> {
        let probabilities = self.predict_proba(x)?;
        Ok((
            binary_cross_entropy(probabilities.view(), y),
            accuracy(probabilities.view(), y),
        ))
    }

    fn forward_train(&self, x: Array2<f64>, rng: &mut StdRng) -> Vec<LayerCache> {
        let mut caches: Vec<LayerCache> = Vec::with_capacity(self.layers.len());
        let mut input = x;

        for layer in &self.layers {
            let z = layer.pre_activation(&input);
            let activated = layer.activation.apply(&z);
            let (output, mask) = if layer.dropout > 0.0 {
                let keep = 1.0 - layer.dropout;
                let mask = Array2::from_shape_fn(activated.raw_dim(), |_| {
                    if rng.gen::<f64>() < keep {
                        1.0 / keep
                    } else {
                        0.0
                    }
                });
                (&activated * &mask, Some(mask))
            } else {
                (activated.clone(), None)
            };

            let next = output.clone();
            caches.push(LayerCache {
                input,
                z,
                activated,
                mask,
                output,
            });
            input = next;
        }

        caches
    }

    fn backward(&self, caches: &[LayerCache], y: &Array2<f64>) -> Vec<Gradients> {
        let n = y.nrows() as f64;
        let last = self.layers.len() - 1;
        // sigmoid + 交叉熵：輸出層的 dL/dz = (p - y) / n
        let mut delta = (&caches[last].output - y) / n;
        let mut grads = Vec::with_capacity(self.layers.len());

        for idx in (0..self.layers.len()).rev() {
            let layer = &self.layers[idx];
            let cache = &caches[idx];

            if idx != last {
                if let Some(mask) = &cache.mask {
                    delta = delta * mask;
                }
                delta = delta * &layer.activation.derivative(&cache.z, &cache.activated);
            }

            grads.push(Gradients {
                weights: cache.input.t().dot(&delta),
                bias: delta.sum_axis(Axis(0)),
            });
            delta = delta.dot(&layer.weights.t());
        }

        grads.reverse();
        grads
    }

    /// Mini-batch training. The last `validation_split` share of the rows is
    /// held out for validation and never used for updates.
    pub fn fit(
        &mut self,
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
        options: &FitOptions,
        rng: &mut StdRng,
    ) -> Result<History> {
        self.check_input(&x).map_err(|e| RiskError::TrainingError {
            message: e.to_string(),
        })?;
        if x.nrows() != y.len() {
            return Err(RiskError::TrainingError {
                message: format!("{} rows but {} labels", x.nrows(), y.len()),
            });
        }
        if options.batch_size == 0 || options.epochs == 0 {
            return Err(RiskError::TrainingError {
                message: "epochs and batch_size must be positive".to_string(),
            });
        }

        let split_at = ((x.nrows() as f64) * (1.0 - options.validation_split)).floor() as usize;
        if split_at == 0 {
            return Err(RiskError::TrainingError {
                message: "validation split leaves no training rows".to_string(),
            });
        }
        let (train_x, train_y) = (x.slice(s![..split_at, ..]), y.slice(s![..split_at]));
        let (val_x, val_y) = (x.slice(s![split_at.., ..]), y.slice(s![split_at..]));
        tracing::debug!(
            "Fitting on {} rows, validating on {} rows",
            train_x.nrows(),
            val_x.nrows()
        );

        let mut optimizer = Adam::new(&self.layers, options.learning_rate);
        let mut history = History::default();
        let mut order: Vec<usize> = (0..train_x.nrows()).collect();

        for epoch in 1..=options.epochs {
            order.shuffle(rng);
            let mut loss_sum = 0.0;
            let mut correct = 0.0;

            for batch in order.chunks(options.batch_size) {
                let xb = train_x.select(Axis(0), batch);
                let yb = train_y.select(Axis(0), batch).insert_axis(Axis(1));

                let caches = self.forward_train(xb, rng);
                let output = caches[caches.len() - 1].output.column(0).to_owned();
                let labels = yb.column(0);
                loss_sum += binary_cross_entropy(output.view(), labels) * batch.len() as f64;
                correct += accuracy(output.view(), labels) * batch.len() as f64;

                let grads = self.backward(&caches, &yb);
                optimizer.apply(&mut self.layers, &grads);
            }

            let seen = train_x.nrows() as f64;
            let loss = loss_sum / seen;
            if !loss.is_finite() {
                return Err(RiskError::TrainingError {
                    message: format!("loss diverged at epoch {}", epoch),
                });
            }
            history.loss.push(loss);
            history.accuracy.push(correct / seen);

            if val_x.nrows() > 0 {
                let (val_loss, val_acc) = self.evaluate(val_x, val_y)?;
                history.val_loss.push(val_loss);
                history.val_accuracy.push(val_acc);
            }

            let log_now = options.log_every > 0
                && (epoch % options.log_every == 0 || epoch == options.epochs);
            if log_now {
                tracing::info!(
                    "Epoch {}/{} - loss: {:.4} - accuracy: {:.4}{}",
                    epoch,
                    options.epochs,
                    loss,
                    correct / seen,
                    match (history.val_loss.last(), history.val_accuracy.last()) {
                        (Some(vl), Some(va)) =>
                            format!(" - val_loss: {:.4} - val_accuracy: {:.4}", vl, va),
                        _ => String::new(),
                    }
                );
            }
        }

        Ok(history)
    }
}

pub fn binary_cross_entropy(probabilities: ArrayView1<f64>, labels: ArrayView1<f64>) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let total: f64 = probabilities
        .iter()
        .zip(labels.iter())
        .map(|(&p, &y)| {
            let p = p.clamp(EPSILON, 1.0 - EPSILON);
            -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
        })
        .sum();
    total / labels.len() as f64
}

fn accuracy(probabilities: ArrayView1<f64>, labels: ArrayView1<f64>) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let hits = probabilities
        .iter()
        .zip(labels.iter())
        .filter(|(&p, &y)| (p > 0.5) == (y > 0.5))
        .count();
    hits as f64 / labels.len() as f64
}
