//! Feed-forward value network
//!
//! One hidden layer, sigmoid activations, plain per-sample backpropagation
//! on squared error. Small on purpose: it only nudges the Q-table.

use rand::Rng;
use serde::{Deserialize, Serialize};
use society_events::ACTION_COUNT;

use super::qtable::ActionValues;
use super::state::{Features, FEATURE_COUNT};

pub const HIDDEN_SIZE: usize = 24;
pub const LEARNING_RATE: f32 = 0.01;
const INIT_SCALE: f32 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuralNetwork {
    /// `FEATURE_COUNT x HIDDEN_SIZE`, row-major by input
    weights_ih: Vec<f32>,
    /// `HIDDEN_SIZE x ACTION_COUNT`, row-major by hidden unit
    weights_ho: Vec<f32>,
    bias_h: Vec<f32>,
    bias_o: Vec<f32>,
    pub learning_rate: f32,
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

impl NeuralNetwork {
    pub fn new_random<R: Rng>(rng: &mut R) -> Self {
        let mut init = |n: usize| -> Vec<f32> {
            (0..n).map(|_| rng.gen_range(-INIT_SCALE..INIT_SCALE)).collect()
        };
        Self {
            weights_ih: init(FEATURE_COUNT * HIDDEN_SIZE),
            weights_ho: init(HIDDEN_SIZE * ACTION_COUNT),
            bias_h: vec![0.0; HIDDEN_SIZE],
            bias_o: vec![0.0; ACTION_COUNT],
            learning_rate: LEARNING_RATE,
        }
    }

    pub fn is_well_formed(&self) -> bool {
        self.weights_ih.len() == FEATURE_COUNT * HIDDEN_SIZE
            && self.weights_ho.len() == HIDDEN_SIZE * ACTION_COUNT
            && self.bias_h.len() == HIDDEN_SIZE
            && self.bias_o.len() == ACTION_COUNT
            && self
                .weights_ih
                .iter()
                .chain(&self.weights_ho)
                .chain(&self.bias_h)
                .chain(&self.bias_o)
                .all(|w| w.is_finite())
    }

    fn hidden(&self, input: &Features) -> [f32; HIDDEN_SIZE] {
        let mut hidden = [0.0; HIDDEN_SIZE];
        for (j, h) in hidden.iter_mut().enumerate() {
            let mut sum = self.bias_h[j];
            for (i, x) in input.iter().enumerate() {
                sum += x * self.weights_ih[i * HIDDEN_SIZE + j];
            }
            *h = sigmoid(sum);
        }
        hidden
    }

    fn output(&self, hidden: &[f32; HIDDEN_SIZE]) -> ActionValues {
        let mut out = [0.0; ACTION_COUNT];
        for (k, o) in out.iter_mut().enumerate() {
            let mut sum = self.bias_o[k];
            for (j, h) in hidden.iter().enumerate() {
                sum += h * self.weights_ho[j * ACTION_COUNT + k];
            }
            *o = sigmoid(sum);
        }
        out
    }

    pub fn forward(&self, input: &Features) -> ActionValues {
        self.output(&self.hidden(input))
    }

    /// One gradient step toward `target`.
    pub fn train(&mut self, input: &Features, target: &ActionValues) {
        let hidden = self.hidden(input);
        let out = self.output(&hidden);
        let lr = self.learning_rate;

        let mut out_delta = [0.0; ACTION_COUNT];
        for k in 0..ACTION_COUNT {
            out_delta[k] = (target[k] - out[k]) * out[k] * (1.0 - out[k]);
        }

        let mut hidden_delta = [0.0; HIDDEN_SIZE];
        for j in 0..HIDDEN_SIZE {
            let err: f32 = (0..ACTION_COUNT)
                .map(|k| out_delta[k] * self.weights_ho[j * ACTION_COUNT + k])
                .sum();
            hidden_delta[j] = err * hidden[j] * (1.0 - hidden[j]);
        }

        for j in 0..HIDDEN_SIZE {
            for k in 0..ACTION_COUNT {
                self.weights_ho[j * ACTION_COUNT + k] += lr * hidden[j] * out_delta[k];
            }
        }
        for k in 0..ACTION_COUNT {
            self.bias_o[k] += lr * out_delta[k];
        }
        for i in 0..FEATURE_COUNT {
            if input[i] == 0.0 {
                continue;
            }
            for j in 0..HIDDEN_SIZE {
                self.weights_ih[i * HIDDEN_SIZE + j] += lr * input[i] * hidden_delta[j];
            }
        }
        for j in 0..HIDDEN_SIZE {
            self.bias_h[j] += lr * hidden_delta[j];
        }
    }

    pub fn copy_from(&mut self, other: &NeuralNetwork) {
        self.weights_ih.clone_from(&other.weights_ih);
        self.weights_ho.clone_from(&other.weights_ho);
        self.bias_h.clone_from(&other.bias_h);
        self.bias_o.clone_from(&other.bias_o);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn input() -> Features {
        let mut f = [0.0; FEATURE_COUNT];
        f[0] = 1.0;
        f[5] = 1.0;
        f[18] = 1.0;
        f
    }

    #[test]
    fn test_outputs_are_sigmoid_bounded() {
        let mut rng = SmallRng::seed_from_u64(1);
        let net = NeuralNetwork::new_random(&mut rng);
        assert!(net.is_well_formed());
        for v in net.forward(&input()) {
            assert!(v > 0.0 && v < 1.0);
        }
    }

    #[test]
    fn test_training_reduces_error() {
        let mut rng = SmallRng::seed_from_u64(2);
        let mut net = NeuralNetwork::new_random(&mut rng);
        net.learning_rate = 0.5;
        let mut target = [0.2; ACTION_COUNT];
        target[3] = 0.9;

        let error = |net: &NeuralNetwork| -> f32 {
            net.forward(&input())
                .iter()
                .zip(&target)
                .map(|(o, t)| (o - t).powi(2))
                .sum()
        };
        let before = error(&net);
        for _ in 0..200 {
            net.train(&input(), &target);
        }
        assert!(error(&net) < before * 0.5);
    }

    #[test]
    fn test_copy_from() {
        let mut rng = SmallRng::seed_from_u64(3);
        let a = NeuralNetwork::new_random(&mut rng);
        let mut b = NeuralNetwork::new_random(&mut rng);
        assert_ne!(a.forward(&input()), b.forward(&input()));
        b.copy_from(&a);
        assert_eq!(a.forward(&input()), b.forward(&input()));
    }
}
