//! Single-layer LSTM over chunk embeddings with a two-class head.

use candle_core::{Tensor, D};
use candle_nn::rnn::LSTMState;
use candle_nn::{linear, lstm, LSTMConfig, Linear, Module, VarBuilder, LSTM, RNN};

/// Number of output classes (negative, positive).
pub const NUM_CLASSES: usize = 2;

/// Reads a speech's chunk embeddings left to right and classifies the
/// hidden state after the last chunk.
pub struct SequenceClassifier {
    lstm: LSTM,
    head: Linear,
    input_dim: usize,
    hidden_size: usize,
}

impl SequenceClassifier {
    pub fn new(vb: VarBuilder, input_dim: usize, hidden_size: usize) -> candle_core::Result<Self> {
        let lstm = lstm(input_dim, hidden_size, LSTMConfig::default(), vb.pp("lstm"))?;
        let head = linear(hidden_size, NUM_CLASSES, vb.pp("head"))?;
        Ok(Self {
            lstm,
            head,
            input_dim,
            hidden_size,
        })
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// Returns class logits `[batch, 2]`.
    ///
    /// # Arguments
    ///
    /// * `inputs` - Padded sequences `[batch, max_len, input_dim]`
    /// * `last_step` - One-hot `[batch, max_len]` marking each sequence's
    ///   final real position; states computed over padding are discarded
    pub fn forward(&self, inputs: &Tensor, last_step: &Tensor) -> candle_core::Result<Tensor> {
        let states: Vec<LSTMState> = self.lstm.seq(inputs)?;
        let hidden: Vec<Tensor> = states.iter().map(|s| s.h().clone()).collect();
        // [batch, max_len, hidden]
        let hidden = Tensor::stack(&hidden, 1)?;

        let last = hidden
            .broadcast_mul(&last_step.unsqueeze(D::Minus1)?)?
            .sum(1)?;
        self.head.forward(&last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    #[test]
    fn test_forward_shape() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let model = SequenceClassifier::new(vb, 4, 6).unwrap();

        let inputs = Tensor::ones((3, 5, 4), DType::F32, &Device::Cpu).unwrap();
        let mut last = vec![0f32; 15];
        last[4] = 1.0;
        last[5 + 1] = 1.0;
        last[10] = 1.0;
        let last = Tensor::from_vec(last, (3, 5), &Device::Cpu).unwrap();

        let logits = model.forward(&inputs, &last).unwrap();
        assert_eq!(logits.dims(), &[3, NUM_CLASSES]);
    }

    #[test]
    fn test_padding_does_not_change_logits() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let model = SequenceClassifier::new(vb, 2, 4).unwrap();

        let short = Tensor::new(&[[[0.5f32, -0.5], [1.0, 0.25]]], &Device::Cpu).unwrap();
        let short_last = Tensor::new(&[[0f32, 1.0]], &Device::Cpu).unwrap();
        let padded = Tensor::new(
            &[[[0.5f32, -0.5], [1.0, 0.25], [0.0, 0.0], [0.0, 0.0]]],
            &Device::Cpu,
        )
        .unwrap();
        let padded_last = Tensor::new(&[[0f32, 1.0, 0.0, 0.0]], &Device::Cpu).unwrap();

        let a: Vec<Vec<f32>> = model
            .forward(&short, &short_last)
            .unwrap()
            .to_vec2()
            .unwrap();
        let b: Vec<Vec<f32>> = model
            .forward(&padded, &padded_last)
            .unwrap()
            .to_vec2()
            .unwrap();
        for (x, y) in a[0].iter().zip(&b[0]) {
            assert!((x - y).abs() < 1e-6);
        }
    }
}
