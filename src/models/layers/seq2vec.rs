use burn::{
    module::Module,
    nn::lstm::{Lstm, LstmConfig},
    tensor::{backend::Backend, Tensor},
};

/// Configuration for a bidirectional LSTM encoder
#[derive(burn::config::Config, Debug)]
pub struct BiLstmEncoderConfig {
    /// Size of each input vector (the embedding dimension)
    pub input_size: usize,

    /// Hidden state size of each direction
    pub hidden_size: usize,

    /// Whether the LSTM gates carry a bias
    #[config(default = true)]
    pub bias: bool,
}

impl BiLstmEncoderConfig {
    /// Initialize both directions
    pub fn init<B: Backend>(&self, device: &B::Device) -> BiLstmEncoder<B> {
        let lstm = LstmConfig::new(self.input_size, self.hidden_size, self.bias);

        BiLstmEncoder {
            forward_lstm: lstm.init(device),
            backward_lstm: lstm.init(device),
        }
    }

    /// Size of the encoded vector: both directions concatenated
    pub fn output_dim(&self) -> usize {
        self.hidden_size * 2
    }
}

/// Reduces a sequence of embeddings to one vector with a bidirectional LSTM
///
/// The backward direction reads every row reversed within its own length, so the final state of
/// both directions sits at the last real token and padding never leaks into the encoding.
#[derive(Module, Debug)]
pub struct BiLstmEncoder<B: Backend> {
    /// Left-to-right LSTM
    pub forward_lstm: Lstm<B>,

    /// Right-to-left LSTM
    pub backward_lstm: Lstm<B>,
}

impl<B: Backend> BiLstmEncoder<B> {
    /// Encode a batch into `[batch_size, 2 * hidden_size]`
    ///
    /// - `embedded`: `[batch_size, seq_length, input_size]`
    /// - `embedded_reversed`: the same rows, each reversed within its length
    /// - `last_mask`: `[batch_size, seq_length]`, one-hot at each row's last real token
    pub fn forward(
        &self,
        embedded: Tensor<B, 3>,
        embedded_reversed: Tensor<B, 3>,
        last_mask: Tensor<B, 2>,
    ) -> Tensor<B, 2> {
        let (_, forward_states) = self.forward_lstm.forward(embedded, None);
        let (_, backward_states) = self.backward_lstm.forward(embedded_reversed, None);

        let forward_final = final_states(forward_states, last_mask.clone());
        let backward_final = final_states(backward_states, last_mask);

        Tensor::cat(vec![forward_final, backward_final], 1)
    }
}

/// Pick the hidden state at each row's last real token
fn final_states<B: Backend>(states: Tensor<B, 3>, last_mask: Tensor<B, 2>) -> Tensor<B, 2> {
    let [batch_size, seq_length, hidden_size] = states.dims();

    let mask = last_mask
        .reshape([batch_size, seq_length, 1])
        .repeat(2, hidden_size);

    states
        .mul(mask)
        .sum_dim(1)
        .reshape([batch_size, hidden_size])
}
