use burn::{
    module::Module,
    nn::{Dropout, DropoutConfig, Linear, LinearConfig},
    tensor::{activation::relu, backend::Backend, Tensor},
};

/// Configuration for a stack of linear layers
#[derive(burn::config::Config, Debug)]
pub struct FeedForwardConfig {
    /// Size of the input vector
    pub input_dim: usize,

    /// Output size of each layer, the last one being the number of classes
    pub hidden_dims: Vec<usize>,

    /// Dropout applied after every hidden activation
    #[config(default = 0.2)]
    pub dropout: f64,
}

impl FeedForwardConfig {
    /// Initialize the layers
    pub fn init<B: Backend>(&self, device: &B::Device) -> FeedForward<B> {
        let inputs = std::iter::once(self.input_dim).chain(self.hidden_dims.iter().copied());

        let layers = inputs
            .zip(self.hidden_dims.iter().copied())
            .map(|(d_input, d_output)| LinearConfig::new(d_input, d_output).init(device))
            .collect();

        FeedForward {
            layers,
            dropout: DropoutConfig::new(self.dropout).init(),
        }
    }
}

/// Linear layers with ReLU and dropout between them; the last layer's output is left as logits
#[derive(Module, Debug)]
pub struct FeedForward<B: Backend> {
    /// The linear layers, in order
    pub layers: Vec<Linear<B>>,

    /// Dropout between layers
    pub dropout: Dropout,
}

impl<B: Backend> FeedForward<B> {
    /// Run every layer
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let last = self.layers.len().saturating_sub(1);

        self.layers
            .iter()
            .enumerate()
            .fold(input, |x, (i, layer)| {
                let x = layer.forward(x);

                if i < last {
                    self.dropout.forward(relu(x))
                } else {
                    x
                }
            })
    }
}
