use burn::tensor::{backend::Backend, Data, ElementConversion, Int, Shape, Tensor};

/// Right-pad every token list with the padding index to a shared sequence length
pub fn pad_to<B: Backend>(
    pad_token: usize,
    tokens_list: &[Vec<usize>],
    seq_length: usize,
    device: &B::Device,
) -> Tensor<B, 2, Int> {
    let batch_size = tokens_list.len();
    let mut values: Vec<B::IntElem> = Vec::with_capacity(batch_size * seq_length);

    for tokens in tokens_list {
        values.extend(
            tokens
                .iter()
                .take(seq_length)
                .chain(std::iter::repeat(&pad_token))
                .take(seq_length)
                .map(|t| (*t as i64).elem::<B::IntElem>()),
        );
    }

    Tensor::from_data(
        Data::new(values, Shape::new([batch_size, seq_length])),
        device,
    )
}

/// A one-hot float mask over positions, marking the last real token of each row
pub fn last_position_mask<B: Backend>(
    lengths: &[usize],
    seq_length: usize,
    device: &B::Device,
) -> Tensor<B, 2> {
    let batch_size = lengths.len();
    let mut values: Vec<B::FloatElem> = vec![0.0f32.elem(); batch_size * seq_length];

    for (row, length) in lengths.iter().enumerate() {
        let last = (*length).clamp(1, seq_length) - 1;
        values[row * seq_length + last] = 1.0f32.elem();
    }

    Tensor::from_data(
        Data::new(values, Shape::new([batch_size, seq_length])),
        device,
    )
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;
    use pretty_assertions::assert_eq;

    use super::*;

    type TestBackend = NdArray;

    #[test]
    fn pads_short_rows_and_truncates_long_ones() {
        let device = Default::default();
        let tokens = pad_to::<TestBackend>(0, &[vec![5, 6], vec![7, 8, 9, 10]], 3, &device);

        assert_eq!(
            tokens.into_data().convert::<i64>().value,
            vec![5, 6, 0, 7, 8, 9]
        );
    }

    #[test]
    fn marks_the_last_real_position() {
        let device = Default::default();
        let mask = last_position_mask::<TestBackend>(&[2, 3, 0], 3, &device);

        assert_eq!(
            mask.into_data().convert::<f32>().value,
            vec![0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0]
        );
    }
}
