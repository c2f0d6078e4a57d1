//! Helpers for building the named [`InferTensor`](crate::proto::InferTensor)
//! values the backend's tensor protocol expects, and for clamping the
//! sampling parameters that go out as `float32[1,1]` tensors.

use crate::proto::InferTensor;

pub fn bytes_tensor(name: &str, values: Vec<Vec<u8>>) -> InferTensor {
    InferTensor {
        name: name.to_string(),
        bytes_contents: values,
        ..Default::default()
    }
}

pub fn text_tensor(name: &str, value: &str) -> InferTensor {
    bytes_tensor(name, vec![value.as_bytes().to_vec()])
}

pub fn int_tensor(name: &str, value: i32) -> InferTensor {
    InferTensor {
        name: name.to_string(),
        int_contents: vec![value],
        ..Default::default()
    }
}

pub fn uint64_tensor(name: &str, value: u64) -> InferTensor {
    InferTensor {
        name: name.to_string(),
        uint64_contents: vec![value],
        ..Default::default()
    }
}

pub fn fp32_tensor(name: &str, value: f32) -> InferTensor {
    InferTensor {
        name: name.to_string(),
        fp32_contents: vec![value],
        ..Default::default()
    }
}

pub fn bool_tensor(name: &str, value: bool) -> InferTensor {
    InferTensor {
        name: name.to_string(),
        bool_contents: vec![value],
        ..Default::default()
    }
}

/// Clamps a sampling parameter to `[min, max]`, matching the numeric
/// ranges the backend protocol requires regardless of what the caller
/// sent (`top_p in [0,1]`, `temperature in [0,2]`, penalties in `[-2,2]`).
pub fn clamp(value: f32, min: f32, max: f32) -> f32 {
    value.clamp(min, max)
}

pub fn clamp_top_p(value: f32) -> f32 {
    clamp(value, 0.0, 1.0)
}

pub fn clamp_temperature(value: f32) -> f32 {
    clamp(value, 0.0, 2.0)
}

pub fn clamp_penalty(value: f32) -> f32 {
    clamp(value, -2.0, 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_p_clamps_into_unit_interval() {
        assert_eq!(clamp_top_p(-0.5), 0.0);
        assert_eq!(clamp_top_p(1.5), 1.0);
        assert_eq!(clamp_top_p(0.7), 0.7);
    }

    #[test]
    fn temperature_clamps_to_zero_two() {
        assert_eq!(clamp_temperature(-1.0), 0.0);
        assert_eq!(clamp_temperature(5.0), 2.0);
    }

    #[test]
    fn penalty_clamps_to_minus_two_two() {
        assert_eq!(clamp_penalty(-10.0), -2.0);
        assert_eq!(clamp_penalty(10.0), 2.0);
    }
}
