//! Embedding vectors as little-endian f32 blobs.

use crate::error::StoreError;

pub fn encode(values: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 4);
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

pub fn decode(blob: &[u8], expected_dim: usize) -> Result<Vec<f32>, StoreError> {
    if blob.len() % 4 != 0 {
        return Err(StoreError::BadVector(format!(
            "blob length {} is not a multiple of 4",
            blob.len()
        )));
    }
    let values: Vec<f32> = blob
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    if values.len() != expected_dim {
        return Err(StoreError::BadVector(format!(
            "expected {expected_dim} dimensions, got {}",
            values.len()
        )));
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let values = vec![0.0f32, 1.5, -2.25, f32::MIN_POSITIVE];
        let blob = encode(&values);
        assert_eq!(blob.len(), 16);
        assert_eq!(decode(&blob, 4).unwrap(), values);
    }

    #[test]
    fn test_truncated_blob_rejected() {
        let blob = encode(&[1.0, 2.0]);
        assert!(matches!(
            decode(&blob[..7], 2),
            Err(StoreError::BadVector(_))
        ));
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let blob = encode(&[1.0, 2.0]);
        assert!(matches!(decode(&blob, 3), Err(StoreError::BadVector(_))));
    }
}
