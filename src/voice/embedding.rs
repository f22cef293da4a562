//! Embedding arithmetic and the on-disk vector encoding

use super::{VoiceError, VoiceResult};

/// Cosine similarity between two embeddings.
///
/// Embeddings are not assumed to be unit length; the division by both norms
/// does the normalization. Mismatched lengths and zero vectors cannot be
/// compared and are reported as extraction failures.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> VoiceResult<f32> {
    if a.len() != b.len() {
        return Err(VoiceError::Extraction(format!(
            "Embedding dimension mismatch: {} vs {}",
            a.len(),
            b.len()
        )));
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return Err(VoiceError::Extraction(
            "Cannot compare a zero-length embedding".to_string(),
        ));
    }

    Ok(dot_product / (norm_a * norm_b))
}

/// Component-wise arithmetic mean of a set of embeddings
pub fn mean_embedding(embeddings: &[Vec<f32>]) -> VoiceResult<Vec<f32>> {
    let first = embeddings
        .first()
        .ok_or_else(|| VoiceError::Extraction("No embeddings to average".to_string()))?;

    let dim = first.len();
    let mut sum = vec![0.0f64; dim];

    for embedding in embeddings {
        if embedding.len() != dim {
            return Err(VoiceError::Extraction(format!(
                "Embedding dimension mismatch: {} vs {}",
                embedding.len(),
                dim
            )));
        }
        for (acc, &val) in sum.iter_mut().zip(embedding) {
            *acc += val as f64;
        }
    }

    let count = embeddings.len() as f64;
    Ok(sum.into_iter().map(|v| (v / count) as f32).collect())
}

/// Serialize an embedding as consecutive little-endian f32 values
pub fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|&f| f.to_le_bytes()).collect()
}

/// Inverse of [`encode_embedding`]
pub fn decode_embedding(bytes: &[u8]) -> VoiceResult<Vec<f32>> {
    if bytes.is_empty() || bytes.len() % 4 != 0 {
        return Err(VoiceError::StorageCorruption(format!(
            "Embedding artifact has invalid length {}",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn similarity_stays_in_unit_interval(
            a in prop::collection::vec(-10.0f32..10.0, 8),
            b in prop::collection::vec(-10.0f32..10.0, 8),
        ) {
            if let Ok(sim) = cosine_similarity(&a, &b) {
                prop_assert!(sim >= -1.0 - 1e-4 && sim <= 1.0 + 1e-4);
            }
        }

        #[test]
        fn self_similarity_is_one(a in prop::collection::vec(0.1f32..10.0, 16)) {
            let sim = cosine_similarity(&a, &a).unwrap();
            prop_assert!((sim - 1.0).abs() < 1e-4);
        }
    }
}
