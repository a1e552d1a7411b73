//! Cosine similarity and distance.
//!
//! All vector comparison in photosort uses cosine distance,
//! `1 - (u.v)/(|u||v|)`, bounded in `[0, 2]`. When either magnitude is zero
//! the similarity is defined as 0 (distance 1).

/// Dot product of two equal-length vectors.
#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Euclidean magnitude of a vector.
#[inline]
pub fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity in `[-1, 1]`.
///
/// Zero-magnitude vectors have similarity 0 to anything, including
/// themselves.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mag_a = magnitude(a);
    let mag_b = magnitude(b);
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot(a, b) / (mag_a * mag_b)
}

/// Cosine distance in `[0, 2]`: `1 - cosine_similarity`.
#[inline]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

/// Squared cosine distance, used as the K-Means++ sampling weight.
#[inline]
pub fn cosine_distance_squared(a: &[f32], b: &[f32]) -> f32 {
    let d = cosine_distance(a, b);
    d * d
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-6;

    #[test]
    fn identical_vectors_have_zero_distance() {
        let v = vec![0.3, -0.2, 0.9];
        assert!(cosine_distance(&v, &v).abs() < EPS);
    }

    #[test]
    fn orthogonal_vectors_have_distance_one() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!((cosine_distance(&a, &b) - 1.0).abs() < EPS);
    }

    #[test]
    fn opposite_vectors_have_distance_two() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_distance(&a, &b) - 2.0).abs() < EPS);
    }

    #[test]
    fn zero_magnitude_vector_has_distance_one_to_anything() {
        let zero = vec![0.0, 0.0, 0.0];
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_distance(&zero, &v) - 1.0).abs() < EPS);
        assert!((cosine_distance(&v, &zero) - 1.0).abs() < EPS);
        assert!((cosine_distance(&zero, &zero) - 1.0).abs() < EPS);
    }

    #[test]
    fn scaling_does_not_change_distance() {
        let a = vec![0.5, 0.5, 0.0];
        let b: Vec<f32> = a.iter().map(|x| x * 7.0).collect();
        assert!(cosine_distance(&a, &b).abs() < EPS);
    }

    #[test]
    fn known_angle() {
        // 60 degrees apart: similarity 0.5, distance 0.5.
        let a = vec![1.0, 0.0];
        let b = vec![0.5, (3.0f32).sqrt() / 2.0];
        assert!((cosine_distance(&a, &b) - 0.5).abs() < 1e-5);
    }

    #[test]
    fn squared_distance_matches() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!((cosine_distance_squared(&a, &b) - 1.0).abs() < EPS);
    }
}
