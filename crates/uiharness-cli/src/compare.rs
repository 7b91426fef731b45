//! Screenshot comparison

use anyhow::{Context, Result};
use clap::ValueEnum;
use image::DynamicImage;
use serde::Serialize;
use std::path::Path;

/// Scores at or above this count as identical
const IDENTICAL_THRESHOLD: f64 = 0.9999;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// Multi-scale structural similarity
    Mssim,
    /// Root mean squared difference
    Rms,
    /// Average of MSSIM and RMS
    Hybrid,
}

#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    pub score: f64,
    pub identical: bool,
    pub algorithm: Algorithm,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn compare_files(a: &Path, b: &Path, algorithm: Algorithm) -> Result<Comparison> {
    let img_a = image::open(a).with_context(|| format!("Failed to open {}", a.display()))?;
    let img_b = image::open(b).with_context(|| format!("Failed to open {}", b.display()))?;
    compare_images(&img_a, &img_b, algorithm)
}

/// Grayscale similarity of two images
///
/// Images of different sizes score 0 with a `dimension_mismatch` error.
pub fn compare_images(
    img_a: &DynamicImage,
    img_b: &DynamicImage,
    algorithm: Algorithm,
) -> Result<Comparison> {
    let gray_a = img_a.to_luma8();
    let gray_b = img_b.to_luma8();

    if gray_a.dimensions() != gray_b.dimensions() {
        tracing::debug!(
            "Dimension mismatch: {:?} vs {:?}",
            gray_a.dimensions(),
            gray_b.dimensions()
        );
        return Ok(Comparison {
            score: 0.0,
            identical: false,
            algorithm,
            error: Some("dimension_mismatch".into()),
        });
    }

    let score_with = |algo: image_compare::Algorithm| -> Result<f64> {
        let similarity = image_compare::gray_similarity_structure(&algo, &gray_a, &gray_b)
            .map_err(|e| anyhow::anyhow!("Comparison failed: {}", e))?;
        Ok(similarity.score)
    };

    let score = match algorithm {
        Algorithm::Mssim => score_with(image_compare::Algorithm::MSSIMSimple)?,
        Algorithm::Rms => score_with(image_compare::Algorithm::RootMeanSquared)?,
        Algorithm::Hybrid => {
            let mssim = score_with(image_compare::Algorithm::MSSIMSimple)?;
            let rms = score_with(image_compare::Algorithm::RootMeanSquared)?;
            (mssim + rms) / 2.0
        }
    };

    Ok(Comparison {
        score,
        identical: score >= IDENTICAL_THRESHOLD,
        algorithm,
        error: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_fn(width, height, |x, y| {
            Luma([((x * 7 + y * 3) % 256) as u8])
        }))
    }

    #[test]
    fn test_identical_images() {
        let img = gradient(32, 32);
        for algorithm in [Algorithm::Mssim, Algorithm::Rms, Algorithm::Hybrid] {
            let result = compare_images(&img, &img, algorithm).unwrap();
            assert!(result.identical, "{:?} scored {}", algorithm, result.score);
        }
    }

    #[test]
    fn test_different_images() {
        let a = gradient(32, 32);
        let b = DynamicImage::ImageLuma8(GrayImage::from_pixel(32, 32, Luma([0])));
        let result = compare_images(&a, &b, Algorithm::Rms).unwrap();
        assert!(!result.identical);
        assert!(result.score < 1.0);
    }

    #[test]
    fn test_dimension_mismatch() {
        let result = compare_images(&gradient(8, 8), &gradient(8, 9), Algorithm::Hybrid).unwrap();
        assert_eq!(result.score, 0.0);
        assert_eq!(result.error.as_deref(), Some("dimension_mismatch"));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["algorithm"], "hybrid");
    }
}
