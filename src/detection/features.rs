//! 关键点特征提取

use crate::Pose;

/// 关键点 → 特征向量 `[x/width, y/height, conf] × nk`
///
/// 画面中无人时返回等长的全零向量, 仍交给分类器处理
pub fn extract_keypoints(pose: Option<&Pose>, width: u32, height: u32, nk: usize) -> Vec<f32> {
    let mut features = vec![0.0f32; nk * 3];
    let Some(pose) = pose else {
        return features;
    };
    if width == 0 || height == 0 {
        return features;
    }

    let (w, h) = (width as f32, height as f32);
    for (i, kpt) in pose.keypoints.iter().take(nk).enumerate() {
        features[i * 3] = (kpt.x() / w).clamp(0.0, 1.0);
        features[i * 3 + 1] = (kpt.y() / h).clamp(0.0, 1.0);
        features[i * 3 + 2] = kpt.confidence();
    }
    features
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Bbox, Point2};

    #[test]
    fn test_normalized_by_image_size() {
        let pose = Pose {
            bbox: Bbox::default(),
            keypoints: vec![
                Point2::new_with_conf(50., 25., 0.9),
                Point2::new_with_conf(100., 100., 0.6),
            ],
        };
        let xs = extract_keypoints(Some(&pose), 100, 100, 2);
        assert_eq!(xs, vec![0.5, 0.25, 0.9, 1.0, 1.0, 0.6]);
    }

    #[test]
    fn test_no_pose_is_zero_vector() {
        assert_eq!(extract_keypoints(None, 640, 480, 17), vec![0.0; 51]);
    }

    #[test]
    fn test_short_pose_is_padded() {
        let pose = Pose {
            bbox: Bbox::default(),
            keypoints: vec![Point2::new_with_conf(10., 10., 1.0)],
        };
        let xs = extract_keypoints(Some(&pose), 20, 20, 3);
        assert_eq!(xs.len(), 9);
        assert_eq!(&xs[..3], &[0.5, 0.5, 1.0]);
        assert!(xs[3..].iter().all(|v| *v == 0.0));
    }
}
