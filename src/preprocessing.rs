// src/preprocessing.rs

/// Letterboxed detector input plus the transform needed to map boxes back.
#[derive(Debug, Clone)]
pub struct Letterbox {
    /// CHW, normalized to [0, 1]
    pub tensor: Vec<f32>,
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
}

impl Letterbox {
    /// Map a box from model input space back to source-frame pixels.
    pub fn unmap(&self, bbox: [f32; 4]) -> [f32; 4] {
        [
            (bbox[0] - self.pad_x) / self.scale,
            (bbox[1] - self.pad_y) / self.scale,
            (bbox[2] - self.pad_x) / self.scale,
            (bbox[3] - self.pad_y) / self.scale,
        ]
    }
}

/// Resize `src` (RGB) into a `target`×`target` gray-padded canvas keeping the
/// aspect ratio, then normalize and convert HWC -> CHW.
pub fn letterbox(src: &[u8], src_w: usize, src_h: usize, target: usize) -> Letterbox {
    let scale = (target as f32 / src_w as f32).min(target as f32 / src_h as f32);
    let scaled_w = ((src_w as f32 * scale) as usize).clamp(1, target);
    let scaled_h = ((src_h as f32 * scale) as usize).clamp(1, target);

    let pad_x = (target - scaled_w) as f32 / 2.0;
    let pad_y = (target - scaled_h) as f32 / 2.0;

    let resized = resize_bilinear(src, src_w, src_h, scaled_w, scaled_h);

    let mut canvas = vec![114u8; target * target * 3];
    for y in 0..scaled_h {
        let dst_y = y + pad_y as usize;
        let src_row = y * scaled_w * 3;
        let dst_row = (dst_y * target + pad_x as usize) * 3;
        canvas[dst_row..dst_row + scaled_w * 3]
            .copy_from_slice(&resized[src_row..src_row + scaled_w * 3]);
    }

    let plane = target * target;
    let mut tensor = vec![0.0f32; 3 * plane];
    for (i, pixel) in canvas.chunks_exact(3).enumerate() {
        for c in 0..3 {
            tensor[c * plane + i] = pixel[c] as f32 / 255.0;
        }
    }

    Letterbox {
        tensor,
        scale,
        pad_x,
        pad_y,
    }
}

/// Bilinear image resize
pub fn resize_bilinear(
    src: &[u8],
    src_w: usize,
    src_h: usize,
    dst_w: usize,
    dst_h: usize,
) -> Vec<u8> {
    let mut dst = vec![0u8; dst_h * dst_w * 3];

    let x_ratio = src_w as f32 / dst_w as f32;
    let y_ratio = src_h as f32 / dst_h as f32;

    for dy in 0..dst_h {
        for dx in 0..dst_w {
            let sx = dx as f32 * x_ratio;
            let sy = dy as f32 * y_ratio;

            let sx0 = (sx.floor() as usize).min(src_w - 1);
            let sy0 = (sy.floor() as usize).min(src_h - 1);
            let sx1 = (sx0 + 1).min(src_w - 1);
            let sy1 = (sy0 + 1).min(src_h - 1);

            let fx = sx - sx0 as f32;
            let fy = sy - sy0 as f32;

            for c in 0..3 {
                let p00 = src[(sy0 * src_w + sx0) * 3 + c] as f32;
                let p10 = src[(sy0 * src_w + sx1) * 3 + c] as f32;
                let p01 = src[(sy1 * src_w + sx0) * 3 + c] as f32;
                let p11 = src[(sy1 * src_w + sx1) * 3 + c] as f32;

                let val = p00 * (1.0 - fx) * (1.0 - fy)
                    + p10 * fx * (1.0 - fy)
                    + p01 * (1.0 - fx) * fy
                    + p11 * fx * fy;

                dst[(dy * dst_w + dx) * 3 + c] = val.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    dst
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letterbox_wide_frame() {
        let src = vec![200u8; 640 * 320 * 3];
        let lb = letterbox(&src, 640, 320, 640);
        assert_eq!(lb.tensor.len(), 3 * 640 * 640);
        assert!((lb.scale - 1.0).abs() < 1e-6);
        assert_eq!(lb.pad_x, 0.0);
        assert_eq!(lb.pad_y, 160.0);
        // Padding row is gray, content row is the source value
        assert!((lb.tensor[0] - 114.0 / 255.0).abs() < 1e-6);
        assert!((lb.tensor[200 * 640] - 200.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_unmap_inverts_letterbox() {
        let src = vec![0u8; 1280 * 720 * 3];
        let lb = letterbox(&src, 1280, 720, 640);
        let model_box = [
            100.0 * lb.scale + lb.pad_x,
            50.0 * lb.scale + lb.pad_y,
            300.0 * lb.scale + lb.pad_x,
            250.0 * lb.scale + lb.pad_y,
        ];
        let b = lb.unmap(model_box);
        for (got, want) in b.iter().zip([100.0, 50.0, 300.0, 250.0]) {
            assert!((got - want).abs() < 1e-3);
        }
    }

    #[test]
    fn test_resize() {
        let src = vec![255u8; 100 * 100 * 3];
        let dst = resize_bilinear(&src, 100, 100, 50, 50);
        assert_eq!(dst.len(), 50 * 50 * 3);
        assert!(dst.iter().all(|&v| v == 255));
    }
}
