use crate::region::Region;

pub(super) fn iou(a: &Region, b: &Region) -> f32 {
    let ix1 = a.x.max(b.x);
    let iy1 = a.y.max(b.y);
    let ix2 = a.right().min(b.right());
    let iy2 = a.bottom().min(b.bottom());

    if ix2 <= ix1 || iy2 <= iy1 {
        return 0.0;
    }
    let inter = (ix2 - ix1) as f32 * (iy2 - iy1) as f32;
    let area_a = (a.w as f32) * (a.h as f32);
    let area_b = (b.w as f32) * (b.h as f32);
    inter / (area_a + area_b - inter).max(1.0)
}

pub(super) fn horizontal_overlap_ratio(a: &Region, b: &Region) -> f32 {
    let ix1 = a.x.max(b.x);
    let ix2 = a.right().min(b.right());
    if ix2 <= ix1 {
        return 0.0;
    }
    (ix2 - ix1) as f32 / (a.w.min(b.w) as f32).max(1.0)
}

pub(super) fn vertical_overlap_ratio(a: &Region, b: &Region) -> f32 {
    let iy1 = a.y.max(b.y);
    let iy2 = a.bottom().min(b.bottom());
    if iy2 <= iy1 {
        return 0.0;
    }
    (iy2 - iy1) as f32 / (a.h.min(b.h) as f32).max(1.0)
}
