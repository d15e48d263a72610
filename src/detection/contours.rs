use image::{GrayImage, Luma};
use imageproc::contours::{BorderType, find_contours};
use imageproc::point::Point;

/// Outer borders of top-level foreground regions, each simplified to its
/// corner points. Order follows the raster scan that discovered them.
pub fn find_external_contours(mask: &GrayImage) -> Vec<Vec<[i32; 2]>> {
    // Tracing does not start an outer border on column 0, so give every region
    // a background margin and shift back afterwards.
    let padded = pad(mask);

    find_contours::<i32>(&padded)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| {
            let points: Vec<Point<i32>> = c
                .points
                .into_iter()
                .map(|p| Point::new(p.x - 1, p.y - 1))
                .collect();
            compress_chain(&points)
        })
        .collect()
}

/// The outline of largest enclosed area. Ties keep the earlier contour.
pub fn largest_external_contour(mask: &GrayImage) -> Option<Vec<[i32; 2]>> {
    let mut best: Option<(i64, Vec<[i32; 2]>)> = None;
    for contour in find_external_contours(mask) {
        let area = doubled_area(&contour);
        match &best {
            Some((best_area, _)) if area <= *best_area => {}
            _ => best = Some((area, contour)),
        }
    }
    best.map(|(_, contour)| contour)
}

/// Twice the absolute shoelace area of a closed polygon.
pub fn doubled_area(points: &[[i32; 2]]) -> i64 {
    if points.len() < 3 {
        return 0;
    }
    let mut sum = 0i64;
    for (i, a) in points.iter().enumerate() {
        let b = points[(i + 1) % points.len()];
        sum += a[0] as i64 * b[1] as i64 - b[0] as i64 * a[1] as i64;
    }
    sum.abs()
}

pub fn polygon_area(points: &[[i32; 2]]) -> f64 {
    doubled_area(points) as f64 / 2.0
}

/// Drop points that sit in the middle of a straight horizontal, vertical or
/// diagonal run, keeping only the turns of the closed chain.
pub fn compress_chain(points: &[Point<i32>]) -> Vec<[i32; 2]> {
    let n = points.len();
    if n < 3 {
        return points.iter().map(|p| [p.x, p.y]).collect();
    }

    let step = |a: Point<i32>, b: Point<i32>| ((b.x - a.x).signum(), (b.y - a.y).signum());

    let kept: Vec<[i32; 2]> = (0..n)
        .filter(|&i| {
            let prev = points[(i + n - 1) % n];
            let curr = points[i];
            let next = points[(i + 1) % n];
            step(prev, curr) != step(curr, next)
        })
        .map(|i| [points[i].x, points[i].y])
        .collect();

    if kept.is_empty() {
        // A chain that never turns is a single back-and-forth segment
        vec![[points[0].x, points[0].y]]
    } else {
        kept
    }
}

fn pad(mask: &GrayImage) -> GrayImage {
    let mut padded = GrayImage::from_pixel(mask.width() + 2, mask.height() + 2, Luma([0u8]));
    image::imageops::replace(&mut padded, mask, 1, 1);
    padded
}
