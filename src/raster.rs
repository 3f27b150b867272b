//! Minimal raster drawing and binary morphology on `image` buffers

use image::{GrayImage, Luma, Rgb, RgbImage};

/// Paint a filled disc, clipped to the image
pub fn fill_circle(img: &mut RgbImage, cx: i32, cy: i32, radius: i32, color: Rgb<u8>) {
    if radius < 0 {
        return;
    }
    let (w, h) = (img.width() as i64, img.height() as i64);
    let (cx, cy, r) = (cx as i64, cy as i64, radius as i64);
    let r2 = r * r;
    for y in (cy - r).max(0)..=(cy + r).min(h - 1) {
        for x in (cx - r).max(0)..=(cx + r).min(w - 1) {
            let (dx, dy) = (x - cx, y - cy);
            if dx * dx + dy * dy <= r2 {
                img.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}

/// Paint a circle outline of the given thickness, clipped to the image
pub fn draw_circle(img: &mut RgbImage, cx: i32, cy: i32, radius: i32, thickness: i32, color: Rgb<u8>) {
    if radius <= 0 {
        return;
    }
    let (w, h) = (img.width() as i64, img.height() as i64);
    let (cx, cy) = (cx as i64, cy as i64);
    let half = thickness.max(1) as f64 / 2.0;
    let outer = radius as f64 + half;
    let inner = (radius as f64 - half).max(0.0);
    let reach = outer.ceil() as i64;

    for y in (cy - reach).max(0)..=(cy + reach).min(h - 1) {
        for x in (cx - reach).max(0)..=(cx + reach).min(w - 1) {
            let (dx, dy) = ((x - cx) as f64, (y - cy) as f64);
            let d = (dx * dx + dy * dy).sqrt();
            if d >= inner && d < outer {
                img.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}

/// Paint a line segment; thickness > 1 stamps a disc along the path.
/// The segment is clipped to the image grown by the stamp radius first.
pub fn draw_line(img: &mut RgbImage, from: (i32, i32), to: (i32, i32), thickness: i32, color: Rgb<u8>) {
    let (w, h) = (img.width() as i64, img.height() as i64);
    if w == 0 || h == 0 {
        return;
    }
    let stamp = (thickness.max(1) / 2) as i64;
    let bounds = ((-stamp, -stamp), (w - 1 + stamp, h - 1 + stamp));
    let from = (from.0 as i64, from.1 as i64);
    let to = (to.0 as i64, to.1 as i64);
    let Some(((mut x0, mut y0), (x1, y1))) = clip_segment(from, to, bounds) else {
        return;
    };

    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if stamp == 0 {
            if x0 >= 0 && y0 >= 0 && x0 < w && y0 < h {
                img.put_pixel(x0 as u32, y0 as u32, color);
            }
        } else {
            fill_circle(img, x0 as i32, y0 as i32, stamp as i32, color);
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

type Point = (i64, i64);

/// Liang-Barsky clipping of `from -> to` against the inclusive box `(min, max)`.
/// Endpoints already inside are returned unchanged.
fn clip_segment(from: Point, to: Point, (min, max): (Point, Point)) -> Option<(Point, Point)> {
    let (x0, y0) = (from.0 as f64, from.1 as f64);
    let dx = to.0 as f64 - x0;
    let dy = to.1 as f64 - y0;
    let mut t0 = 0.0f64;
    let mut t1 = 1.0f64;

    let edges = [
        (-dx, x0 - min.0 as f64),
        (dx, max.0 as f64 - x0),
        (-dy, y0 - min.1 as f64),
        (dy, max.1 as f64 - y0),
    ];
    for (p, q) in edges {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
        } else {
            let r = q / p;
            if p < 0.0 {
                if r > t1 {
                    return None;
                }
                t0 = t0.max(r);
            } else {
                if r < t0 {
                    return None;
                }
                t1 = t1.min(r);
            }
        }
    }

    let at = |t: f64| ((x0 + t * dx).round() as i64, (y0 + t * dy).round() as i64);
    let start = if t0 > 0.0 { at(t0) } else { from };
    let end = if t1 < 1.0 { at(t1) } else { to };
    Some((start, end))
}

/// `a * alpha + b * beta`, rounded and saturated per channel
pub fn add_weighted(a: &RgbImage, alpha: f32, b: &RgbImage, beta: f32) -> RgbImage {
    debug_assert_eq!(a.dimensions(), b.dimensions());
    let mut out = RgbImage::new(a.width(), a.height());
    for ((dst, pa), pb) in out.pixels_mut().zip(a.pixels()).zip(b.pixels()) {
        for c in 0..3 {
            let v = pa[c] as f32 * alpha + pb[c] as f32 * beta;
            dst[c] = v.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Grayscale max filter with a `size x size` square window.
/// Out-of-bounds pixels are ignored.
pub fn dilate(mask: &GrayImage, size: u32) -> GrayImage {
    square_filter(mask, size, u8::max)
}

/// Grayscale min filter with a `size x size` square window.
/// Out-of-bounds pixels are ignored.
pub fn erode(mask: &GrayImage, size: u32) -> GrayImage {
    square_filter(mask, size, u8::min)
}

/// Dilation followed by erosion
pub fn close(mask: &GrayImage, size: u32) -> GrayImage {
    erode(&dilate(mask, size), size)
}

/// Erosion followed by dilation
pub fn open(mask: &GrayImage, size: u32) -> GrayImage {
    dilate(&erode(mask, size), size)
}

// Separable: horizontal pass then vertical pass
fn square_filter(mask: &GrayImage, size: u32, pick: fn(u8, u8) -> u8) -> GrayImage {
    let (w, h) = mask.dimensions();
    if size <= 1 || w == 0 || h == 0 {
        return mask.clone();
    }
    let before = (size / 2) as i64;
    let after = (size as i64 - 1) - before;

    let mut horizontal = GrayImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let lo = (x as i64 - before).max(0) as u32;
            let hi = (x as i64 + after).min(w as i64 - 1) as u32;
            let mut acc = mask.get_pixel(lo, y)[0];
            for sx in lo + 1..=hi {
                acc = pick(acc, mask.get_pixel(sx, y)[0]);
            }
            horizontal.put_pixel(x, y, Luma([acc]));
        }
    }

    let mut out = GrayImage::new(w, h);
    for y in 0..h {
        let lo = (y as i64 - before).max(0) as u32;
        let hi = (y as i64 + after).min(h as i64 - 1) as u32;
        for x in 0..w {
            let mut acc = horizontal.get_pixel(x, lo)[0];
            for sy in lo + 1..=hi {
                acc = pick(acc, horizontal.get_pixel(x, sy)[0]);
            }
            out.put_pixel(x, y, Luma([acc]));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dilate_and_erode_single_pixel() {
        let mut mask = GrayImage::new(7, 7);
        mask.put_pixel(3, 3, Luma([255]));

        let grown = dilate(&mask, 3);
        let on: usize = grown.pixels().filter(|p| p[0] == 255).count();
        assert_eq!(on, 9);

        let shrunk = erode(&grown, 3);
        assert_eq!(shrunk, mask);
    }

    #[test]
    fn test_erode_keeps_border_touching_block() {
        let mask = GrayImage::from_pixel(5, 5, Luma([255]));
        assert_eq!(erode(&mask, 3), mask);
    }

    #[test]
    fn test_add_weighted_saturates() {
        let a = RgbImage::from_pixel(1, 1, Rgb([200, 10, 0]));
        let b = RgbImage::from_pixel(1, 1, Rgb([200, 10, 0]));
        let out = add_weighted(&a, 1.0, &b, 0.8);
        assert_eq!(out.get_pixel(0, 0), &Rgb([255, 18, 0]));
    }

    #[test]
    fn test_line_endpoints_and_clipping() {
        let mut img = RgbImage::new(10, 10);
        let green = Rgb([0, 255, 0]);
        draw_line(&mut img, (-5, 2), (20, 2), 1, green);
        assert_eq!(img.get_pixel(0, 2), &green);
        assert_eq!(img.get_pixel(9, 2), &green);
        assert_eq!(img.get_pixel(5, 3), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_extreme_line_is_clipped() {
        let mut img = RgbImage::new(10, 10);
        let green = Rgb([0, 255, 0]);
        draw_line(&mut img, (i32::MIN, 5), (i32::MAX, 5), 1, green);
        assert!((0..10).all(|x| img.get_pixel(x, 5) == &green));
        assert_eq!(img.get_pixel(5, 4), &Rgb([0, 0, 0]));

        // Diagonal through the frame from far outside, with a thick stamp
        draw_line(&mut img, (i32::MIN, i32::MIN), (i32::MAX, i32::MAX), 2, green);
        assert_eq!(img.get_pixel(2, 2), &green);

        // Entirely outside: nothing drawn
        let mut blank = RgbImage::new(10, 10);
        draw_line(&mut blank, (i32::MAX, 0), (i32::MAX, 9), 2, green);
        assert!(blank.pixels().all(|p| p == &Rgb([0, 0, 0])));
    }

    #[test]
    fn test_extreme_circles_do_not_overflow() {
        let mut img = RgbImage::new(10, 10);
        let c = Rgb([9, 9, 9]);
        fill_circle(&mut img, i32::MAX, i32::MAX, 5, c);
        fill_circle(&mut img, i32::MIN, 0, i32::MAX, c);
        draw_circle(&mut img, i32::MAX, i32::MIN, 100, 2, c);
        draw_circle(&mut img, 5, 5, i32::MAX, 2, c);
        assert_eq!(img.get_pixel(5, 5), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_circle_outline_is_hollow() {
        let mut img = RgbImage::new(41, 41);
        let c = Rgb([9, 9, 9]);
        draw_circle(&mut img, 20, 20, 15, 2, c);
        assert_eq!(img.get_pixel(20, 20), &Rgb([0, 0, 0]));
        assert_eq!(img.get_pixel(35, 20), &c);
        assert_eq!(img.get_pixel(20, 5), &c);
    }
}
