use super::*;

fn ramp(w: usize, h: usize) -> GrayImage {
    let luma: Vec<u8> = (0..h).flat_map(|_| (0..w).map(|x| x as u8)).collect();
    GrayImage::from_luma(&luma, w, h)
}

#[test]
fn at_clamps_to_the_border() {
    let img = ramp(4, 2);
    assert_eq!(img.at(-5, 0), 0.0);
    assert_eq!(img.at(10, 1), 3.0);
    assert_eq!(img.at(2, 7), 2.0);
}

#[test]
fn sample_interpolates_between_pixels() {
    let img = ramp(4, 2);
    assert!((img.sample(1.5, 0.5) - 1.5).abs() < 1e-6);
    assert!((img.sample(0.25, 0.0) - 0.25).abs() < 1e-6);
}

#[test]
fn pyr_down_rounds_dimensions_up() {
    let img = GrayImage::from_luma(&[100u8; 9 * 5], 9, 5);
    let half = img.pyr_down();
    assert_eq!((half.width, half.height), (5, 3));
    assert!(half.data.iter().all(|v| (v - 100.0).abs() < 1e-4));
}

#[test]
fn gradients_of_a_ramp() {
    let (gx, gy) = ramp(6, 3).gradients();
    assert_eq!(gx[6 + 2], 1.0);
    assert_eq!(gx[6], 0.5);
    assert!(gy.iter().all(|&v| v == 0.0));
}

#[test]
fn pyramid_stops_before_levels_get_tiny() {
    let p = Pyramid::build(GrayImage::from_luma(&[0u8; 40 * 40], 40, 40), 5);
    let sizes: Vec<usize> = p.levels.iter().map(|l| l.image.width).collect();
    assert_eq!(sizes, vec![40, 20, 10]);
    assert_eq!(p.base().width, 40);
}
