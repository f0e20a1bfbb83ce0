use super::*;
use crate::foundation::core::Rect;

fn ramp_x(w: i32, h: i32) -> MemoryBuffer {
    let mut buf = MemoryBuffer::new(Rect::new(0, 0, w, h)).unwrap();
    for y in 0..h {
        for x in 0..w {
            buf.write_pixel(x, y, [x as f32, 0.0, 0.0, 1.0]);
        }
    }
    buf
}

const ALL: [PixelSampler; 4] = [
    PixelSampler::Nearest,
    PixelSampler::Bilinear,
    PixelSampler::Bicubic,
    PixelSampler::Ewa { dx: 0.5, dy: 0.5 },
];

#[test]
fn every_policy_is_exact_on_integer_coordinates() {
    let buf = ramp_x(8, 8);
    for s in ALL {
        let c = s.sample(&buf, 5.0, 3.0, ExtendMode::Extend);
        assert!((c[0] - 5.0).abs() < 1e-5, "{s:?} gave {c:?}");
    }
}

#[test]
fn every_policy_preserves_constant_images() {
    let buf = MemoryBuffer::filled(Rect::new(0, 0, 6, 6), [0.5, 0.25, 0.75, 1.0]).unwrap();
    for s in ALL.into_iter().chain([PixelSampler::Ewa { dx: 3.0, dy: 1.5 }]) {
        for (x, y) in [(0.0, 0.0), (2.4, 3.7), (5.9, 5.9), (-3.0, 9.0)] {
            let c = s.sample(&buf, x, y, ExtendMode::Extend);
            for i in 0..4 {
                let want = [0.5, 0.25, 0.75, 1.0][i];
                assert!((c[i] - want).abs() < 1e-5, "{s:?} at ({x},{y}) gave {c:?}");
            }
        }
    }
}

#[test]
fn bilinear_interpolates_between_pixels() {
    let buf = ramp_x(8, 2);
    let c = sample_bilinear(&buf, 2.25, 0.0, ExtendMode::Extend);
    assert!((c[0] - 2.25).abs() < 1e-5);
}

#[test]
fn bicubic_stays_monotone_on_linear_ramp_interior() {
    let buf = ramp_x(8, 4);
    let a = sample_bicubic(&buf, 3.25, 1.0, ExtendMode::Extend)[0];
    let b = sample_bicubic(&buf, 3.75, 1.0, ExtendMode::Extend)[0];
    assert!(a > 3.0 && a < b && b < 4.0, "a={a} b={b}");
}

#[test]
fn samplers_clamp_at_edges() {
    let buf = ramp_x(4, 4);
    for s in ALL {
        let c = s.sample(&buf, 3.9, 3.9, ExtendMode::Extend);
        // Cubic ringing stays tiny; reading pixel 4 would give >= 3.5.
        assert!(c[0] <= 3.01, "{s:?} read past the edge: {c:?}");
    }
}

#[test]
fn far_coordinates_never_overflow() {
    let mut buf = MemoryBuffer::new(Rect::new(1, 1, 5, 5)).unwrap();
    for y in 1..5 {
        for x in 1..5 {
            buf.write_pixel(x, y, [x as f32, y as f32, 0.0, 1.0]);
        }
    }
    let far = [(3.0e9, 3.0e9), (-3.0e9, -3.0e9), (3.0e9, -3.0e9), (-3.0e9, 2.0)];
    for s in ALL {
        for (x, y) in far {
            let extended = s.sample(&buf, x, y, ExtendMode::Extend);
            let want = [
                if x > 0.0 { 4.0 } else { 1.0 },
                if y > 0.0 { 4.0 } else if y < 0.0 { 1.0 } else { 2.0 },
                0.0,
                1.0,
            ];
            for (v, w) in extended.iter().zip(want) {
                assert!((v - w).abs() < 1e-4, "{s:?} at ({x}, {y}) gave {extended:?}");
            }

            let clipped = s.sample(&buf, x, y, ExtendMode::Clip);
            assert_eq!(clipped, [0.0; 4], "{s:?} at ({x}, {y})");

            let repeated = s.sample(&buf, x, y, ExtendMode::Repeat);
            assert!(
                repeated.iter().all(|v| v.is_finite()),
                "{s:?} at ({x}, {y}) gave {repeated:?}"
            );
            assert!((repeated[3] - 1.0).abs() < 1e-4, "{repeated:?}");
        }
    }
}

#[test]
fn ewa_footprint_is_bounded() {
    let buf = ramp_x(8, 8);
    let huge = sample_ewa(&buf, 4.0, 4.0, 1e9, 1e9, ExtendMode::Extend);
    assert!(huge[0].is_finite());
    let nan = sample_ewa(&buf, 4.0, 4.0, f32::NAN, 1.0, ExtendMode::Extend);
    assert!(nan[0].is_finite());
}

#[test]
fn ewa_averages_wider_footprints() {
    let mut buf = MemoryBuffer::new(Rect::new(0, 0, 9, 1)).unwrap();
    buf.write_pixel(4, 0, [1.0, 1.0, 1.0, 1.0]);
    let narrow = sample_ewa(&buf, 4.0, 0.0, 0.5, 0.5, ExtendMode::Clip)[0];
    let wide = sample_ewa(&buf, 4.0, 0.0, 4.0, 0.5, ExtendMode::Clip)[0];
    assert_eq!(narrow, 1.0);
    assert!(wide > 0.0 && wide < 1.0);
}

#[test]
fn non_finite_ewa_derivatives_fail_validation() {
    assert!(PixelSampler::Ewa { dx: f32::NAN, dy: 1.0 }.validate().is_err());
    assert!(PixelSampler::Bicubic.validate().is_ok());
}
