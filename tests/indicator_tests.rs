use iv_forecast::indicator::{Ewm, RollingStd, WilderRsi};

#[test]
fn rolling_std_ring_buffer_wraps() {
    let mut sd = RollingStd::new(3);
    assert_eq!(sd.push(1.0), None);
    assert_eq!(sd.push(2.0), None);
    assert!(!sd.is_ready());

    let v = sd.push(3.0).unwrap();
    assert!((v - 1.0).abs() < f64::EPSILON);

    // window is now [2, 3, 5]
    let v = sd.push(5.0).unwrap();
    let expected = (((2.0f64 - 10.0 / 3.0).powi(2) + (3.0f64 - 10.0 / 3.0).powi(2)
        + (5.0f64 - 10.0 / 3.0).powi(2))
        / 2.0)
        .sqrt();
    assert!((v - expected).abs() < 1e-12);

    for _ in 0..3 {
        sd.push(7.0);
    }
    assert_eq!(sd.value(), Some(0.0));
}

#[test]
fn wilder_ewm_seeds_then_smooths() {
    let mut ewm = Ewm::wilder(4);
    assert!((ewm.alpha() - 0.25).abs() < f64::EPSILON);
    assert!((ewm.push(8.0) - 8.0).abs() < f64::EPSILON);
    assert!((ewm.push(0.0) - 6.0).abs() < f64::EPSILON);
}

#[test]
fn rsi_bounded_on_choppy_series() {
    let mut rsi = WilderRsi::new(14);
    for i in 0..300 {
        let close = 100.0 + 10.0 * (i as f64 * 1.3).sin() + (i % 7) as f64;
        if let Some(v) = rsi.push(close) {
            assert!((0.0..=100.0).contains(&v));
        }
    }
}

#[test]
fn rsi_is_100_while_no_losses() {
    let mut rsi = WilderRsi::new(14);
    assert_eq!(rsi.push(10.0), None);
    for close in [10.0, 11.0, 11.0, 12.5] {
        assert_eq!(rsi.push(close), Some(100.0));
    }
    let after_loss = rsi.push(12.0).unwrap();
    assert!(after_loss < 100.0);
}
