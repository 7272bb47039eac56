// src/range/tests.rs

use super::*;

fn spread(n: u16) -> Histogram {
    Histogram::from_samples(0..n)
}

// --- Histogram ---

#[test_log::test]
fn test_histogram_counts_and_span() {
    let hist = build_histogram([3, 3, 7]);
    assert_eq!(hist.total(), 3);
    assert_eq!(hist.count(3), 2);
    assert_eq!(hist.count(4), 0);
    assert_eq!(hist.span(), Some((3, 7)));
    assert_eq!(hist.to_string(), "3 => 2\n7 => 1\n");
    assert_eq!(Histogram::new().span(), None);
}

#[test_log::test]
fn test_cumulative_percentages() {
    let cum = build_histogram([0, 0, 10, 10, 10, 20]).cumulative();
    assert!((cum.percent(0) - 100.0 / 3.0).abs() < 1e-9);
    assert!((cum.percent(9) - 100.0 / 3.0).abs() < 1e-9);
    assert!((cum.percent(10) - 500.0 / 6.0).abs() < 1e-9);
    assert_eq!(cum.percent(20), 100.0);
    assert_eq!(cum.percent(0xffff), 100.0);
}

#[test_log::test]
fn test_quantize() {
    assert_eq!(quantize(0.0, 0.0, 1.0), 0);
    assert_eq!(quantize(1.0, 0.0, 1.0), FULL_SCALE);
    assert_eq!(quantize(0.5, 0.0, 1.0), 32767);
    assert_eq!(quantize(-5.0, 0.0, 1.0), 0);
    assert_eq!(quantize(5.0, 0.0, 1.0), FULL_SCALE);
    assert_eq!(quantize(f64::NAN, 0.0, 1.0), 0);
    assert_eq!(quantize(3.0, 2.0, 2.0), 0);
}

#[test_log::test]
fn test_histogram_from_values() {
    let hist = Histogram::from_values([-1.0, 0.0, 1.0], -1.0, 1.0);
    assert_eq!(hist.span(), Some((0, FULL_SCALE)));
    assert_eq!(hist.count(32767), 1);
}

// --- Bounds ---

#[test_log::test]
fn test_zero_percent_bounds() {
    let hist = build_histogram([0, 0, 10, 10, 10, 20]);
    let bounds = derive_bounds(&hist, 0.0, 0.0).unwrap();
    assert_eq!(bounds, Bounds::new(1, 20).unwrap());
    let map = RangeMap::new(bounds, None);
    assert_eq!(map.multiplier(), 65535.0 / 19.0);
}

#[test_log::test]
fn test_hi_percent_discards_from_the_top() {
    let hist = spread(1000);
    // Every bucket holds 0.1% of the samples.
    assert_eq!(derive_bounds(&hist, 10.0, 0.0).unwrap(), Bounds::new(99, 999).unwrap());
    assert_eq!(derive_bounds(&hist, 10.0, 20.0).unwrap(), Bounds::new(99, 799).unwrap());
}

#[test_log::test]
fn test_ordered_percentiles_give_ordered_bounds() {
    let hist = spread(1000);
    for lo in (0..=90).step_by(5) {
        for hi in (0..=90).step_by(5) {
            if (lo as f64) < 100.0 - hi as f64 {
                let b = derive_bounds(&hist, lo as f64, hi as f64).unwrap();
                assert!(b.lo() < b.hi(), "lo={} hi={} -> {:?}", lo, hi, b);
            }
        }
    }
}

#[test_log::test]
fn test_collapsed_bounds_are_empty_range() {
    let hist = build_histogram([7; 10]);
    assert_eq!(
        derive_bounds(&hist, 50.0, 40.0),
        Err(Error::EmptyRange { lo: 7, hi: 7 })
    );
    assert_eq!(Bounds::new(9, 3), Err(Error::EmptyRange { lo: 9, hi: 3 }));
}

#[test_log::test]
fn test_bounds_cannot_be_inverted_or_flat() {
    assert_eq!(Bounds::new(10, 3), Err(Error::EmptyRange { lo: 10, hi: 3 }));
    assert_eq!(Bounds::new(10, 10), Err(Error::EmptyRange { lo: 10, hi: 10 }));
    let narrow = Bounds::new(10, 11).unwrap();
    assert_eq!((narrow.lo(), narrow.hi(), narrow.width()), (10, 11, 1));

    // The narrowest valid range still maps below-range samples to zero.
    let map = RangeMap::new(narrow, None);
    assert_eq!(map.multiplier(), FULL_SCALE as f64);
    assert_eq!(remap(5, narrow, None), 0);
    assert_eq!(remap(10, narrow, None), 0);
    assert_eq!(remap(11, narrow, None), FULL_SCALE);
}

#[test_log::test]
fn test_percent_out_of_range() {
    let hist = spread(10);
    assert!(matches!(derive_bounds(&hist, -1.0, 0.0), Err(Error::InvalidParameter(_))));
    assert!(matches!(derive_bounds(&hist, 0.0, 100.5), Err(Error::InvalidParameter(_))));
}

// --- ClipSpec ---

#[test_log::test]
fn test_clip_spec_validation() {
    assert!(ClipSpec::default().validate().is_ok());
    let bad = [
        ClipSpec { lo_percent: 60.0, hi_percent: 50.0, ..Default::default() },
        ClipSpec { lo_percent: 101.0, ..Default::default() },
        ClipSpec { lo_index: Some(0), ..Default::default() },
        ClipSpec { hi_index: Some(0xffff), ..Default::default() },
        ClipSpec { gamma: Some(f64::NAN), ..Default::default() },
    ];
    for spec in bad {
        assert!(spec.validate().is_err(), "{:?} should be rejected", spec);
    }
}

#[test_log::test]
fn test_absolute_indices_need_no_histogram() {
    let spec = ClipSpec {
        lo_index: Some(10),
        hi_index: Some(200),
        ..Default::default()
    };
    assert!(spec.is_absolute());
    assert_eq!(spec.bounds(None, None).unwrap(), Bounds::new(10, 200).unwrap());
    assert!(matches!(
        ClipSpec::default().bounds(None, None),
        Err(Error::InvalidParameter(_))
    ));
}

#[test_log::test]
fn test_single_index_overrides_percentile_bound() {
    let hist = build_histogram([0, 0, 10, 10, 10, 20]);
    let spec = ClipSpec {
        lo_index: Some(5),
        ..Default::default()
    };
    assert_eq!(spec.bounds(Some(&hist), None).unwrap(), Bounds::new(5, 20).unwrap());
    let spec = ClipSpec {
        hi_index: Some(15),
        ..Default::default()
    };
    assert_eq!(spec.bounds(Some(&hist), None).unwrap(), Bounds::new(1, 15).unwrap());
}

#[test_log::test]
fn test_valid_hint_wins() {
    let hist = build_histogram([0, 0, 10, 10, 10, 20]);
    let spec = ClipSpec {
        lo_index: Some(2),
        hi_index: Some(4),
        ..Default::default()
    };
    let hint = Bounds::new(3, 9).unwrap();
    assert_eq!(spec.bounds(Some(&hist), Some(hint)).unwrap(), hint);
    assert_eq!(spec.bounds(Some(&hist), None).unwrap(), Bounds::new(2, 4).unwrap());
}

#[test_log::test]
fn test_hint_json() {
    let hint: Hint = serde_json::from_str(r#"{"LoIdx":[1,2,3],"HiIdx":[100,200,2]}"#).unwrap();
    assert_eq!(hint.bounds(1), Some(Bounds::new(2, 200).unwrap()));
    assert_eq!(hint.bounds(2), None);
    assert_eq!(hint.bounds(3), None);
    let text = serde_json::to_string(&hint).unwrap();
    assert!(text.contains("\"LoIdx\""), "{}", text);
}

// --- Remap ---

#[test_log::test]
fn test_remap_is_monotonic_and_saturates() {
    // 65535 / 255 = 257, so every step is exact.
    let map = RangeMap::new(Bounds::new(100, 355).unwrap(), None);
    assert_eq!(map.remap(0), 0);
    assert_eq!(map.remap(100), 0);
    assert_eq!(map.remap(101), 257);
    assert_eq!(map.remap(355), FULL_SCALE);
    assert_eq!(map.remap(u16::MAX), FULL_SCALE);
    let mut prev = 0;
    for v in (0..=u16::MAX).step_by(37) {
        let out = map.remap(v);
        assert!(out >= prev, "remap({}) = {} < {}", v, out, prev);
        prev = out;
    }
}

#[test_log::test]
fn test_remap_clipping_is_idempotent() {
    let clip = Bounds::new(0, FULL_SCALE).unwrap();
    let map = RangeMap::new(Bounds::new(300, 4000).unwrap(), None);
    for v in [0u16, 299, 300, 2000, 4000, 60000] {
        let once = map.remap(v);
        assert_eq!(remap(once, clip, None), once);
    }
}

#[test_log::test]
fn test_gamma() {
    let bounds = Bounds::new(0, FULL_SCALE).unwrap();
    assert_eq!(remap(0, bounds, Some(2.0)), 0);
    assert_eq!(remap(FULL_SCALE, bounds, Some(2.0)), FULL_SCALE);
    assert_eq!(remap(32768, bounds, Some(2.0)), 16384);
    assert!(remap(16384, bounds, Some(0.5)) > 16384);
}

#[test_log::test]
fn test_range_map_from_clip_spec() {
    let hist = build_histogram([0, 0, 10, 10, 10, 20]);
    let spec = ClipSpec {
        gamma: Some(1.0),
        ..Default::default()
    };
    let map = spec.range_map(Some(&hist), None).unwrap();
    assert_eq!(map.bounds(), Bounds::new(1, 20).unwrap());
    assert_eq!(map.remap(1), 0);
    assert_eq!(map.remap(1000), FULL_SCALE);
}

// --- Channels ---

fn ramp_field() -> Field {
    use num_complex::Complex64;
    let c = |re: f64| Complex64::new(re, 0.0);
    Field::from_columns(2, 2, vec![vec![c(0.0), c(1.0)], vec![c(2.0), c(3.0)]]).unwrap()
}

fn absolute(lo: u16, hi: u16) -> ClipSpec {
    ClipSpec {
        lo_index: Some(lo),
        hi_index: Some(hi),
        ..Default::default()
    }
}

#[test_log::test]
fn test_quantize_field_uses_part_range() {
    let raw = quantize_field(&ramp_field(), Part::Real);
    assert_eq!((raw.width(), raw.height()), (2, 2));
    assert_eq!(raw.samples(), &[0, 21845, 43690, FULL_SCALE]);
    assert_eq!(raw.get(0, 1), 21845);
    assert_eq!(raw.column(1), &[43690, FULL_SCALE]);
    // The imaginary part is flat, so everything lands in bucket 0.
    assert_eq!(quantize_field(&ramp_field(), Part::Imag).samples(), &[0; 4]);
}

#[test_log::test]
fn test_map_field_with_absolute_bounds() {
    let out = map_field(&ramp_field(), Part::Real, &absolute(21845, 43690), None).unwrap();
    assert_eq!(out.samples(), &[0, 0, FULL_SCALE, FULL_SCALE]);
}

#[test_log::test]
fn test_map_field_percentiles_and_hint() {
    let out = map_field(&ramp_field(), Part::Real, &ClipSpec::default(), None).unwrap();
    assert_eq!(out.get(0, 0), 0);
    assert!(out.get(1, 1) >= FULL_SCALE - 1, "top sample {}", out.get(1, 1));
    assert!(out.samples().windows(2).all(|w| w[0] <= w[1]));

    let hint = Bounds::new(0, 21845).unwrap();
    let out = map_field(&ramp_field(), Part::Real, &ClipSpec::default(), Some(hint)).unwrap();
    assert_eq!(out.samples(), &[0, FULL_SCALE, FULL_SCALE, FULL_SCALE]);
}

#[test_log::test]
fn test_map_flat_field_is_empty_range() {
    let err = map_field(&ramp_field(), Part::Imag, &ClipSpec::default(), None).unwrap_err();
    assert!(matches!(err, Error::EmptyRange { .. }), "got {:?}", err);
}

#[test_log::test]
fn test_channel_shape_is_checked() {
    assert!(Channel::new(2, 2, vec![0; 3]).is_err());
    assert!(Channel::new(0, 1, vec![]).is_err());
    assert_eq!(Channel::new(1, 2, vec![7, 7]).unwrap().histogram().count(7), 2);
}

// --- Channel formula ---

fn channel_formula(text: &str, use_imag: bool, cache: usize) -> ChannelFormula {
    let formula = crate::expr::Formula::compile(text, crate::expr::Mode::Complex, None).unwrap();
    ChannelFormula::new(formula, use_imag, cache).unwrap()
}

#[test_log::test]
fn test_formula_sees_remapped_sample() {
    let mapped = Channel::new(2, 1, vec![0, FULL_SCALE]).unwrap();
    let out = channel_formula("1-x1", false, 0).apply(&mapped, &mapped, 2).unwrap();
    assert_eq!(out.samples(), &[FULL_SCALE, 0]);
}

#[test_log::test]
fn test_formula_sees_raw_sample_and_position() {
    let mapped = Channel::new(1, 4, vec![0; 4]).unwrap();
    let raw = Channel::new(1, 4, vec![FULL_SCALE; 4]).unwrap();
    let out = channel_formula("x3", false, 0).apply(&mapped, &raw, 1).unwrap();
    assert_eq!(out.samples(), &[FULL_SCALE; 4]);

    // x2 = column/width + (row/height)i
    let out = channel_formula("x2", true, 0).apply(&mapped, &raw, 1).unwrap();
    assert_eq!(out.samples(), &[0, 16383, 32767, 49151]);
}

#[test_log::test]
fn test_formula_trace_follows_each_column() {
    let mapped = Channel::new(2, 3, vec![0; 6]).unwrap();
    let out = channel_formula("x4/2", false, 0).apply(&mapped, &mapped, 2).unwrap();
    assert_eq!(out.column(0), &[32767, 16383, 8191]);
    assert_eq!(out.column(1), out.column(0));
}

#[test_log::test]
fn test_formula_result_is_clamped() {
    let mapped = Channel::new(1, 2, vec![0, FULL_SCALE]).unwrap();
    let out = channel_formula("x1*4-2", false, 0).apply(&mapped, &mapped, 1).unwrap();
    assert_eq!(out.samples(), &[0, FULL_SCALE]);
}

#[test_log::test]
fn test_cache_level_selects_key_arguments() {
    let mapped = Channel::new(1, 4, vec![0; 4]).unwrap();

    let by_sample = channel_formula("x2", true, 1);
    let out = by_sample.apply(&mapped, &mapped, 1).unwrap();
    // Keyed by x1 only: the first row's result is reused down the column.
    assert_eq!(out.samples(), &[0; 4]);
    assert_eq!((by_sample.cache().len(), by_sample.cache().hits()), (1, 3));

    let by_position = channel_formula("x2", true, 2);
    let out = by_position.apply(&mapped, &mapped, 1).unwrap();
    assert_eq!(out.samples(), &[0, 16383, 32767, 49151]);
    assert_eq!((by_position.cache().len(), by_position.cache().hits()), (4, 0));

    let uncached = channel_formula("x2", true, 0);
    uncached.apply(&mapped, &mapped, 1).unwrap();
    assert!(uncached.cache().is_empty());
}

#[test_log::test]
fn test_channel_formula_rejects_bad_input() {
    assert!(matches!(ArgCache::new(MAX_CACHE_LEVEL + 1), Err(Error::InvalidParameter(_))));
    let formula = crate::expr::Formula::compile("x1+", crate::expr::Mode::Complex, None).unwrap();
    assert!(ChannelFormula::new(formula, false, 0).unwrap_err().is_parse());

    let f = channel_formula("x1", false, 0);
    let a = Channel::new(1, 2, vec![0, 0]).unwrap();
    let b = Channel::new(2, 1, vec![0, 0]).unwrap();
    assert!(matches!(f.apply(&a, &b, 1), Err(Error::InvalidParameter(_))));
}

// --- Contour lines ---

#[test_log::test]
fn test_line_thresholds_split_range_evenly() {
    let one = ContourLines { count: 1, ..Default::default() };
    assert_eq!(one.thresholds(), vec![32767]);
    let three = ContourLines { count: 3, ..Default::default() };
    assert_eq!(three.thresholds(), vec![16383, 32767, 49151]);
}

#[test_log::test]
fn test_lines_mark_straddling_neighbours() {
    let row = Channel::new(4, 1, vec![0, 20000, 40000, 60000]).unwrap();
    let lines = ContourLines { count: 1, ..Default::default() };
    assert_eq!(lines.draw(&row).unwrap().samples(), &[0, FULL_SCALE, FULL_SCALE, 0]);

    let lines = ContourLines {
        count: 1,
        edge: Fill::Original,
        surface: Fill::Inverted,
    };
    assert_eq!(lines.draw(&row).unwrap().samples(), &[FULL_SCALE, 20000, 40000, 5535]);

    let column = Channel::new(1, 3, vec![0, 0, FULL_SCALE]).unwrap();
    let lines = ContourLines { count: 1, ..Default::default() };
    assert_eq!(lines.draw(&column).unwrap().samples(), &[0, FULL_SCALE, FULL_SCALE]);
}

#[test_log::test]
fn test_fill_modes() {
    assert_eq!(Fill::try_from(0u8).unwrap().apply(9), 0);
    assert_eq!(Fill::try_from(1u8).unwrap().apply(9), FULL_SCALE);
    assert_eq!(Fill::try_from(2u8).unwrap().apply(9), 9);
    assert_eq!(Fill::try_from(3u8).unwrap().apply(9), FULL_SCALE - 9);
    assert!(Fill::try_from(4u8).is_err());
    for count in [0, MAX_LINES + 1] {
        let lines = ContourLines { count, ..Default::default() };
        assert!(lines.draw(&Channel::new(1, 1, vec![0]).unwrap()).is_err());
    }
}

// --- Remap ---

#[test_log::test]
fn test_remap_chains_clip_formula_and_lines() {
    let mut remap = Remap {
        clip: absolute(21845, 43690),
        formula: Some(channel_formula("1-x1", false, 0)),
        lines: None,
    };
    let out = remap.render(&ramp_field(), Part::Real, None, 2).unwrap();
    assert_eq!(out.samples(), &[FULL_SCALE, FULL_SCALE, 0, 0]);

    // Every sample has a left/right neighbour pair across the middle.
    remap.lines = Some(ContourLines { count: 1, ..Default::default() });
    let out = remap.render(&ramp_field(), Part::Real, None, 2).unwrap();
    assert_eq!(out.samples(), &[FULL_SCALE; 4]);
}
