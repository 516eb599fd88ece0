use llamaband::domain::units::{from_base_units, to_base_units};
use llamaband::engine::oracle_price_band;
use llamaband::{BandGeometry, Decimal, LendError};

fn d(s: &str) -> Decimal {
    Decimal::from_str_canonical(s).unwrap()
}

#[test]
fn test_reference_values_a100() {
    let g = BandGeometry::new(100, d("1.0")).unwrap();
    assert_eq!(g.tick_price(1).unwrap(), d("0.99"));
    assert_eq!(g.range_width_pct(1).unwrap(), d("1"));
    assert_eq!(oracle_price_band(d("0.98"), d("1.0"), 100).unwrap(), 2);
}

#[test]
fn test_fine_grained_walk_truncates_every_step() {
    // A=7 steps by 857142857142857142 / 1e18; rounding any step up shows by n=162.
    let g = BandGeometry::new(7, d("1")).unwrap();
    assert_eq!(g.tick_price(162).unwrap(), d("0.000000000014276441"));
    assert_eq!(g.tick_price(300).unwrap(), Decimal::zero());
}

#[test]
fn test_ticks_strictly_decrease() {
    for (a, base) in [(30u64, "3000"), (100, "1.0"), (1000, "65000.5")] {
        let g = BandGeometry::new(a, d(base)).unwrap();
        for n in -20i64..40 {
            let upper = g.tick_price(n).unwrap();
            let lower = g.tick_price(n + 1).unwrap();
            assert!(lower < upper, "A={} n={}: {} !< {}", a, n, lower, upper);
            assert_eq!(g.band_prices(n).unwrap(), [lower, upper]);
        }
    }
}

#[test]
fn test_range_width_strictly_increases() {
    let g = BandGeometry::new(50, d("2000")).unwrap();
    assert_eq!(g.range_width_pct(0).unwrap(), Decimal::zero());
    let mut previous = Decimal::zero();
    for range in 1..=50 {
        let pct = g.range_width_pct(range).unwrap();
        assert!(pct > previous);
        assert!(pct < d("100"));
        previous = pct;
    }
}

#[test]
fn test_oracle_band_contains_oracle_price() {
    let g = BandGeometry::new(100, d("2500")).unwrap();
    for oracle in ["2500", "2499.99", "2400", "2100.5", "2600", "3100"] {
        let oracle = d(oracle);
        let n = g.oracle_price_band(oracle).unwrap();
        let [lower, upper] = g.band_prices(n).unwrap();
        assert!(
            lower < oracle && oracle <= upper,
            "{} not in band {} = ({}, {}]",
            oracle,
            n,
            lower,
            upper
        );
    }
}

#[test]
fn test_invalid_inputs_fail_as_domain_errors() {
    assert!(matches!(
        BandGeometry::new(1, d("1")),
        Err(LendError::Domain(_))
    ));
    assert!(matches!(
        oracle_price_band(d("-1"), d("1"), 100),
        Err(LendError::Domain(_))
    ));
}

#[test]
fn test_unit_conversion_truncates() {
    for (s, decimals, expected) in [
        ("1.123456789", 6u8, "1.123456"),
        ("0.5", 18, "0.5"),
        ("42", 0, "42.0"),
        ("0.0000001", 6, "0.0"),
    ] {
        let units = to_base_units(s, decimals).unwrap();
        assert_eq!(from_base_units(units, decimals), expected);
    }
}
