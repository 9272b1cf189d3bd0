pub fn time_str(sec: f64) -> String {
    let sign = if sec < 0.0 { "-" } else { "" };
    let ms = (sec.abs() * 1000f64).round();
    let hours = (ms / 3600000f64) as u64;
    let minutes = ((ms % 3600000f64) / 60000f64) as u64;
    let seconds = ((ms % 60000f64) / 1000f64) as u64;
    let milliseconds = (ms % 1000f64) as u64;

    format!(
        "{sign}{hours:0width$}:{minutes:02}:{seconds:02}.{milliseconds:03}",
        width = if hours >= 100 { 0 } else { 2 }
    )
}

/// Offset in milliseconds with an explicit sign.
pub fn offset_str(sec: f64) -> String {
    format!("{:+.3} ms", sec * 1000f64)
}

#[test]
fn test_time_str() {
    assert_eq!(time_str(0.0), "00:00:00.000");
    assert_eq!(time_str(3.04), "00:00:03.040");
    assert_eq!(time_str(3725.5), "01:02:05.500");
    assert_eq!(time_str(-0.25), "-00:00:00.250");
    assert_eq!(time_str(360000.0), "100:00:00.000");
}

#[test]
fn test_offset_str() {
    assert_eq!(offset_str(0.0375), "+37.500 ms");
    assert_eq!(offset_str(-0.5), "-500.000 ms");
}
