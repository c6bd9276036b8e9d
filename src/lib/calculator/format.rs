/// Formats a value the way an en-US locale displays numbers:
/// `,` thousands grouping, at most three fraction digits, no trailing zeros.
pub fn locale_number(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    // `{:.3}` alone rounds ties to even; display rounds them away from zero.
    let magnitude = value.abs();
    let scaled = (magnitude * 1000.0).round() / 1000.0;
    let rounded = format!("{:.3}", if scaled.is_finite() { scaled } else { magnitude });
    let (integer, fraction) = rounded.split_once('.').unwrap_or((&rounded, ""));
    let fraction = fraction.trim_end_matches('0');

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (i, digit) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let is_zero = grouped == "0" && fraction.is_empty();
    let sign = if value.is_sign_negative() && !is_zero { "-" } else { "" };
    if fraction.is_empty() {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}.{fraction}")
    }
}
