//! Text form of floats and doubles, matching `Double.toString`: the shortest
//! decimal that round-trips, laid out in plain notation when the magnitude is
//! in [1e-3, 1e7) and in `E` notation otherwise.

pub fn double_to_string(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }
    // {:e} already produces the shortest round-trippable digits
    layout(&format!("{:e}", value))
}

pub fn float_to_string(value: f32) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }
    layout(&format!("{:e}", value))
}

/// Re-lays out `d[.ddd]e±x` into the Java spelling.
fn layout(exp_form: &str) -> String {
    let (mantissa, exponent) = exp_form
        .split_once('e')
        .unwrap_or((exp_form, "0"));
    let (sign, mantissa) = match mantissa.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", mantissa),
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();

    if (-3..7).contains(&exponent) {
        let mut out = String::from(sign);
        if exponent < 0 {
            out.push_str("0.");
            for _ in 0..(-exponent - 1) {
                out.push('0');
            }
            out.push_str(&digits);
        } else {
            let point = exponent as usize + 1;
            if digits.len() > point {
                out.push_str(&digits[..point]);
                out.push('.');
                out.push_str(&digits[point..]);
            } else {
                out.push_str(&digits);
                for _ in 0..(point - digits.len()) {
                    out.push('0');
                }
                out.push_str(".0");
            }
        }
        out
    } else {
        let mut out = String::from(sign);
        out.push_str(&digits[..1]);
        out.push('.');
        if digits.len() > 1 {
            out.push_str(&digits[1..]);
        } else {
            out.push('0');
        }
        out.push('E');
        out.push_str(&exponent.to_string());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_notation() {
        assert_eq!(double_to_string(0.0), "0.0");
        assert_eq!(double_to_string(-0.0), "-0.0");
        assert_eq!(double_to_string(1.0), "1.0");
        assert_eq!(double_to_string(-12.5), "-12.5");
        assert_eq!(double_to_string(100.0), "100.0");
        assert_eq!(double_to_string(0.001), "0.001");
        assert_eq!(double_to_string(1234567.0), "1234567.0");
        assert_eq!(double_to_string(0.1), "0.1");
    }

    #[test]
    fn scientific_notation() {
        assert_eq!(double_to_string(10000000.0), "1.0E7");
        assert_eq!(double_to_string(0.0001), "1.0E-4");
        assert_eq!(double_to_string(-1.5e10), "-1.5E10");
        assert_eq!(double_to_string(1e-300), "1.0E-300");
    }

    #[test]
    fn special_values() {
        assert_eq!(double_to_string(f64::NAN), "NaN");
        assert_eq!(double_to_string(f64::INFINITY), "Infinity");
        assert_eq!(double_to_string(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(float_to_string(f32::NAN), "NaN");
    }

    #[test]
    fn float_shortest_digits() {
        assert_eq!(float_to_string(0.1), "0.1");
        assert_eq!(float_to_string(3.14), "3.14");
        assert_eq!(float_to_string(-2.5e8), "-2.5E8");
    }
}
