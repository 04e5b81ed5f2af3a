//! C `printf` float spellings used in generated kernel code.

/// `%.{digits}a` of a finite `f64`, as glibc prints it.
pub(crate) fn hex_float(value: f64, digits: u32) -> String {
    let sign = if value.is_sign_negative() { "-" } else { "" };
    let bits = value.to_bits();
    let biased = ((bits >> 52) & 0x7ff) as i64;
    let mut mantissa = bits & ((1u64 << 52) - 1);

    if biased == 0 && mantissa == 0 {
        return format!("{sign}0x0.{}p+0", "0".repeat(digits as usize));
    }

    let (mut lead, exponent) = if biased == 0 { (0u64, -1022) } else { (1u64, biased - 1023) };

    let drop = 52 - 4 * digits.min(13);
    if drop > 0 {
        let half = 1u64 << (drop - 1);
        let rest = mantissa & ((1u64 << drop) - 1);
        mantissa >>= drop;
        if rest > half || (rest == half && mantissa & 1 == 1) {
            mantissa += 1;
            if mantissa >> (4 * digits) != 0 {
                mantissa = 0;
                lead += 1;
            }
        }
    }

    let exp_sign = if exponent < 0 { '-' } else { '+' };
    if digits == 0 {
        return format!("{sign}0x{lead}p{exp_sign}{}", exponent.abs());
    }
    format!(
        "{sign}0x{lead}.{mantissa:0width$x}p{exp_sign}{}",
        exponent.abs(),
        width = digits as usize
    )
}

/// `%.4g` of a finite `f64`.
pub(crate) fn short_float(value: f64) -> String {
    const PRECISION: i32 = 4;
    if value == 0.0 {
        return if value.is_sign_negative() { "-0".into() } else { "0".into() };
    }

    let sci = format!("{:.*e}", (PRECISION - 1) as usize, value);
    let (mantissa, exponent) = match sci.split_once('e') {
        Some((m, e)) => (m.to_string(), e.parse::<i32>().unwrap_or(0)),
        None => (sci.clone(), 0),
    };

    if exponent < -4 || exponent >= PRECISION {
        let exp_sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{exp_sign}{:02}", strip_zeros(&mantissa), exponent.abs())
    } else {
        let decimals = (PRECISION - 1 - exponent) as usize;
        strip_zeros(&format!("{value:.decimals$}")).to_string()
    }
}

fn strip_zeros(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_float_matches_printf() {
        assert_eq!(hex_float(1.0, 6), "0x1.000000p+0");
        assert_eq!(hex_float(0.5, 6), "0x1.000000p-1");
        assert_eq!(hex_float(f64::from(0.1f32), 6), "0x1.99999ap-4");
        assert_eq!(hex_float(-3.0, 6), "-0x1.800000p+1");
        assert_eq!(hex_float(0.0, 6), "0x0.000000p+0");
        assert_eq!(hex_float(0.1, 13), "0x1.999999999999ap-4");
    }

    #[test]
    fn short_float_matches_printf() {
        assert_eq!(short_float(1.0), "1");
        assert_eq!(short_float(0.5), "0.5");
        assert_eq!(short_float(f64::from(0.1f32)), "0.1");
        assert_eq!(short_float(1234.5), "1234");
        assert_eq!(short_float(12345.0), "1.234e+04");
        assert_eq!(short_float(0.0001), "0.0001");
        assert_eq!(short_float(0.00001), "1e-05");
        assert_eq!(short_float(-2.5e10), "-2.5e+10");
    }
}
