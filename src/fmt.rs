/// Format a float as a kwacha amount with thousands separators: K1,234.56
pub fn kwacha(val: f64) -> String {
    let negative = val < 0.0;
    let abs = val.abs();
    let cents = format!("{:.2}", abs);
    let parts: Vec<&str> = cents.split('.').collect();
    let int_part = parts[0];
    let dec_part = parts[1];

    let mut with_commas = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_commas.push(',');
        }
        with_commas.push(c);
    }
    let with_commas: String = with_commas.chars().rev().collect();

    if negative {
        format!("-K{with_commas}.{dec_part}")
    } else {
        format!("K{with_commas}.{dec_part}")
    }
}

/// Convert a major-unit amount to minor units (ngwee), rounded to the
/// nearest whole ngwee.
pub fn minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Clip text to at most `max` characters, on a char boundary.
pub fn clip(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.trim().to_string();
    }
    text.chars().take(max).collect::<String>().trim_end().to_string()
}
