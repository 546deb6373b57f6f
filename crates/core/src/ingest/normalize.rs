/// Parses a pt-BR formatted number ("1.234,56", "15,3%") into an `f64`.
///
/// Empty cells, "-" and "n/a" are missing data. Anything that does not parse once the locale
/// separators are rewritten is also treated as missing rather than as an error.
pub fn parse_br_number(raw: &str) -> Option<f64> {
    let t = raw.trim();
    if t.is_empty() || t == "-" || t.eq_ignore_ascii_case("n/a") {
        return None;
    }

    let cleaned: String = t
        .chars()
        .filter(|c| *c != '%' && *c != '.')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    cleaned.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
