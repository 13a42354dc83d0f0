use tracing::debug;

/// Parse a listing price string into a non-negative amount.
///
/// Storefront payloads carry prices as display text (`"€129,00"`, `"199.50"`).
/// Currency symbols and whitespace are stripped and a decimal comma is treated
/// as the decimal separator. Missing or unparseable text yields `0.0` — a
/// data-quality condition, not an error.
pub fn parse_price(raw: Option<&str>) -> f64 {
    let Some(raw) = raw else {
        return 0.0;
    };
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '€' | '$' | '£') && !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    match cleaned.parse::<f64>() {
        Ok(amount) if amount >= 0.0 => amount,
        Ok(amount) => {
            debug!(raw, amount, "negative price in listing; storing 0.0");
            0.0
        }
        Err(_) => {
            if !cleaned.is_empty() {
                debug!(raw, "unparseable price in listing; storing 0.0");
            }
            0.0
        }
    }
}
