//! Section pricing for partial-route bookings.
//!
//! A route with `L` stops is split into `L - 1` equal segments. Travelling from stop `i`
//! to stop `j` (with `i < j`) costs `(j - i)` segments of the full-route price. Any
//! selection that cannot be priced this way is charged the full-route price.

/// Price for a booking section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FareQuote {
    /// Price of one seat for the selected section.
    pub price_per_seat: f64,
    /// `price_per_seat * seats`.
    pub total: f64,
}

/// Per-seat price for travelling from `start` to `end` along `stops`.
///
/// Falls back to `full_price` when there are fewer than two stops, when either stop is
/// not on the route, or when `start` does not come strictly before `end`. Boarding and
/// alighting at the same stop therefore also costs the full price.
pub fn section_price_per_seat(stops: &[String], full_price: f64, start: &str, end: &str) -> f64 {
    if stops.len() < 2 {
        return full_price;
    }

    let from = stops.iter().position(|stop| stop == start);
    let to = stops.iter().position(|stop| stop == end);
    let (from, to) = match (from, to) {
        (Some(from), Some(to)) if from < to => (from, to),
        _ => return full_price,
    };

    let segments = (stops.len() - 1) as f64;
    (to - from) as f64 * full_price / segments
}

/// Quote for `seats` seats on the selected section.
///
/// `seats` is expected to be clamped by the caller; see [`clamp_seats`].
pub fn quote(stops: &[String], full_price: f64, start: &str, end: &str, seats: u32) -> FareQuote {
    let price_per_seat = section_price_per_seat(stops, full_price, start, end);
    FareQuote {
        price_per_seat,
        total: price_per_seat * f64::from(seats),
    }
}

/// Clamp a requested seat count to `[1, capacity]`.
pub fn clamp_seats(requested: u32, capacity: u32) -> u32 {
    requested.clamp(1, capacity.max(1))
}

/// Full-route selection used to pre-fill the booking form.
pub fn default_section(stops: &[String]) -> Option<(String, String)> {
    match (stops.first(), stops.last()) {
        (Some(first), Some(last)) if stops.len() >= 2 => Some((first.clone(), last.clone())),
        _ => None,
    }
}

/// Render an amount as `LKR 1,234.50`.
pub fn format_lkr(value: f64) -> String {
    let rounded = format!("{:.2}", value.abs());
    let (whole, fraction) = rounded.split_once('.').unwrap_or((rounded.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (idx, ch) in whole.chars().enumerate() {
        if idx > 0 && (whole.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && rounded != "0.00" { "-" } else { "" };
    format!("LKR {sign}{grouped}.{fraction}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stops(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn prices_sections_by_segment_count() {
        let route = stops(&["A", "B", "C", "D"]);
        assert_eq!(section_price_per_seat(&route, 300.0, "A", "B"), 100.0);
        assert_eq!(section_price_per_seat(&route, 300.0, "A", "C"), 200.0);
        assert_eq!(section_price_per_seat(&route, 300.0, "A", "D"), 300.0);
        assert_eq!(section_price_per_seat(&route, 300.0, "B", "D"), 200.0);

        let fare = quote(&route, 300.0, "A", "C", 2);
        assert_eq!(fare.price_per_seat, 200.0);
        assert_eq!(fare.total, 400.0);
    }

    #[test]
    fn unpriceable_selections_charge_full_route() {
        let route = stops(&["A", "B", "C", "D"]);
        assert_eq!(section_price_per_seat(&route, 300.0, "D", "A"), 300.0);
        assert_eq!(section_price_per_seat(&route, 300.0, "X", "C"), 300.0);
        assert_eq!(section_price_per_seat(&route, 300.0, "A", "Z"), 300.0);
        assert_eq!(section_price_per_seat(&route, 300.0, "B", "B"), 300.0);

        assert_eq!(section_price_per_seat(&[], 300.0, "A", "B"), 300.0);
        assert_eq!(section_price_per_seat(&stops(&["A"]), 300.0, "A", "A"), 300.0);
    }

    #[test]
    fn section_price_never_exceeds_full_price() {
        let route = stops(&["Colombo", "Kadawatha", "Nittambuwa", "Kegalle", "Mawanella", "Kandy"]);
        for (i, start) in route.iter().enumerate() {
            for end in &route[i..] {
                let price = section_price_per_seat(&route, 850.0, start, end);
                assert!(price <= 850.0 + f64::EPSILON, "{start}->{end} = {price}");
                assert!(price >= 0.0);
            }
        }
    }

    #[test]
    fn no_internal_rounding() {
        let route = stops(&["A", "B", "C", "D"]);
        let price = section_price_per_seat(&route, 100.0, "A", "B");
        assert_eq!(price, 100.0 / 3.0);
        assert_eq!(format_lkr(price), "LKR 33.33");
    }

    #[test]
    fn seats_clamped_to_capacity() {
        assert_eq!(clamp_seats(0, 40), 1);
        assert_eq!(clamp_seats(12, 40), 12);
        assert_eq!(clamp_seats(99, 40), 40);
        assert_eq!(clamp_seats(3, 0), 1);
    }

    #[test]
    fn default_section_spans_full_route() {
        assert_eq!(
            default_section(&stops(&["A", "B", "C"])),
            Some(("A".to_string(), "C".to_string()))
        );
        assert_eq!(default_section(&stops(&["A"])), None);
    }

    #[test]
    fn formats_lkr_with_grouping() {
        assert_eq!(format_lkr(0.0), "LKR 0.00");
        assert_eq!(format_lkr(450.5), "LKR 450.50");
        assert_eq!(format_lkr(1234.5), "LKR 1,234.50");
        assert_eq!(format_lkr(1_234_567.891), "LKR 1,234,567.89");
        assert_eq!(format_lkr(-12.0), "LKR -12.00");
    }
}
