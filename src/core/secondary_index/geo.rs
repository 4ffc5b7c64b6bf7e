//! Geohash (Z-order interleaved bit hash) encode/decode and Haversine
//! distance, used by the geo index flavor's box and radius queries.

const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Encodes `(lat, lon)` into a hex string of `bits / 4` characters
/// (`bits` must be a multiple of 4; default precision is 48 bits = 12 hex
/// chars, matching this store's default geo precision).
pub fn encode_geohash(lat: f64, lon: f64, bits: u32) -> String {
    let interleaved = interleave(lat, lon, bits);
    let hex_chars = (bits as usize).div_ceil(4);
    format!("{interleaved:0width$x}", width = hex_chars)
}

pub fn decode_geohash(hash: &str, bits: u32) -> Option<(f64, f64)> {
    let interleaved = u64::from_str_radix(hash, 16).ok()?;
    Some(deinterleave(interleaved, bits))
}

fn interleave(lat: f64, lon: f64, bits: u32) -> u64 {
    let half = bits / 2;
    let lat_bits = quantize(lat, -90.0, 90.0, half);
    let lon_bits = quantize(lon, -180.0, 180.0, half);
    let mut result: u64 = 0;
    for i in 0..half {
        let lat_bit = (lat_bits >> (half - 1 - i)) & 1;
        let lon_bit = (lon_bits >> (half - 1 - i)) & 1;
        result = (result << 1) | u64::from(lon_bit);
        result = (result << 1) | u64::from(lat_bit);
    }
    result
}

fn deinterleave(value: u64, bits: u32) -> (f64, f64) {
    let half = bits / 2;
    let mut lat_bits: u64 = 0;
    let mut lon_bits: u64 = 0;
    for i in 0..half {
        let shift = 2 * (half - 1 - i);
        let lat_bit = (value >> shift) & 1;
        let lon_bit = (value >> (shift + 1)) & 1;
        lat_bits = (lat_bits << 1) | lat_bit;
        lon_bits = (lon_bits << 1) | lon_bit;
    }
    (dequantize(lat_bits, -90.0, 90.0, half), dequantize(lon_bits, -180.0, 180.0, half))
}

fn quantize(value: f64, min: f64, max: f64, bits: u32) -> u64 {
    let clamped = value.clamp(min, max);
    let scale = ((1u64 << bits) - 1) as f64;
    (((clamped - min) / (max - min)) * scale).round() as u64
}

fn dequantize(bits_value: u64, min: f64, max: f64, bits: u32) -> f64 {
    let scale = ((1u64 << bits) - 1) as f64;
    min + (bits_value as f64 / scale) * (max - min)
}

/// Great-circle distance between two points in kilometers.
pub fn haversine(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lat1, lon1) = a;
    let (lat2, lon2) = b;
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let lat1_r = lat1.to_radians();
    let lat2_r = lat2.to_radians();
    let h = (d_lat / 2.0).sin().powi(2) + lat1_r.cos() * lat2_r.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Computes the geohash prefixes (at a coarser resolution than the full
/// index precision) that cover a bounding box, by sampling a coarse grid
/// over the box and deduping hash prefixes at `prefix_bits`.
pub fn bbox_prefixes(
    min_lat: f64,
    min_lon: f64,
    max_lat: f64,
    max_lon: f64,
    full_bits: u32,
    prefix_bits: u32,
) -> Vec<String> {
    let steps = 8u32;
    let mut prefixes = std::collections::BTreeSet::new();
    for i in 0..=steps {
        for j in 0..=steps {
            let lat = min_lat + (max_lat - min_lat) * (i as f64 / steps as f64);
            let lon = min_lon + (max_lon - min_lon) * (j as f64 / steps as f64);
            let full_hash = encode_geohash(lat, lon, full_bits);
            let prefix_chars = (prefix_bits as usize).div_ceil(4);
            prefixes.insert(full_hash[..prefix_chars.min(full_hash.len())].to_string());
        }
    }
    prefixes.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn encode_decode_round_trip_is_within_error_bound() {
        let point = (40.7128, -74.0060);
        let hash = encode_geohash(point.0, point.1, 48);
        let decoded = decode_geohash(&hash, 48).unwrap();
        let error_km = haversine(point, decoded);
        assert!(error_km < 0.01, "round-trip error {error_km} km too large");
    }

    #[test]
    fn haversine_zero_distance_for_identical_points() {
        assert_relative_eq!(haversine((10.0, 10.0), (10.0, 10.0)), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn haversine_known_distance_nyc_to_london_is_approximately_correct() {
        let nyc = (40.7128, -74.0060);
        let london = (51.5074, -0.1278);
        let km = haversine(nyc, london);
        assert!((5500.0..5700.0).contains(&km), "got {km}");
    }

    #[test]
    fn bbox_prefixes_covers_enclosing_cell() {
        let prefixes = bbox_prefixes(40.0, -75.0, 41.0, -73.0, 48, 20);
        assert!(!prefixes.is_empty());
    }
}
