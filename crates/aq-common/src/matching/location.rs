use crate::{CandidateLocation, JobLocation};

/// Great-circle distance in miles.
pub fn haversine_miles(a: (f64, f64), b: (f64, f64)) -> f64 {
    const EARTH_RADIUS_MILES: f64 = 3959.0;

    let (lat1, lon1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lon2) = (b.0.to_radians(), b.1.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_MILES * h.sqrt().asin()
}

fn distance_score(distance_miles: f64, max_commute_miles: f64) -> f64 {
    if distance_miles <= 5.0 {
        1.0
    } else if distance_miles <= 15.0 {
        0.9
    } else if distance_miles <= max_commute_miles {
        0.7
    } else if distance_miles <= max_commute_miles * 1.5 {
        0.4
    } else {
        0.1
    }
}

fn zip_prefix_score(candidate_zip: &str, job_zip: &str) -> f64 {
    let cand = candidate_zip.trim().as_bytes();
    let job = job_zip.trim().as_bytes();
    if cand.len() >= 3 && job.len() >= 3 && cand[..3] == job[..3] {
        0.8
    } else if cand.len() >= 2 && job.len() >= 2 && cand[..2] == job[..2] {
        0.6
    } else {
        0.3
    }
}

/// Location compatibility in [0, 1]. Remote and hybrid arrangements short-
/// circuit before any geography; otherwise coordinates win over zip codes,
/// and no data at all is scored neutrally.
pub fn score_location(candidate: &CandidateLocation, job: &JobLocation) -> f64 {
    if job.remote && candidate.remote_ok {
        return 1.0;
    }
    if job.hybrid && candidate.hybrid_ok {
        return 0.9;
    }

    if let (Some(cand_coords), Some(job_coords)) = (candidate.coordinates, job.coordinates) {
        let distance = haversine_miles(cand_coords, job_coords);
        return distance_score(distance, candidate.max_commute_miles);
    }

    if let (Some(cand_zip), Some(job_zip)) = (&candidate.zip_code, &job.zip_code) {
        return zip_prefix_score(cand_zip, job_zip);
    }

    0.5
}

#[cfg(test)]
mod tests {
    use super::*;

    fn onsite(coords: Option<(f64, f64)>, zip: Option<&str>) -> JobLocation {
        JobLocation {
            coordinates: coords,
            zip_code: zip.map(String::from),
            remote: false,
            hybrid: false,
        }
    }

    fn candidate_at(coords: Option<(f64, f64)>, zip: Option<&str>) -> CandidateLocation {
        CandidateLocation {
            coordinates: coords,
            zip_code: zip.map(String::from),
            remote_ok: false,
            hybrid_ok: false,
            max_commute_miles: 30.0,
        }
    }

    #[test]
    fn remote_job_with_remote_ok_candidate_is_perfect() {
        let candidate = CandidateLocation::default();
        let job = JobLocation {
            remote: true,
            ..onsite(None, None)
        };
        assert_eq!(score_location(&candidate, &job), 1.0);
    }

    #[test]
    fn hybrid_shortcut_beats_geography() {
        let candidate = CandidateLocation {
            hybrid_ok: true,
            // SF candidate, NYC job: geography alone would score 0.1.
            ..candidate_at(Some((37.7749, -122.4194)), None)
        };
        let job = JobLocation {
            hybrid: true,
            ..onsite(Some((40.7128, -74.0060)), None)
        };
        assert_eq!(score_location(&candidate, &job), 0.9);
    }

    #[test]
    fn haversine_sf_to_nyc_is_roughly_2570_miles() {
        let miles = haversine_miles((37.7749, -122.4194), (40.7128, -74.0060));
        assert!((miles - 2570.0).abs() < 20.0, "got {miles}");
    }

    #[test]
    fn distance_breakpoints_are_monotonic() {
        let max = 30.0;
        let scores: Vec<f64> = [1.0, 10.0, 25.0, 40.0, 100.0]
            .iter()
            .map(|d| distance_score(*d, max))
            .collect();
        assert_eq!(scores, vec![1.0, 0.9, 0.7, 0.4, 0.1]);
        for pair in scores.windows(2) {
            assert!(pair[0] >= pair[1]);
        }
    }

    #[test]
    fn coordinates_take_precedence_over_zip() {
        // Zips agree on all 5 digits but the coordinates are far apart.
        let candidate = candidate_at(Some((37.7749, -122.4194)), Some("94103"));
        let job = onsite(Some((40.7128, -74.0060)), Some("94103"));
        assert_eq!(score_location(&candidate, &job), 0.1);
    }

    #[test]
    fn zip_prefix_fallback_tiers() {
        let candidate = candidate_at(None, Some("94103"));
        assert_eq!(score_location(&candidate, &onsite(None, Some("94110"))), 0.8);
        assert_eq!(score_location(&candidate, &onsite(None, Some("94601"))), 0.6);
        assert_eq!(score_location(&candidate, &onsite(None, Some("10001"))), 0.3);
    }

    #[test]
    fn no_location_data_is_neutral() {
        let candidate = candidate_at(None, None);
        assert_eq!(score_location(&candidate, &onsite(None, None)), 0.5);
    }
}
