//! Cluster description: member statistics to a human-readable label.
//!
//! Labels are pure functions of the member multiset; shuffling the member
//! list never changes the output. Every mode computation breaks ties by
//! the smallest key, so composites are stable across re-renders.

use std::collections::BTreeMap;

use crate::record::StudentRecord;

/// Mean-GWA achievement band (0-100 scale, higher is better).
fn achievement_tier(mean_gwa: Option<f64>) -> &'static str {
    // The 90 boundary matches the lowest honors band, so "High-achieving"
    // clusters are the ones whose average member holds an honors tier.
    match mean_gwa {
        Some(g) if g >= 90.0 => "High-achieving",
        Some(g) if g >= 85.0 => "Above-average",
        Some(g) if g >= 75.0 => "Average-performing",
        Some(_) => "Developing",
        None => "Ungraded",
    }
}

/// Most frequent value, smallest key on ties. `BTreeMap` keeps the
/// iteration order deterministic regardless of insertion order.
fn mode<K: Ord>(values: impl Iterator<Item = K>) -> Option<K> {
    let mut counts: BTreeMap<K, usize> = BTreeMap::new();
    for value in values {
        *counts.entry(value).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        .map(|(k, _)| k)
}

fn mean_gwa(members: &[&StudentRecord]) -> Option<f64> {
    let grades: Vec<f64> = members.iter().filter_map(|m| m.gwa).collect();
    if grades.is_empty() {
        None
    } else {
        Some(grades.iter().sum::<f64>() / grades.len() as f64)
    }
}

fn location_phrase(members: &[&StudentRecord]) -> String {
    use crate::record::LocationCategory::{Lowland, Upland};

    let upland = members.iter().filter(|m| m.location() == Upland).count();
    let lowland = members.iter().filter(|m| m.location() == Lowland).count();

    if upland == 0 && lowland == 0 {
        "unknown location".to_string()
    } else if upland > lowland {
        "mostly Upland".to_string()
    } else if lowland > upland {
        "mostly Lowland".to_string()
    } else {
        "mixed-location".to_string()
    }
}

fn income_phrase(members: &[&StudentRecord]) -> String {
    use crate::record::IncomeBracket;

    let bracket = mode(
        members
            .iter()
            .map(|m| m.income_bracket())
            .filter(|b| *b != IncomeBracket::NoIncomeEntered),
    );
    match bracket {
        Some(b) => format!("predominantly {b} income"),
        None => "no income data".to_string(),
    }
}

fn shs_phrase(members: &[&StudentRecord]) -> String {
    let shs = mode(
        members
            .iter()
            .filter_map(|m| m.shs_type.as_deref())
            .map(|s| {
                let lowered = s.trim().to_lowercase();
                match lowered.as_str() {
                    "public" => "Public",
                    "private" => "Private",
                    _ => "Unknown",
                }
            }),
    );
    match shs {
        Some(s) => format!("mainly {s} SHS graduates"),
        None => "unknown SHS background".to_string(),
    }
}

fn honors_phrase(members: &[&StudentRecord]) -> String {
    use crate::record::Honors;

    let tier = mode(
        members
            .iter()
            .map(|m| m.honors())
            .filter(|h| *h != Honors::NoGwaEntered),
    );
    match tier {
        Some(h) => format!("honors profile: {h}"),
        None => "honors profile: No GWA Entered".to_string(),
    }
}

/// Compose the cluster label from achievement, location, income, SHS type,
/// and the dominant honors tier of the members.
pub fn describe_cluster(members: &[&StudentRecord]) -> String {
    if members.is_empty() {
        return "Empty cluster".to_string();
    }

    format!(
        "{} students, {}, {}, {}; {}",
        achievement_tier(mean_gwa(members)),
        location_phrase(members),
        income_phrase(members),
        shs_phrase(members),
        honors_phrase(members),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(gwa: f64, income: f64, municipality: &str, shs: &str) -> StudentRecord {
        StudentRecord {
            id: 0,
            firstname: Some("Ana".to_string()),
            lastname: Some("Reyes".to_string()),
            sex: Some("Female".to_string()),
            program: Some("BSIT".to_string()),
            municipality: Some(municipality.to_string()),
            income: Some(income),
            shs_type: Some(shs.to_string()),
            gwa: Some(gwa),
            all_pass: true,
            conduct_issue: false,
        }
    }

    #[test]
    fn high_achieving_cluster_is_labeled_as_such() {
        let members = vec![
            member(97.0, 200_000.0, "Majayjay", "Private"),
            member(96.0, 250_000.0, "Luisiana", "Private"),
            member(98.5, 260_000.0, "Majayjay", "Private"),
        ];
        let refs: Vec<&StudentRecord> = members.iter().collect();
        let label = describe_cluster(&refs);
        assert!(label.starts_with("High-achieving"), "got: {label}");
        assert!(label.contains("mostly Upland"));
        assert!(label.contains("Private SHS"));
    }

    #[test]
    fn low_achieving_cluster_is_not_high_achieving() {
        let members = vec![
            member(60.0, 8_000.0, "Pila", "Public"),
            member(55.0, 9_000.0, "Pila", "Public"),
        ];
        let refs: Vec<&StudentRecord> = members.iter().collect();
        let label = describe_cluster(&refs);
        assert!(!label.contains("High-achieving"));
        assert!(label.contains("Poor income"));
        assert!(label.contains("mostly Lowland"));
    }

    #[test]
    fn description_is_order_independent() {
        let members = vec![
            member(92.0, 30_000.0, "Pila", "Public"),
            member(88.0, 14_000.0, "Majayjay", "Private"),
            member(95.0, 30_000.0, "Victoria", "Public"),
            member(79.0, 50_000.0, "Cavinti", "Public"),
        ];
        let forward: Vec<&StudentRecord> = members.iter().collect();
        let mut backward = forward.clone();
        backward.reverse();
        assert_eq!(describe_cluster(&forward), describe_cluster(&backward));
    }

    #[test]
    fn location_tie_reads_mixed() {
        let members = vec![
            member(90.0, 20_000.0, "Majayjay", "Public"),
            member(90.0, 20_000.0, "Pila", "Public"),
        ];
        let refs: Vec<&StudentRecord> = members.iter().collect();
        assert!(describe_cluster(&refs).contains("mixed-location"));
    }

    #[test]
    fn empty_cluster_has_a_stable_label() {
        assert_eq!(describe_cluster(&[]), "Empty cluster");
    }
}
