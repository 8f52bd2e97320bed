//! Projection of scored features to the fixed reporting schema.

use std::cmp::Ordering;

use crash_score_network_models::{ResultRow, ScoredFeature};

/// Orders features highest EPDO index first.
///
/// Ties are broken by total crash count (descending) and then by feature
/// id, so the order is fully determined by the data.
pub fn rank(features: &mut [&ScoredFeature]) {
    features.sort_by(|a, b| compare(a, b));
}

/// Projects features to [`ResultRow`]s, keeping their order.
#[must_use]
pub fn project(ranked: &[&ScoredFeature]) -> Vec<ResultRow> {
    ranked.iter().copied().map(ResultRow::from).collect()
}

fn compare(a: &ScoredFeature, b: &ScoredFeature) -> Ordering {
    b.score
        .epdo_index
        .total_cmp(&a.score.epdo_index)
        .then_with(|| b.counts.total.cmp(&a.counts.total))
        .then_with(|| a.feature.id.cmp(&b.feature.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crash_score_network_models::{FeatureKind, FeatureScore, NetworkFeature, TierCounts};
    use geo::MultiPolygon;

    fn scored(id: &str, total: u64, epdo_index: f64) -> ScoredFeature {
        ScoredFeature {
            feature: NetworkFeature {
                id: id.to_string(),
                kind: FeatureKind::Segment,
                name: format!("Segment {id}"),
                length: Some(100.0),
                geometry: MultiPolygon(vec![]),
            },
            counts: TierCounts {
                possible: 1,
                total,
                ..TierCounts::default()
            },
            score: FeatureScore {
                pdo_count: total - 1,
                epdo_index,
            },
        }
    }

    #[test]
    fn rows_ranked_by_index_then_total_then_id() {
        let a = scored("a", 4, 2.0);
        let b = scored("b", 5, 2.0);
        let c = scored("c", 3, 7.5);
        let d = scored("d", 4, 2.0);

        let mut ranked = vec![&a, &b, &c, &d];
        rank(&mut ranked);
        let rows = project(&ranked);
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a", "d"]);
    }

    #[test]
    fn row_carries_projected_fields() {
        let s = scored("seg-1", 3, 1.5);
        let rows = project(&[&s]);
        let row = &rows[0];
        assert_eq!(row.name, "Segment seg-1");
        assert_eq!(row.length, Some(100.0));
        assert_eq!(row.total_count, 3);
        assert_eq!(row.sum_possible_count, 1);
        assert_eq!(row.pdo_count, 2);
    }
}
