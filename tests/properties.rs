use manifold_field::*;
use num_complex::Complex32;
use proptest::prelude::*;

fn coords(dims: usize) -> impl Strategy<Value = Vec<f32>> {
    prop::collection::vec(-2.0f32..2.0, dims)
}

// Property test: no sequence of adds pushes the field past capacity.
proptest! {
    #[test]
    fn prop_capacity_never_exceeded(
        capacity in 1usize..12,
        points in prop::collection::vec(coords(3), 0..24)
    ) {
        let mut field = Field::new(FieldConfig::new(3, capacity, 2.0)).unwrap();
        for (i, p) in points.into_iter().enumerate() {
            let before = field.num_centers();
            let result = field.add_center(Point::new(p), Complex32::new(1.0, 0.0), 0.3);
            if i < capacity {
                prop_assert!(result.is_ok());
            } else {
                let exhausted = matches!(result, Err(FieldError::CapacityExhausted { .. }));
                prop_assert!(exhausted);
                prop_assert_eq!(field.num_centers(), before);
            }
            prop_assert!(field.num_centers() <= capacity);
        }
    }
}

// Property test: a stored distance survives any amount of unrelated churn
// as long as it keeps being touched.
proptest! {
    #[test]
    fn prop_cache_get_after_put(
        capacity in 2usize..16,
        distance in 0.0f32..100.0,
        churn in prop::collection::vec((coords(2), 0usize..64, 0.0f32..1.0), 0..64)
    ) {
        let mut cache = DistanceCache::new(capacity);
        // Outside the churn coordinate range, so never overwritten.
        let key = PointKey::from_coords(&[10.0, 10.0]);
        cache.put(key.clone(), 7, distance);

        for (c, idx, d) in churn {
            prop_assert_eq!(cache.get(&key, 7), Some(distance));
            cache.put(PointKey::from_coords(&c), idx, d);
        }
        prop_assert_eq!(cache.get(&key, 7), Some(distance));
        prop_assert!(cache.len() <= capacity);
    }
}

// Property test: identity metrics validate in every dimension.
proptest! {
    #[test]
    fn prop_identity_metric_valid(dims in 1usize..10) {
        let metric = Metric::identity(dims);
        prop_assert!(metric.validate());
        prop_assert_eq!(metric.determinant(), 1.0);
    }
}

// Property test: the KD-tree agrees with a linear scan on the nearest distance.
proptest! {
    #[test]
    fn prop_nearest_matches_scan(
        points in prop::collection::vec(coords(4), 1..60),
        query in coords(4)
    ) {
        let points: Vec<Point> = points.into_iter().map(Point::new).collect();
        let query = Point::new(query);
        let index = SpatialIndex::build(&points);

        let best = index.k_nearest(&query, 1)[0].distance;
        let scan = points
            .iter()
            .map(|p| p.euclidean_distance(&query))
            .fold(f32::INFINITY, f32::min);
        prop_assert!((best - scan).abs() < 1e-4);
    }
}

// Property test: lanes and scalar walk agree on random Gaussian fields.
proptest! {
    #[test]
    fn prop_vectorized_matches_scalar(
        centers in prop::collection::vec((coords(5), 0.1f32..1.0, 0.2f32..1.5), 1..30),
        query in coords(5)
    ) {
        let mut field = Field::new(FieldConfig::new(5, 64, 2.0)).unwrap();
        for (p, re, eps) in centers {
            field.add_center(Point::new(p), Complex32::new(re, 0.0), eps).unwrap();
        }
        let eval = VectorizedEvaluator::from_centers(5, field.centers());
        let query = Point::new(query);

        let lanes = eval.evaluate(&query).re;
        let scalar = eval.evaluate_scalar(&query).re;
        prop_assert!((lanes - scalar).abs() <= 1e-4 * scalar.abs().max(1e-3));
    }
}
