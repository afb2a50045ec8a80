use super::*;

fn main_640() -> Size {
    Size::new(640, 360).unwrap()
}

fn assert_plan_in_bounds(plan: &LayoutPlan, main: Size) {
    assert!(plan.crop.width >= 1 && plan.crop.width <= main.width);
    assert!(plan.crop.height >= 1 && plan.crop.height <= main.height);
    assert!(plan.crop.x + plan.crop.width <= main.width);
    assert!(plan.crop.y + plan.crop.height <= main.height);
    assert!(plan.offset.x + plan.avatar_size.width <= main.width);
    assert!(plan.offset.y + plan.avatar_size.height <= main.height);
    assert!(plan.avatar_size.width >= 1 && plan.avatar_size.height >= 1);
    plan.validate(main).unwrap();
}

#[test]
fn plans_stay_in_bounds_across_seeds_and_aspects() {
    let planner = LayoutPlanner::default();
    let sizes = [
        main_640(),
        Size::new(1920, 1080).unwrap(),
        Size::new(1, 1).unwrap(),
        Size::new(3, 1000).unwrap(),
    ];
    for main in sizes {
        for aspect in [0.05, 0.5, 1.0, 16.0 / 9.0, 40.0] {
            for seed in 0..64u64 {
                let mut rng = StdRng::seed_from_u64(seed);
                let plan = planner.plan(&mut rng, main, aspect).unwrap();
                assert_plan_in_bounds(&plan, main);
                assert!(plan.zoom_factor >= 1.0 && plan.zoom_factor <= 1.2);
            }
        }
    }
}

#[test]
fn avatar_height_follows_policy_fraction() {
    let planner = LayoutPlanner::default();
    for seed in 0..32u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let plan = planner.plan(&mut rng, main_640(), 1.0).unwrap();
        assert!(plan.avatar_size.height >= 90 && plan.avatar_size.height <= 120);
        assert_eq!(plan.avatar_size.width, plan.avatar_size.height);
    }
}

#[test]
fn too_wide_avatar_is_shrunk_to_fit() {
    let planner = LayoutPlanner::default();
    let mut rng = StdRng::seed_from_u64(3);
    let plan = planner.plan(&mut rng, main_640(), 20.0).unwrap();
    assert_eq!(plan.avatar_size.width, 640);
    assert_eq!(plan.avatar_size.height, 32);
    assert_eq!(plan.offset.x, 0);
}

#[test]
fn zone_rules_pin_the_touching_edge() {
    let main = main_640();
    for zone in [
        PlacementZone::LeftEdge,
        PlacementZone::BottomLeftHalf,
        PlacementZone::TopRightHalf,
        PlacementZone::BottomEdge,
    ] {
        let planner = LayoutPlanner::new(LayoutPolicy {
            zones: vec![zone],
            ..LayoutPolicy::default()
        })
        .unwrap();
        for seed in 0..16u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let plan = planner.plan(&mut rng, main, 16.0 / 9.0).unwrap();
            assert_eq!(plan.zone, zone);
            let a = plan.avatar_size;
            match zone {
                PlacementZone::LeftEdge => assert_eq!(plan.offset.x, 0),
                PlacementZone::BottomLeftHalf => {
                    assert_eq!(plan.offset.y, main.height - a.height);
                    assert!(plan.offset.x <= (main.width / 2).saturating_sub(a.width));
                }
                PlacementZone::TopRightHalf => {
                    assert_eq!(plan.offset.x, main.width - a.width);
                    assert!(plan.offset.y <= (main.height / 2).saturating_sub(a.height));
                }
                PlacementZone::BottomEdge => assert_eq!(plan.offset.y, main.height - a.height),
            }
        }
    }
}

#[test]
fn unit_zoom_crops_the_full_frame() {
    let planner = LayoutPlanner::new(LayoutPolicy {
        zoom_range: [1.0, 1.0],
        ..LayoutPolicy::default()
    })
    .unwrap();
    let mut rng = StdRng::seed_from_u64(9);
    let plan = planner.plan(&mut rng, main_640(), 1.0).unwrap();
    assert_eq!(plan.crop, PixelRect::full(main_640()));
}

#[test]
fn seeded_clip_rng_is_reproducible_per_clip() {
    let planner = LayoutPlanner::default();
    let a = ClipId::new("avatar_a").unwrap();
    let b = ClipId::new("avatar_b").unwrap();

    let p1 = planner.plan(&mut clip_rng(Some(7), &a), main_640(), 1.5).unwrap();
    let p2 = planner.plan(&mut clip_rng(Some(7), &a), main_640(), 1.5).unwrap();
    assert_eq!(p1, p2);

    let distinct = (0..8u64).any(|seed| {
        let pa = planner.plan(&mut clip_rng(Some(seed), &a), main_640(), 1.5).unwrap();
        let pb = planner.plan(&mut clip_rng(Some(seed), &b), main_640(), 1.5).unwrap();
        pa != pb
    });
    assert!(distinct);
}

#[test]
fn invalid_inputs_are_rejected() {
    let planner = LayoutPlanner::default();
    let mut rng = StdRng::seed_from_u64(0);
    assert!(planner.plan(&mut rng, main_640(), 0.0).is_err());
    assert!(planner.plan(&mut rng, main_640(), f64::NAN).is_err());
    assert!(
        planner
            .plan(
                &mut rng,
                Size {
                    width: 0,
                    height: 10
                },
                1.0
            )
            .is_err()
    );
}

#[test]
fn policy_validation_rejects_bad_ranges() {
    let bad_zoom = LayoutPolicy {
        zoom_range: [0.9, 1.2],
        ..LayoutPolicy::default()
    };
    assert!(LayoutPlanner::new(bad_zoom).is_err());
    let bad_fraction = LayoutPolicy {
        avatar_height_fraction: [0.5, 0.25],
        ..LayoutPolicy::default()
    };
    assert!(bad_fraction.validate().is_err());
    let no_zones = LayoutPolicy {
        zones: vec![],
        ..LayoutPolicy::default()
    };
    assert!(no_zones.validate().is_err());
}

#[test]
fn validate_rejects_mismatched_main_size_and_overflow() {
    let planner = LayoutPlanner::default();
    let mut rng = StdRng::seed_from_u64(1);
    let plan = planner.plan(&mut rng, main_640(), 1.0).unwrap();

    let err = plan.validate(Size::new(1280, 720).unwrap()).unwrap_err();
    assert!(matches!(err, OverlayError::Plan(_)));

    let mut shifted = plan.clone();
    shifted.offset.x = 640 - shifted.avatar_size.width + 1;
    assert!(matches!(
        shifted.validate(main_640()).unwrap_err(),
        OverlayError::Plan(_)
    ));
}

#[test]
fn plan_round_trips_through_json() {
    let planner = LayoutPlanner::default();
    let mut rng = StdRng::seed_from_u64(5);
    let plan = planner.plan(&mut rng, main_640(), 1.0).unwrap();
    let json = serde_json::to_string(&plan).unwrap();
    assert!(json.contains("\"zone\""));
    let back: LayoutPlan = serde_json::from_str(&json).unwrap();
    assert_eq!(back, plan);
}
