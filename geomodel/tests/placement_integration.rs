//! Integration tests for model placement.
//!
//! These tests drive the public loader API against a counting fetcher and a
//! headless scene:
//! - Shared fetches for concurrent cached requests
//! - Placement transforms and redraw requests
//! - Instance lifecycle (destroy, failures, events)
//!
//! Run with: `cargo test --test placement_integration`

use std::f64::consts::{FRAC_PI_2, PI};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use glam::DVec3;

use geomodel::asset::{
    AnimationClip, GltfAsset, Interpolation, KeyframeTrack, SceneNode, TrackValues,
};
use geomodel::cache::{AssetCache, CacheConfig, CacheError};
use geomodel::fetch::{AssetFetcher, BoxFuture, FetchError, LoaderOptions};
use geomodel::scene::HeadlessScene;
use geomodel::transform::Rotation;
use geomodel::{ModelError, ModelEvent, ModelLoader, ModelState, PlacementRequest};

// ============================================================================
// Helpers
// ============================================================================

/// Serves a small animated model after a delay and counts fetches.
struct CountingFetcher {
    calls: AtomicUsize,
    delay: Duration,
    failures_left: AtomicUsize,
}

impl CountingFetcher {
    fn new(delay: Duration) -> Arc<Self> {
        Self::failing(delay, 0)
    }

    /// Fails the first `failures` fetches.
    fn failing(delay: Duration, failures: usize) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delay,
            failures_left: AtomicUsize::new(failures),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AssetFetcher for CountingFetcher {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        _options: LoaderOptions,
    ) -> BoxFuture<'a, Result<GltfAsset, FetchError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;

            let failed = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failed {
                return Err(FetchError::Http(format!("connection reset fetching {}", url)));
            }
            Ok(truck())
        })
    }
}

fn truck() -> GltfAsset {
    let mut wheel = SceneNode::group("wheel");
    wheel.source_index = Some(1);
    wheel.mesh = Some(0);
    let mut body = SceneNode::group("body");
    body.source_index = Some(0);
    body.mesh = Some(1);

    let spin = AnimationClip::new(
        "spin",
        vec![KeyframeTrack {
            node: 1,
            times: vec![0.0, 1.0],
            values: TrackValues::Translation(vec![[0.0, 0.0, 0.0], [2.0, 0.0, 0.0]]),
            interpolation: Interpolation::Linear,
        }],
    );
    GltfAsset::new(SceneNode::group("Scene").with_child(body.with_child(wheel)), vec![spin])
}

fn setup(fetcher: Arc<CountingFetcher>, config: CacheConfig) -> (ModelLoader, Arc<HeadlessScene>) {
    let loader = ModelLoader::new(fetcher, Arc::new(AssetCache::new(config)));
    (loader, Arc::new(HeadlessScene::default()))
}

// ============================================================================
// Shared fetches
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_two_cached_requests_share_one_fetch() {
    let fetcher = CountingFetcher::new(Duration::from_millis(250));
    let (loader, scene) = setup(fetcher.clone(), CacheConfig::default());

    let request = || {
        PlacementRequest::new("a.glb")
            .with_position([10.0, 20.0])
            .with_height(5.0)
            .with_scale(2.0)
            .with_cache(true)
    };

    let (first, second) = tokio::join!(
        loader.load(scene.clone(), request()),
        loader.load(scene.clone(), request()),
    );
    let (first, second) = (first.unwrap(), second.unwrap());

    assert_eq!(fetcher.calls(), 1);
    assert_eq!(scene.object_count(), 2);

    let a = first.get_object().unwrap();
    let b = second.get_object().unwrap();
    assert!(!a.same_object(&b));
    for object in [&a, &b] {
        let t = object.transform();
        assert_eq!(t.position.z, 5.0);
        assert_eq!(t.scale, DVec3::splat(2.0));
    }
    assert_eq!(a.transform().position, b.transform().position);

    // the subtrees are independent
    a.write().children[0].name = "renamed".into();
    assert_eq!(b.read().children[0].name, "body");

    let stats = loader.cache().stats();
    assert_eq!(stats.fetches, 1);
    assert_eq!(stats.waits, 1);
    assert_eq!(stats.ready_entries, 1);
}

#[tokio::test(start_paused = true)]
async fn test_many_concurrent_requests_fetch_once() {
    let fetcher = CountingFetcher::new(Duration::from_millis(300));
    let (loader, scene) = setup(fetcher.clone(), CacheConfig::default());

    let instances: Vec<_> = (0..8)
        .map(|i| {
            loader.place(
                scene.clone(),
                PlacementRequest::new("fleet.glb")
                    .with_position([i as f64, 0.0])
                    .with_cache(true),
            )
        })
        .collect();
    for instance in &instances {
        instance.ready().await.unwrap();
    }

    assert_eq!(fetcher.calls(), 1);
    assert_eq!(scene.object_count(), 8);
}

#[tokio::test(start_paused = true)]
async fn test_uncached_requests_fetch_each_time() {
    let fetcher = CountingFetcher::new(Duration::from_millis(50));
    let (loader, scene) = setup(fetcher.clone(), CacheConfig::default());

    let (a, b) = tokio::join!(
        loader.load(scene.clone(), PlacementRequest::new("a.glb")),
        loader.load(scene.clone(), PlacementRequest::new("a.glb")),
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(fetcher.calls(), 2);
    assert!(loader.cache().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_later_request_after_failure_refetches() {
    let fetcher = CountingFetcher::failing(Duration::from_millis(20), 1);
    let (loader, scene) = setup(fetcher.clone(), CacheConfig::default());

    let err = loader
        .load(scene.clone(), PlacementRequest::new("a.glb").with_cache(true))
        .await
        .unwrap_err();
    assert!(matches!(err, ModelError::Load(CacheError::Fetch(_))));
    assert!(!loader.cache().contains("a.glb"));

    loader
        .load(scene.clone(), PlacementRequest::new("a.glb").with_cache(true))
        .await
        .unwrap();
    assert_eq!(fetcher.calls(), 2);
    assert!(loader.cache().is_ready("a.glb"));
}

#[tokio::test(start_paused = true)]
async fn test_waiter_times_out() {
    let fetcher = CountingFetcher::new(Duration::from_secs(10));
    let config = CacheConfig::default().with_max_wait(Duration::from_secs(1));
    let (loader, scene) = setup(fetcher, config);

    let owner = loader.place(scene.clone(), PlacementRequest::new("slow.glb").with_cache(true));
    tokio::time::sleep(Duration::from_millis(10)).await;

    let err = loader
        .load(scene.clone(), PlacementRequest::new("slow.glb").with_cache(true))
        .await
        .unwrap_err();
    assert!(matches!(err, ModelError::Load(CacheError::WaitTimeout { .. })));

    owner.ready().await.unwrap();
}

// ============================================================================
// Placement
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_rotation_then_heading() {
    let (loader, scene) = setup(CountingFetcher::new(Duration::ZERO), CacheConfig::default());
    let model = loader.load(scene, PlacementRequest::new("a.glb")).await.unwrap();

    model.set_rotation(Rotation::new(90.0, 0.0, 0.0)).unwrap();
    model.set_heading(180.0).unwrap();

    let rotation = model.get_object().unwrap().transform().rotation;
    assert!((rotation.x - FRAC_PI_2).abs() < 1e-12);
    assert!((rotation.y - PI).abs() < 1e-12);
    assert_eq!(rotation.z, 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_scalar_and_vector_scale_agree() {
    let (loader, scene) = setup(CountingFetcher::new(Duration::ZERO), CacheConfig::default());
    let a = loader.load(scene.clone(), PlacementRequest::new("a.glb")).await.unwrap();
    let b = loader.load(scene, PlacementRequest::new("a.glb")).await.unwrap();

    a.set_scale(2.0).unwrap();
    b.set_scale([2.0, 2.0, 2.0]).unwrap();

    assert_eq!(
        a.get_object().unwrap().transform().scale,
        b.get_object().unwrap().transform().scale
    );
}

#[tokio::test(start_paused = true)]
async fn test_height_zero_and_omitted() {
    let (loader, scene) = setup(CountingFetcher::new(Duration::ZERO), CacheConfig::default());
    let model = loader
        .load(scene.clone(), PlacementRequest::new("a.glb").with_height(7.0))
        .await
        .unwrap();

    let redraws = scene.redraw_count();
    model.set_height(None).unwrap();
    assert_eq!(model.get_object().unwrap().transform().position.z, 7.0);
    assert_eq!(scene.redraw_count(), redraws);

    model.set_height(0.0).unwrap();
    assert_eq!(model.get_object().unwrap().transform().position.z, 0.0);
    assert_eq!(scene.redraw_count(), redraws + 1);
}

#[tokio::test(start_paused = true)]
async fn test_positions_follow_geography() {
    let (loader, scene) = setup(CountingFetcher::new(Duration::ZERO), CacheConfig::default());
    let east = loader
        .load(scene.clone(), PlacementRequest::new("a.glb").with_position([1.0, 0.0]))
        .await
        .unwrap();
    let north = loader
        .load(scene, PlacementRequest::new("a.glb").with_position([0.0, 1.0]))
        .await
        .unwrap();

    let east = east.get_object().unwrap().transform().position;
    let north = north.get_object().unwrap().transform().position;
    assert!(east.x > 100_000.0 && east.y.abs() < 1e-6);
    assert!(north.y > 100_000.0 && north.x.abs() < 1e-6);
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_destroy_twice_stops_redraws() {
    let (loader, scene) = setup(CountingFetcher::new(Duration::ZERO), CacheConfig::default());
    let model = loader.load(scene.clone(), PlacementRequest::new("a.glb")).await.unwrap();

    model.start_animations().unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(model.is_animating());

    model.destroy();
    model.destroy();
    let redraws = scene.redraw_count();
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert!(model.get_object().is_none());
    assert_eq!(model.state(), ModelState::Destroyed);
    assert_eq!(scene.object_count(), 0);
    assert_eq!(scene.redraw_count(), redraws);
}

#[tokio::test(start_paused = true)]
async fn test_clones_animate_their_own_subtree() {
    let (loader, scene) = setup(CountingFetcher::new(Duration::ZERO), CacheConfig::default());
    let request = || PlacementRequest::new("a.glb").with_cache(true);
    let moving = loader.load(scene.clone(), request()).await.unwrap();
    let parked = loader.load(scene, request()).await.unwrap();

    moving.start_animations().unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    moving.stop_animations();

    let wheel_x = |model: &geomodel::ModelInstance| {
        model.get_object().unwrap().read().children[0].children[0].transform.position.x
    };
    assert!(wheel_x(&moving) > 0.0);
    assert_eq!(wheel_x(&parked), 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_destroy_during_load_never_inserts() {
    let fetcher = CountingFetcher::new(Duration::from_secs(1));
    let (loader, scene) = setup(fetcher, CacheConfig::default());

    let model = loader.place(scene.clone(), PlacementRequest::new("a.glb").with_cache(true));
    tokio::time::sleep(Duration::from_millis(100)).await;
    model.destroy();
    assert_eq!(model.ready().await, Err(ModelError::Destroyed));

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(scene.object_count(), 0);
    assert!(!loader.cache().contains("a.glb"));
}

#[tokio::test(start_paused = true)]
async fn test_events_report_outcome() {
    let fetcher = CountingFetcher::failing(Duration::from_millis(10), 1);
    let (loader, scene) = setup(fetcher, CacheConfig::default());

    let failing = loader.place(scene.clone(), PlacementRequest::new("a.glb"));
    let mut events = failing.subscribe();
    match events.recv().await.unwrap() {
        ModelEvent::Failed { url, message } => {
            assert_eq!(url, "a.glb");
            assert!(message.contains("connection reset"));
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert!(matches!(failing.set_scale(1.0), Err(ModelError::LoadFailed(_))));

    let working = loader.place(scene, PlacementRequest::new("a.glb"));
    let mut events = working.subscribe();
    let event = events.recv().await.unwrap();
    assert_eq!(event.name(), "complete");
    if let ModelEvent::Complete { object, animations } = event {
        assert!(object.same_object(&working.get_object().unwrap()));
        assert_eq!(animations.len(), 1);
    }
}
