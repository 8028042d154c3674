use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use floodguard_config::FloodguardConfig;
use floodguard_models::{
    BroadcastEvent, GeoPoint, Notification, NotificationDispatcher, PresenceBroadcaster,
};
use floodguard_routing::{RoutingError, RoutingProvider, SafeRouteResolver};
use floodguard_store::MemoryStore;

use crate::{DriverMatcher, IncidentLifecycleManager};

pub struct StraightLine;

#[async_trait]
impl RoutingProvider for StraightLine {
    async fn route(&self, start: GeoPoint, end: GeoPoint) -> Result<Vec<GeoPoint>, RoutingError> {
        Ok(vec![start, end])
    }
}

pub struct Down;

#[async_trait]
impl RoutingProvider for Down {
    async fn route(&self, _: GeoPoint, _: GeoPoint) -> Result<Vec<GeoPoint>, RoutingError> {
        Err(RoutingError::Parse {
            message: "offline".to_string(),
        })
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Notification>>,
}

impl NotificationDispatcher for RecordingNotifier {
    fn enqueue(&self, notification: Notification) {
        self.sent.lock().unwrap().push(notification);
    }
}

#[derive(Default)]
pub struct RecordingBroadcaster {
    pub events: Mutex<Vec<BroadcastEvent>>,
}

impl PresenceBroadcaster for RecordingBroadcaster {
    fn emit(&self, event: BroadcastEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub matcher: Arc<DriverMatcher>,
    pub lifecycle: IncidentLifecycleManager,
    pub notifier: Arc<RecordingNotifier>,
    pub broadcaster: Arc<RecordingBroadcaster>,
}

pub fn harness() -> Harness {
    harness_with(Arc::new(StraightLine), FloodguardConfig::defaults())
}

pub fn harness_with(provider: Arc<dyn RoutingProvider>, config: FloodguardConfig) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let broadcaster = Arc::new(RecordingBroadcaster::default());
    let resolver = Arc::new(SafeRouteResolver::new(
        provider,
        store.clone(),
        config.routing.clone(),
    ));
    let matcher = Arc::new(DriverMatcher::new(
        store.clone(),
        resolver,
        notifier.clone(),
        broadcaster.clone(),
        config.matching,
    ));
    let lifecycle = IncidentLifecycleManager::new(
        store.clone(),
        matcher.clone(),
        notifier.clone(),
        broadcaster.clone(),
    );

    Harness {
        store,
        matcher,
        lifecycle,
        notifier,
        broadcaster,
    }
}

pub fn p(lat: f64, lon: f64) -> GeoPoint {
    GeoPoint::new(lat, lon).unwrap()
}
