//! Seam between the map pipeline and whatever paints it.
//!
//! The engine is a black box that accepts registered geometry and a
//! declarative [`Scene`]. [`Visualization`] is the host side: it owns one chart
//! instance, keeps it sized, and answers interaction events with tooltips.

use crate::config::{SceneConfig, TooltipStyle};
use crate::data::{GeometryCatalog, RegionCatalog, GEOMETRY_ID};
use crate::processing::{merge, MergeOptions, MergedDataset};
use crate::render::{build_scene, Scene};
use crate::tooltip::{InteractionEvent, TooltipPayload, TooltipResolver};
use crate::types::PointOfInterest;
use geojson::FeatureCollection;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerSize {
    pub width: u32,
    pub height: u32,
}

pub trait ChartHandle {
    fn set_scene(&mut self, scene: &Scene);
    fn resize(&mut self, size: ContainerSize);
    fn dispose(&mut self);
}

pub trait RenderingEngine {
    type Handle: ChartHandle;

    /// Re-registering an id replaces the earlier geometry.
    fn register_geometry(&mut self, id: &str, geometry: FeatureCollection);
    fn create_instance(&mut self, size: ContainerSize) -> Self::Handle;
}

type Listener = Box<dyn FnMut(ContainerSize)>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
}

/// Single-threaded resize notification source, standing in for the window.
#[derive(Clone, Default)]
pub struct ResizeNotifier {
    listeners: Rc<RefCell<Listeners>>,
}

/// Removes its listener when dropped.
pub struct ResizeSubscription {
    id: u64,
    listeners: Rc<RefCell<Listeners>>,
}

impl ResizeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: impl FnMut(ContainerSize) + 'static) -> ResizeSubscription {
        let mut listeners = self.listeners.borrow_mut();
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.entries.push((id, Box::new(listener)));
        ResizeSubscription { id, listeners: Rc::clone(&self.listeners) }
    }

    pub fn notify(&self, size: ContainerSize) {
        for (_, listener) in self.listeners.borrow_mut().entries.iter_mut() {
            listener(size);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().entries.len()
    }
}

impl Drop for ResizeSubscription {
    fn drop(&mut self) {
        self.listeners.borrow_mut().entries.retain(|(id, _)| *id != self.id);
    }
}

/// What the host passes in instead of compiling catalogs into the component.
pub struct VisualizationConfig {
    pub points: Vec<PointOfInterest>,
    pub region_metadata: RegionCatalog,
    pub options: MergeOptions,
    pub scene: SceneConfig,
}

/// One mounted map. Dropping it disposes the chart and unsubscribes from resizes.
pub struct Visualization<H: ChartHandle + 'static> {
    handle: Rc<RefCell<H>>,
    dataset: MergedDataset,
    scene: Scene,
    tooltip_style: TooltipStyle,
    _resize: ResizeSubscription,
}

impl<H: ChartHandle + 'static> Visualization<H> {
    pub fn new<E>(
        engine: &mut E,
        notifier: &ResizeNotifier,
        geometry: &GeometryCatalog,
        config: VisualizationConfig,
    ) -> Self
    where
        E: RenderingEngine<Handle = H>,
    {
        engine.register_geometry(GEOMETRY_ID, geometry.to_feature_collection());

        let dataset = merge(&config.region_metadata, &config.points, config.options);
        let missing = dataset.missing_from(|name| geometry.contains_name(name));
        if !missing.is_empty() {
            warn!(
                "{} catalog regions have no geometry and will not render: {:?}",
                missing.len(),
                missing
            );
        }
        info!("Merged dataset: {:?}", dataset.summary());

        let scene = build_scene(&dataset, &config.scene);
        let size = ContainerSize { width: config.scene.width, height: config.scene.height };

        let mut handle = engine.create_instance(size);
        handle.set_scene(&scene);
        let handle = Rc::new(RefCell::new(handle));

        let resize_target = Rc::clone(&handle);
        let subscription = notifier.subscribe(move |size| {
            debug!("Resizing chart to {}x{}", size.width, size.height);
            resize_target.borrow_mut().resize(size);
        });

        Self {
            handle,
            dataset,
            scene,
            tooltip_style: config.scene.tooltip_style,
            _resize: subscription,
        }
    }

    pub fn dataset(&self) -> &MergedDataset {
        &self.dataset
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn handle(&self) -> std::cell::Ref<'_, H> {
        self.handle.borrow()
    }

    pub fn handle_interaction(&self, event: &InteractionEvent) -> TooltipPayload {
        TooltipResolver::new(&self.dataset).resolve_event(event)
    }

    pub fn tooltip_html(&self, event: &InteractionEvent) -> String {
        self.handle_interaction(event).to_html(self.tooltip_style)
    }
}

impl<H: ChartHandle + 'static> Drop for Visualization<H> {
    fn drop(&mut self) {
        self.handle.borrow_mut().dispose();
    }
}

/// In-memory engine that records what it is asked to draw. Used to export
/// scenes from the CLI and as the engine in tests.
#[derive(Default)]
pub struct SceneRecorder {
    geometries: HashMap<String, FeatureCollection>,
    registrations: usize,
}

#[derive(Debug, Default)]
pub struct RecordedChart {
    pub size: Option<ContainerSize>,
    pub scenes: Vec<Scene>,
    pub resizes: Vec<ContainerSize>,
    // shared so disposal can be observed after the owner is gone
    disposed: Rc<RefCell<bool>>,
}

impl RecordedChart {
    pub fn last_scene(&self) -> Option<&Scene> {
        self.scenes.last()
    }

    pub fn is_disposed(&self) -> bool {
        *self.disposed.borrow()
    }

    pub fn disposal_flag(&self) -> Rc<RefCell<bool>> {
        Rc::clone(&self.disposed)
    }
}

impl ChartHandle for RecordedChart {
    fn set_scene(&mut self, scene: &Scene) {
        self.scenes.push(scene.clone());
    }

    fn resize(&mut self, size: ContainerSize) {
        self.size = Some(size);
        self.resizes.push(size);
    }

    fn dispose(&mut self) {
        *self.disposed.borrow_mut() = true;
    }
}

impl SceneRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn geometry(&self, id: &str) -> Option<&FeatureCollection> {
        self.geometries.get(id)
    }

    pub fn registered_ids(&self) -> usize {
        self.geometries.len()
    }

    pub fn registrations(&self) -> usize {
        self.registrations
    }
}

impl RenderingEngine for SceneRecorder {
    type Handle = RecordedChart;

    fn register_geometry(&mut self, id: &str, geometry: FeatureCollection) {
        self.registrations += 1;
        self.geometries.insert(id.to_string(), geometry);
    }

    fn create_instance(&mut self, size: ContainerSize) -> RecordedChart {
        RecordedChart { size: Some(size), ..Default::default() }
    }
}
