//! Gallery panels: manifest-backed pages of thumbnail tiles.
//!
//! Each gallery window shows one page of its manifest. Tiles ask the
//! thumbnail caches for their texture when spawned and drop the answer if
//! they are despawned first; the load itself keeps running for the cache.
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use bevy::{
    asset::RenderAssetUsages,
    ecs::{lifecycle::HookContext, world::DeferredWorld},
    prelude::*,
};
use tokio::sync::oneshot::{self, error::TryRecvError};

use crate::{
    data::{
        config::ViewerConfig,
        manifest::{load_manifest, ManifestKind},
        settings::Settings,
    },
    startup::runtime::AsyncRuntime,
    systems::{
        interaction::{PointerInput, PointerPhase, PointerSurface},
        thumbnails::{MediaClient, ThumbnailCaches, ThumbnailKind},
        ui::window::{PanelWindow, WindowKey},
    },
};

pub const GALLERY_COLUMNS: usize = 4;
const TILE_GAP: f32 = 0.02;
/// Tiles float just in front of their panel so rays hit them first.
const TILE_DEPTH: f32 = 0.004;
const PANORAMA_RADIUS: f32 = 50.0;

/* ─────────────────────────  PLUGIN  ───────────────────────── */

pub struct GalleryPlugin;
impl Plugin for GalleryPlugin {
    fn build(&self, app: &mut App) {
        app.add_message::<MediaSelected>()
            .add_message::<GalleryCommand>()
            .init_resource::<ManifestRequests>()
            .add_systems(Startup, ManifestRequests::start)
            .add_systems(
                Update,
                (
                    GalleryPage::attach,
                    ManifestRequests::receive,
                    GalleryPage::turn,
                    GalleryTile::respawn_page,
                    TileThumbnail::request,
                    TileThumbnail::receive,
                    GalleryTile::select,
                )
                    .chain(),
            )
            .add_systems(Startup, Panorama::spawn)
            .add_systems(Update, Panorama::show_selection.after(GalleryTile::select));
    }
}

/* ─────────────────────────  MESSAGES  ───────────────────────── */

#[derive(Message, Debug, Clone, PartialEq)]
pub struct MediaSelected {
    pub kind: ManifestKind,
    pub index: usize,
    pub url: String,
    pub texture: Option<Handle<Image>>,
}

#[derive(Message, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GalleryCommand {
    NextPage,
    PreviousPage,
}

/* ─────────────────────────  MANIFESTS  ───────────────────────── */

enum ManifestState {
    Waiting(oneshot::Receiver<Vec<String>>),
    Loaded(Vec<String>),
}

#[derive(Resource, Default)]
pub struct ManifestRequests(HashMap<ManifestKind, ManifestState>);

impl ManifestRequests {
    pub fn loaded(&self, kind: ManifestKind) -> Option<&[String]> {
        match self.0.get(&kind) {
            Some(ManifestState::Loaded(entries)) => Some(entries),
            _ => None,
        }
    }

    fn start(
        mut requests: ResMut<ManifestRequests>,
        config: Res<ViewerConfig>,
        runtime: Option<Res<AsyncRuntime>>,
        client: Option<Res<MediaClient>>,
    ) {
        for kind in [ManifestKind::Images, ManifestKind::Videos] {
            let state = match (&runtime, &client) {
                (Some(runtime), Some(client)) => {
                    let (sender, receiver) = oneshot::channel();
                    let source = Arc::clone(&client.0);
                    let config = config.clone();
                    runtime.spawn(async move {
                        let entries = load_manifest(source.as_ref(), kind, &config).await;
                        let _ = sender.send(entries);
                    });
                    ManifestState::Waiting(receiver)
                }
                _ => {
                    warn!("{kind:?} manifest not fetched: media loading is offline");
                    ManifestState::Loaded(vec![config.asset_path(kind.fallback_name())])
                }
            };
            requests.0.insert(kind, state);
        }
    }

    fn receive(
        mut requests: ResMut<ManifestRequests>,
        config: Res<ViewerConfig>,
        settings: Res<Settings>,
        mut pages: Query<&mut GalleryPage>,
    ) {
        for (kind, state) in requests.0.iter_mut() {
            if let ManifestState::Waiting(receiver) = state {
                match receiver.try_recv() {
                    Ok(entries) => *state = ManifestState::Loaded(entries),
                    Err(TryRecvError::Empty) => {}
                    Err(TryRecvError::Closed) => {
                        warn!("{kind:?} manifest task ended without a listing");
                        *state =
                            ManifestState::Loaded(vec![config.asset_path(kind.fallback_name())]);
                    }
                }
            }
        }

        for mut page in &mut pages {
            if !page.entries.is_empty() {
                continue;
            }
            let Some(entries) = requests.loaded(page.kind) else {
                continue;
            };
            if entries.is_empty() {
                continue;
            }
            let selected = match page.kind {
                ManifestKind::Images => settings.selected_image(),
                ManifestKind::Videos => settings.selected_video(),
            };
            page.entries = entries.to_vec();
            page.page = page.page_of(selected.min(page.entries.len() - 1));
        }
    }
}

/* ─────────────────────────  PAGES  ───────────────────────── */

#[derive(Component, Debug, Clone, PartialEq)]
pub struct GalleryPage {
    pub kind: ManifestKind,
    pub entries: Vec<String>,
    pub page: usize,
    pub page_size: usize,
}

impl GalleryPage {
    pub fn new(kind: ManifestKind, page_size: usize) -> Self {
        Self {
            kind,
            entries: Vec::new(),
            page: 0,
            page_size: page_size.max(1),
        }
    }

    pub fn page_count(&self) -> usize {
        self.entries.len().div_ceil(self.page_size).max(1)
    }

    pub fn page_of(&self, index: usize) -> usize {
        index / self.page_size
    }

    /// `(manifest index, url)` for every entry on the current page.
    pub fn visible(&self) -> impl Iterator<Item = (usize, &str)> {
        self.entries
            .iter()
            .enumerate()
            .skip(self.page * self.page_size)
            .take(self.page_size)
            .map(|(index, url)| (index, url.as_str()))
    }

    /// Moves by `delta` pages, wrapping at either end. Returns whether the
    /// page changed.
    pub fn step(&mut self, delta: isize) -> bool {
        let count = self.page_count() as isize;
        let next = (self.page as isize + delta).rem_euclid(count) as usize;
        if next == self.page {
            return false;
        }
        self.page = next;
        true
    }

    fn kind_for(key: WindowKey) -> Option<ManifestKind> {
        match key {
            WindowKey::Gallery => Some(ManifestKind::Images),
            WindowKey::VideoGallery => Some(ManifestKind::Videos),
            WindowKey::Video => None,
        }
    }

    fn attach(
        mut commands: Commands,
        config: Res<ViewerConfig>,
        windows: Query<(Entity, &PanelWindow), (Added<PanelWindow>, Without<GalleryPage>)>,
    ) {
        for (entity, window) in &windows {
            if let Some(kind) = Self::kind_for(window.key) {
                commands
                    .entity(entity)
                    .insert(GalleryPage::new(kind, config.gallery_page_size));
            }
        }
    }

    fn turn(mut commands: MessageReader<GalleryCommand>, mut pages: Query<&mut GalleryPage>) {
        for command in commands.read() {
            let delta = match command {
                GalleryCommand::NextPage => 1,
                GalleryCommand::PreviousPage => -1,
            };
            for mut page in &mut pages {
                // Only write through when the page moves, so tiles are not rebuilt.
                if page.page_count() > 1 {
                    page.step(delta);
                }
            }
        }
    }
}

/// Local centre and size of the `slot`-th tile on a page of `page_size`
/// tiles laid out row-major over a panel of `panel` metres.
pub fn tile_slot(slot: usize, page_size: usize, panel: Vec2) -> (Vec3, Vec2) {
    let columns = GALLERY_COLUMNS.min(page_size.max(1));
    let rows = page_size.max(1).div_ceil(columns);
    let size = Vec2::new(
        (panel.x - TILE_GAP * (columns as f32 + 1.0)) / columns as f32,
        (panel.y - TILE_GAP * (rows as f32 + 1.0)) / rows as f32,
    )
    .max(Vec2::splat(0.01));
    let (column, row) = (slot % columns, slot / columns);
    let x = -panel.x * 0.5 + TILE_GAP + size.x * 0.5 + column as f32 * (size.x + TILE_GAP);
    let y = panel.y * 0.5 - TILE_GAP - size.y * 0.5 - row as f32 * (size.y + TILE_GAP);
    (Vec3::new(x, y, TILE_DEPTH), size)
}

/* ─────────────────────────  TILES  ───────────────────────── */

#[derive(Component, Debug, Clone, PartialEq)]
#[require(Transform, Visibility, TileThumbnail)]
pub struct GalleryTile {
    pub kind: ManifestKind,
    pub index: usize,
    pub url: String,
}

impl GalleryTile {
    fn respawn_page(
        mut commands: Commands,
        pages: Query<(Entity, &GalleryPage, &PanelWindow), Changed<GalleryPage>>,
        tiles: Query<(Entity, &ChildOf), With<GalleryTile>>,
    ) {
        for (gallery, page, window) in &pages {
            for (tile, child_of) in &tiles {
                if child_of.parent() == gallery {
                    commands.entity(tile).despawn();
                }
            }
            for (slot, (index, url)) in page.visible().enumerate() {
                let (position, size) = tile_slot(slot, page.page_size, window.size);
                commands.spawn((
                    Name::new(format!("gallery_tile_{index}")),
                    GalleryTile {
                        kind: page.kind,
                        index,
                        url: url.to_owned(),
                    },
                    PointerSurface::new(size),
                    Transform::from_translation(position),
                    ChildOf(gallery),
                ));
            }
            debug!(
                "{:?} gallery page {}/{}",
                page.kind,
                page.page + 1,
                page.page_count()
            );
        }
    }

    fn select(
        mut inputs: MessageReader<PointerInput>,
        tiles: Query<(&GalleryTile, &TileThumbnail)>,
        mut settings: ResMut<Settings>,
        mut selected: MessageWriter<MediaSelected>,
    ) {
        for input in inputs.read() {
            if input.phase != PointerPhase::Press || input.device.is_none() {
                continue;
            }
            let Some((tile, thumbnail)) = input.target.and_then(|target| tiles.get(target).ok())
            else {
                continue;
            };
            match tile.kind {
                ManifestKind::Images => settings.set_selected_image(tile.index),
                ManifestKind::Videos => settings.set_selected_video(tile.index),
            }
            selected.write(MediaSelected {
                kind: tile.kind,
                index: tile.index,
                url: tile.url.clone(),
                texture: thumbnail.texture.clone(),
            });
        }
    }
}

/// Per-tile thumbnail request. Despawning the tile raises `cancelled`, so a
/// result that arrives later is discarded instead of applied.
#[derive(Component, Debug, Default)]
#[component(on_remove = TileThumbnail::on_remove)]
pub struct TileThumbnail {
    cancelled: Arc<AtomicBool>,
    receiver: Option<oneshot::Receiver<Option<Handle<Image>>>>,
    texture: Option<Handle<Image>>,
    applied: bool,
}

impl TileThumbnail {
    pub fn cancellation(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    fn on_remove(world: DeferredWorld, HookContext { entity, .. }: HookContext) {
        if let Some(thumbnail) = world.get::<TileThumbnail>(entity) {
            thumbnail.cancelled.store(true, Ordering::Release);
        }
    }

    fn request(
        caches: Option<Res<ThumbnailCaches>>,
        runtime: Option<Res<AsyncRuntime>>,
        mut tiles: Query<(&GalleryTile, &mut TileThumbnail), Added<TileThumbnail>>,
    ) {
        let (Some(caches), Some(runtime)) = (caches, runtime) else {
            return;
        };
        for (tile, mut thumbnail) in &mut tiles {
            let kind = match tile.kind {
                ManifestKind::Images => ThumbnailKind::Image,
                ManifestKind::Videos => ThumbnailKind::Video,
            };
            let cancelled = thumbnail.cancellation();
            thumbnail.receiver = Some(caches.request(kind, tile.url.clone(), &runtime, cancelled));
        }
    }

    fn receive(
        settings: Res<Settings>,
        mut materials: Option<ResMut<Assets<StandardMaterial>>>,
        mut tiles: Query<(
            &GalleryTile,
            &mut TileThumbnail,
            Option<&MeshMaterial3d<StandardMaterial>>,
        )>,
        mut selected: MessageWriter<MediaSelected>,
    ) {
        for (tile, mut thumbnail, material) in &mut tiles {
            if let Some(receiver) = thumbnail.receiver.as_mut() {
                match receiver.try_recv() {
                    Ok(texture) => {
                        if texture.is_none() {
                            debug!("no thumbnail for {}", tile.url);
                        }
                        thumbnail.texture = texture;
                        thumbnail.receiver = None;
                    }
                    Err(TryRecvError::Empty) => continue,
                    Err(TryRecvError::Closed) => thumbnail.receiver = None,
                }
                let is_selected = match tile.kind {
                    ManifestKind::Images => settings.selected_image() == tile.index,
                    ManifestKind::Videos => settings.selected_video() == tile.index,
                };
                if is_selected && thumbnail.texture.is_some() {
                    selected.write(MediaSelected {
                        kind: tile.kind,
                        index: tile.index,
                        url: tile.url.clone(),
                        texture: thumbnail.texture.clone(),
                    });
                }
            }

            if thumbnail.applied {
                continue;
            }
            let (Some(texture), Some(material), Some(materials)) =
                (thumbnail.texture.clone(), material, materials.as_deref_mut())
            else {
                continue;
            };
            if let Some(material) = materials.get_mut(&material.0) {
                material.base_color = Color::WHITE;
                material.base_color_texture = Some(texture);
                thumbnail.applied = true;
            }
        }
    }
}

/* ─────────────────────────  PANORAMA  ───────────────────────── */

/// Inward-facing sphere around the viewer showing the selected image.
///
/// The sphere shows its own copy of the selected thumbnail. The cache frees
/// its textures on eviction, so the cache's handle is never put on the sphere.
#[derive(Component, Debug, Default)]
#[require(Transform, Visibility)]
pub struct Panorama {
    url: Option<String>,
    texture: Option<Handle<Image>>,
}

impl Panorama {
    fn spawn(
        mut commands: Commands,
        meshes: Option<ResMut<Assets<Mesh>>>,
        materials: Option<ResMut<Assets<StandardMaterial>>>,
    ) {
        let (Some(mut meshes), Some(mut materials)) = (meshes, materials) else {
            return;
        };
        commands.spawn((
            Name::new("panorama"),
            Panorama::default(),
            Mesh3d(meshes.add(Sphere::new(PANORAMA_RADIUS).mesh().uv(64, 32))),
            MeshMaterial3d(materials.add(StandardMaterial {
                base_color: Color::srgb(0.05, 0.05, 0.06),
                unlit: true,
                cull_mode: None,
                ..default()
            })),
            // Mirrored so the texture reads correctly from inside.
            Transform::from_scale(Vec3::new(-1.0, 1.0, 1.0)),
        ));
    }

    fn show_selection(
        mut selections: MessageReader<MediaSelected>,
        images: Option<ResMut<Assets<Image>>>,
        materials: Option<ResMut<Assets<StandardMaterial>>>,
        mut panoramas: Query<(&mut Panorama, &MeshMaterial3d<StandardMaterial>)>,
    ) {
        let Some(selection) = selections
            .read()
            .filter(|selection| selection.kind == ManifestKind::Images)
            .filter(|selection| selection.texture.is_some())
            .last()
        else {
            return;
        };
        let (Some(mut images), Some(mut materials)) = (images, materials) else {
            return;
        };
        let Some(mut copy) = selection
            .texture
            .as_ref()
            .and_then(|texture| images.get(texture))
            .cloned()
        else {
            debug!("thumbnail for {} already released", selection.url);
            return;
        };
        copy.asset_usage = RenderAssetUsages::RENDER_WORLD;
        let mut copy = Some(copy);

        for (mut panorama, material) in &mut panoramas {
            if panorama.texture.is_some() && panorama.url.as_deref() == Some(&selection.url) {
                continue;
            }
            let Some(image) = copy.take() else {
                break;
            };
            let texture = images.add(image);
            if let Some(material) = materials.get_mut(&material.0) {
                material.base_color = Color::WHITE;
                material.base_color_texture = Some(texture.clone());
            }
            if let Some(previous) = panorama.texture.replace(texture) {
                images.remove(previous.id());
            }
            panorama.url = Some(selection.url.clone());
            info!("showing {}", selection.url);
        }
    }
}
