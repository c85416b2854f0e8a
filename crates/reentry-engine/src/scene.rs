//! What gets painted each frame.
//!
//! [`BoardView`] is the game's [`Actuator`]: it copies the board after every
//! state change and animates tiles between moves. The `paint_*` functions draw
//! the visual frame, the board and the HUD with egui shapes.

use egui::{Align2, Color32, FontId, Pos2, Rect, Shape, Stroke, Vec2 as EVec2};
use glam::Vec2;

use reentry_common::CellCoord;
use reentry_gameplay::{ActuateMeta, Actuator, Grid, ProgressState};
use reentry_kernel::{tier_color, BoardTransform, Rgb, VisualFrame};

/// Seconds a tile takes to slide to its new cell.
const SLIDE_SECONDS: f32 = 0.1;

/// Seconds a new or merged tile takes to pop in.
const POP_SECONDS: f32 = 0.15;

/// How a tile appeared on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileOrigin {
    /// Slid from another cell (or stayed put)
    Moved(CellCoord),
    /// Spawned this move
    Spawned,
    /// Produced by a merge this move
    Merged,
}

/// One tile as the display sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileView {
    /// Tile value
    pub value: u32,
    /// Current cell
    pub position: CellCoord,
    /// Animation start
    pub origin: TileOrigin,
}

/// Display-side copy of the board.
#[derive(Debug, Clone, Default)]
pub struct BoardView {
    size: usize,
    tiles: Vec<TileView>,
    meta: ActuateMeta,
    show_won: bool,
    since_update: f32,
    updates: u64,
}

impl Actuator for BoardView {
    fn actuate(&mut self, grid: &Grid, meta: &ActuateMeta) {
        self.size = grid.size();
        self.tiles = grid
            .tiles()
            .map(|tile| TileView {
                value: tile.value(),
                position: tile.position(),
                origin: if tile.is_merge_product() {
                    TileOrigin::Merged
                } else {
                    tile.previous_position()
                        .map_or(TileOrigin::Spawned, TileOrigin::Moved)
                },
            })
            .collect();
        self.tiles
            .sort_by_key(|t| (t.position.y, t.position.x));
        self.show_won = meta.won && meta.terminated;
        self.meta = *meta;
        self.since_update = 0.0;
        self.updates += 1;
    }

    fn continue_game(&mut self) {
        self.show_won = false;
    }
}

impl BoardView {
    /// Creates an empty view.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances tile animations.
    pub fn advance(&mut self, dt: f32) {
        self.since_update += dt.max(0.0);
    }

    /// Board side length in cells.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Tiles, row by row.
    #[must_use]
    pub fn tiles(&self) -> &[TileView] {
        &self.tiles
    }

    /// Score and flags from the last update.
    #[must_use]
    pub const fn meta(&self) -> &ActuateMeta {
        &self.meta
    }

    /// Whether the win message is showing.
    #[must_use]
    pub const fn show_won(&self) -> bool {
        self.show_won
    }

    /// Number of updates received.
    #[must_use]
    pub const fn updates(&self) -> u64 {
        self.updates
    }

    /// Interpolated cell position of a tile, in cell units.
    #[must_use]
    pub fn animated_cell(&self, tile: &TileView) -> Vec2 {
        let to = Vec2::new(tile.position.x as f32, tile.position.y as f32);
        match tile.origin {
            TileOrigin::Moved(from) => {
                let t = (self.since_update / SLIDE_SECONDS).min(1.0);
                Vec2::new(from.x as f32, from.y as f32).lerp(to, ease_out(t))
            }
            _ => to,
        }
    }

    /// Scale of a tile during its pop-in.
    #[must_use]
    pub fn animated_scale(&self, tile: &TileView) -> f32 {
        let start = match tile.origin {
            TileOrigin::Moved(_) => return 1.0,
            TileOrigin::Spawned => 0.0,
            TileOrigin::Merged => 1.2,
        };
        // New tiles wait for the slide to finish.
        let t = ((self.since_update - SLIDE_SECONDS) / POP_SECONDS).clamp(0.0, 1.0);
        start + (1.0 - start) * ease_out(t)
    }
}

fn ease_out(t: f32) -> f32 {
    1.0 - (1.0 - t).powi(2)
}

/// Converts a palette color.
#[must_use]
pub fn color32(color: Rgb, alpha: f32) -> Color32 {
    let [r, g, b] = color.to_u8();
    Color32::from_rgba_unmultiplied(r, g, b, (alpha.clamp(0.0, 1.0) * 255.0) as u8)
}

fn pos(v: Vec2) -> Pos2 {
    Pos2::new(v.x, v.y)
}

/// Where the board sits on screen before its transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoardLayout {
    /// Board center in points.
    pub center: Vec2,
    /// Side length in points.
    pub side: f32,
}

/// Height reserved for the HUD above the board.
const HUD_HEIGHT: f32 = 110.0;

impl BoardLayout {
    /// Centers the largest board that fits below the HUD.
    #[must_use]
    pub fn fit(screen: Vec2) -> Self {
        let side = (screen.x.min(screen.y - HUD_HEIGHT) * 0.86).max(80.0);
        Self {
            center: Vec2::new(screen.x / 2.0, HUD_HEIGHT + (screen.y - HUD_HEIGHT) / 2.0),
            side,
        }
    }

    /// Applies the board transform to a point in untransformed screen space.
    #[must_use]
    pub fn transform(&self, point: Vec2, transform: &BoardTransform) -> Vec2 {
        let local = (point - self.center) * transform.scale;
        let rotated = Vec2::from_angle(transform.rotation).rotate(local);
        self.center + rotated + transform.offset
    }

    fn quad(&self, center: Vec2, half: f32, transform: &BoardTransform) -> Vec<Pos2> {
        [
            Vec2::new(-half, -half),
            Vec2::new(half, -half),
            Vec2::new(half, half),
            Vec2::new(-half, half),
        ]
        .iter()
        .map(|corner| pos(self.transform(center + *corner, transform)))
        .collect()
    }
}

/// Paints particles, rings, radio static and heat under the board.
pub fn paint_backdrop(painter: &egui::Painter, frame: &VisualFrame, screen: Vec2, rng: &mut fastrand::Rng) {
    for ring in &frame.rings {
        painter.circle_stroke(
            pos(ring.center),
            ring.radius,
            Stroke::new(1.5, color32(ring.color, ring.alpha)),
        );
    }

    for particle in &frame.particles {
        painter.circle_filled(
            pos(particle.position),
            particle.size,
            color32(particle.color, particle.alpha),
        );
    }

    if frame.static_intensity > 0.01 {
        let specks = (frame.static_intensity * 180.0) as usize;
        for _ in 0..specks {
            let at = Pos2::new(rng.f32() * screen.x, rng.f32() * screen.y);
            let grey = rng.u8(120..=255);
            painter.rect_filled(
                Rect::from_min_size(at, EVec2::new(2.0, 1.0)),
                0.0,
                Color32::from_rgba_unmultiplied(grey, grey, grey, (frame.static_intensity * 160.0) as u8),
            );
        }
    }

    if frame.heat > 0.01 {
        // Shimmering glow rising from the bottom edge.
        let bands = 6;
        for i in 0..bands {
            let t = i as f32 / bands as f32;
            let height = screen.y * 0.35 * (1.0 - t);
            let alpha = frame.heat * 0.12 * (1.0 - t);
            painter.rect_filled(
                Rect::from_min_max(Pos2::new(0.0, screen.y - height), Pos2::new(screen.x, screen.y)),
                0.0,
                color32(Rgb::from_hex(0xFF_7A_1A), alpha),
            );
        }
    }
}

/// Paints the board and its tiles.
pub fn paint_board(painter: &egui::Painter, board: &BoardView, layout: &BoardLayout, transform: &BoardTransform) {
    let size = board.size().max(1);
    let half = layout.side / 2.0;
    painter.add(Shape::convex_polygon(
        layout.quad(layout.center, half, transform),
        Color32::from_rgba_unmultiplied(12, 16, 32, 200),
        Stroke::new(2.0, Color32::from_rgba_unmultiplied(120, 160, 220, 90)),
    ));

    let cell = layout.side / size as f32;
    let gap = cell * 0.06;
    let origin = layout.center - Vec2::splat(half);
    let cell_center = |c: Vec2| origin + (c + Vec2::splat(0.5)) * cell;

    for y in 0..size {
        for x in 0..size {
            let center = cell_center(Vec2::new(x as f32, y as f32));
            painter.add(Shape::convex_polygon(
                layout.quad(center, cell / 2.0 - gap, transform),
                Color32::from_rgba_unmultiplied(255, 255, 255, 14),
                Stroke::NONE,
            ));
        }
    }

    for tile in board.tiles() {
        let scale = board.animated_scale(tile);
        if scale <= 0.01 {
            continue;
        }
        let center = cell_center(board.animated_cell(tile));
        let fill = tier_color(tile.value);
        painter.add(Shape::convex_polygon(
            layout.quad(center, (cell / 2.0 - gap) * scale, transform),
            color32(fill, 0.92),
            Stroke::new(1.0, color32(fill.scaled(1.3), 1.0)),
        ));

        let digits = tile.value.to_string().len() as f32;
        let font = (cell * 0.42 / (1.0 + 0.18 * (digits - 1.0))) * scale * transform.scale;
        painter.text(
            pos(layout.transform(center, transform)),
            Align2::CENTER_CENTER,
            tile.value.to_string(),
            FontId::monospace(font.max(1.0)),
            Color32::WHITE,
        );
    }
}

/// Paints score, best score, oxygen and altitude band.
pub fn paint_hud(painter: &egui::Painter, board: &BoardView, progress: &ProgressState, screen: Vec2) {
    let meta = board.meta();
    let oxygen = progress.oxygen();
    let white = Color32::from_rgb(230, 236, 255);
    let dim = Color32::from_rgb(140, 150, 180);

    painter.text(
        Pos2::new(20.0, 18.0),
        Align2::LEFT_TOP,
        "REENTRY",
        FontId::proportional(26.0),
        white,
    );
    painter.text(
        Pos2::new(20.0, 52.0),
        Align2::LEFT_TOP,
        format!("ALT BAND  {}", progress.stage().label()),
        FontId::monospace(13.0),
        dim,
    );

    let oxygen_color = match oxygen.severity() {
        0 => Color32::from_rgb(120, 220, 160),
        1 => Color32::from_rgb(230, 210, 100),
        2 => Color32::from_rgb(240, 150, 60),
        _ => Color32::from_rgb(250, 70, 50),
    };
    painter.text(
        Pos2::new(20.0, 72.0),
        Align2::LEFT_TOP,
        format!("O2  {}", oxygen.label()),
        FontId::monospace(13.0),
        oxygen_color,
    );

    painter.text(
        Pos2::new(screen.x - 20.0, 18.0),
        Align2::RIGHT_TOP,
        format!("SCORE {}", meta.score),
        FontId::monospace(20.0),
        white,
    );
    painter.text(
        Pos2::new(screen.x - 20.0, 46.0),
        Align2::RIGHT_TOP,
        format!("BEST {}", meta.best_score),
        FontId::monospace(14.0),
        dim,
    );
}

/// Full-screen message layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlay {
    /// Shown until the first interaction
    Briefing,
    /// Win tile reached
    Won,
    /// No moves left
    Over,
}

impl Overlay {
    /// Which overlay, if any, applies.
    #[must_use]
    pub fn select(board: &BoardView, interacted: bool) -> Option<Self> {
        if board.meta().over {
            Some(Self::Over)
        } else if board.show_won() {
            Some(Self::Won)
        } else if !interacted {
            Some(Self::Briefing)
        } else {
            None
        }
    }

    fn text(self) -> (&'static str, &'static str) {
        match self {
            Self::Briefing => (
                "MISSION BRIEFING",
                "Merge matching tiles to bring the capsule home.\nArrows, WASD or HJKL to move. Swipe works too.",
            ),
            Self::Won => ("SPLASHDOWN", "The capsule is down.\nC to keep playing, R for a new descent."),
            Self::Over => ("SIGNAL LOST", "No moves left.\nR to try another descent."),
        }
    }
}

/// Paints overlays and flashes above everything else.
pub fn paint_overlays(painter: &egui::Painter, frame: &VisualFrame, overlay: Option<Overlay>, screen: Vec2) {
    let full = Rect::from_min_size(Pos2::ZERO, EVec2::new(screen.x, screen.y));

    if frame.milestone_flash > 0.01 {
        painter.rect_filled(full, 0.0, color32(frame.milestone_color, frame.milestone_flash * 0.35));
    }
    if frame.flash_alpha > 0.01 {
        painter.rect_filled(full, 0.0, color32(Rgb::WHITE, frame.flash_alpha * 0.25));
    }

    if let Some(overlay) = overlay {
        let (title, body) = overlay.text();
        painter.rect_filled(full, 0.0, Color32::from_rgba_unmultiplied(0, 0, 0, 150));
        let center = Pos2::new(screen.x / 2.0, screen.y / 2.0);
        painter.text(
            center - EVec2::new(0.0, 30.0),
            Align2::CENTER_CENTER,
            title,
            FontId::proportional(34.0),
            Color32::WHITE,
        );
        painter.text(
            center + EVec2::new(0.0, 24.0),
            Align2::CENTER_CENTER,
            body,
            FontId::proportional(16.0),
            Color32::from_rgb(200, 210, 235),
        );
    }
}
