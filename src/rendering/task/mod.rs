//! Rendering task graph: an arena of tasks addressed by [`TaskId`].
//!
//! Tasks are added bottom-up (children before parents), annotated top-down with
//! [`TaskGraph::set_coords`] and executed bottom-up by the renderer. A task's output covers
//! `source_rect` (world units) with `target_size` pixels.

mod blend;
mod blur;
mod contour;
mod distort;
mod mesh;
mod pixel;
mod radial_blur;
mod shade;
mod surface;
mod transform;

use std::collections::HashMap;

use smallvec::SmallVec;

pub use blend::TaskBlend;
pub use blur::{Blur, BlurType, TaskBlur};
pub use contour::{TaskContour, WindingStyle};
pub use distort::{
    BLinePoint, CurveWarp, Distortion, Perspective, Spherize, SpherizeType, TaskDistort, Twirl,
    compute_required_source_rect, hermite,
};
pub use mesh::{MeshTriangle, TaskMesh};
pub use pixel::{Checkerboard, Clamp, Halftone, HalftoneType, PixelOp, TaskPixelProcessor};
pub use radial_blur::TaskRadialBlur;
pub use shade::TaskShade;
pub use surface::{TaskLayer, TaskSurface};
pub use transform::TaskTransformationAffine;

use crate::foundation::core::{Point, Rect, Vec2, VectorInt, rect_intersect, rect_is_finite};
use crate::foundation::error::{StrataError, StrataResult};
use crate::foundation::math::round_to_int;
use crate::surface::Interpolation;

/// Largest width or height of a single task surface.
pub const MAX_TARGET_DIM: i32 = 16_384;

/// Index of a task inside its [`TaskGraph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u32);

impl TaskId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Stable dispatch key of a task kind, used by the backend registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Token {
    Blend,
    TransformationAffine,
    Distort,
    Blur,
    RadialBlur,
    PixelProcessor,
    Shade,
    Contour,
    Mesh,
    Surface,
    SurfaceEmpty,
    Layer,
}

impl Token {
    pub const ALL: [Token; 12] = [
        Token::Blend,
        Token::TransformationAffine,
        Token::Distort,
        Token::Blur,
        Token::RadialBlur,
        Token::PixelProcessor,
        Token::Shade,
        Token::Contour,
        Token::Mesh,
        Token::Surface,
        Token::SurfaceEmpty,
        Token::Layer,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Token::Blend => "blend",
            Token::TransformationAffine => "transformation_affine",
            Token::Distort => "distort",
            Token::Blur => "blur",
            Token::RadialBlur => "radial_blur",
            Token::PixelProcessor => "pixel_processor",
            Token::Shade => "shade",
            Token::Contour => "contour",
            Token::Mesh => "mesh",
            Token::Surface => "surface",
            Token::SurfaceEmpty => "surface_empty",
            Token::Layer => "layer",
        }
    }
}

/// Per-kind payload of a task.
#[derive(Clone, Debug)]
pub enum TaskKind {
    /// Sub-tasks `[a, b]`: `a` is what lies below, `b` the layer's own contribution.
    Blend(TaskBlend),
    TransformationAffine(TaskTransformationAffine),
    Distort(TaskDistort),
    Blur(TaskBlur),
    RadialBlur(TaskRadialBlur),
    PixelProcessor(TaskPixelProcessor),
    /// Sub-tasks `[hi, lo]`.
    Shade(TaskShade),
    Contour(TaskContour),
    /// Sub-task `[texture]`.
    Mesh(TaskMesh),
    Surface(TaskSurface),
    SurfaceEmpty,
    /// Pull-path fallback for layers without a push implementation.
    Layer(TaskLayer),
}

impl TaskKind {
    pub fn token(&self) -> Token {
        match self {
            TaskKind::Blend(_) => Token::Blend,
            TaskKind::TransformationAffine(_) => Token::TransformationAffine,
            TaskKind::Distort(_) => Token::Distort,
            TaskKind::Blur(_) => Token::Blur,
            TaskKind::RadialBlur(_) => Token::RadialBlur,
            TaskKind::PixelProcessor(_) => Token::PixelProcessor,
            TaskKind::Shade(_) => Token::Shade,
            TaskKind::Contour(_) => Token::Contour,
            TaskKind::Mesh(_) => Token::Mesh,
            TaskKind::Surface(_) => Token::Surface,
            TaskKind::SurfaceEmpty => Token::SurfaceEmpty,
            TaskKind::Layer(_) => Token::Layer,
        }
    }

    fn bounds(&self, subs: &[Rect]) -> Rect {
        match self {
            TaskKind::Blend(t) => t.bounds(subs),
            TaskKind::TransformationAffine(t) => t.bounds(subs),
            TaskKind::Distort(t) => t.bounds(subs),
            TaskKind::Blur(t) => t.bounds(subs),
            TaskKind::RadialBlur(t) => t.bounds(subs),
            TaskKind::PixelProcessor(t) => t.bounds(subs),
            TaskKind::Shade(t) => t.bounds(subs),
            TaskKind::Contour(t) => t.bounds(),
            TaskKind::Mesh(t) => t.bounds(),
            TaskKind::Surface(t) => t.bounds(),
            TaskKind::SurfaceEmpty => Rect::ZERO,
            TaskKind::Layer(t) => t.bounds(),
        }
    }

    fn sub_task_coords(&self, task: &Task, subs: &[Rect]) -> SubCoords {
        match self {
            TaskKind::TransformationAffine(t) => t.sub_task_coords(task, subs),
            TaskKind::Distort(t) => t.sub_task_coords(task, subs),
            TaskKind::Blur(t) => t.sub_task_coords(task, subs),
            TaskKind::RadialBlur(t) => t.sub_task_coords(task, subs),
            TaskKind::Shade(t) => t.sub_task_coords(task, subs),
            TaskKind::Mesh(t) => t.sub_task_coords(task, subs),
            _ => subs.iter().map(|b| pass_through(task, *b)).collect(),
        }
    }
}

/// Coordinates chosen for each sub-task slot; `None` zeroes the slot.
pub(crate) type SubCoords = SmallVec<[Option<(Rect, VectorInt)>; 2]>;

/// A node of the rendering DAG.
#[derive(Clone, Debug)]
pub struct Task {
    pub kind: TaskKind,
    pub sub_tasks: SmallVec<[Option<TaskId>; 2]>,
    pub source_rect: Rect,
    pub target_size: VectorInt,
    bounds: Rect,
}

impl Task {
    pub fn token(&self) -> Token {
        self.kind.token()
    }

    /// World-space union of everything this task may draw.
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn is_valid(&self) -> bool {
        rect_is_finite(&self.source_rect) && self.target_size.is_positive()
    }

    /// World units per output pixel.
    pub fn pixel_size(&self) -> Vec2 {
        Vec2::new(
            self.source_rect.width() / f64::from(self.target_size.x.max(1)),
            self.source_rect.height() / f64::from(self.target_size.y.max(1)),
        )
    }

    /// World position of the center of output pixel `(x, y)`.
    pub fn pixel_center(&self, x: u32, y: u32) -> Point {
        let px = self.pixel_size();
        Point::new(
            self.source_rect.x0 + (f64::from(x) + 0.5) * px.x,
            self.source_rect.y0 + (f64::from(y) + 0.5) * px.y,
        )
    }

    /// Continuous surface coordinates of a world point.
    pub fn world_to_pixel(&self, p: Point) -> Point {
        let px = self.pixel_size();
        Point::new(
            (p.x - self.source_rect.x0) / px.x,
            (p.y - self.source_rect.y0) / px.y,
        )
    }

    /// Pixel offset of `self` inside the grid of `parent`, assuming equal pixel sizes.
    pub fn offset_in(&self, parent: &Task) -> VectorInt {
        let px = parent.pixel_size();
        VectorInt::new(
            round_to_int((self.source_rect.x0 - parent.source_rect.x0) / px.x),
            round_to_int((self.source_rect.y0 - parent.source_rect.y0) / px.y),
        )
    }
}

/// Arena of tasks built for a single render.
#[derive(Clone, Debug, Default)]
pub struct TaskGraph {
    tasks: Vec<Task>,
    quality: i32,
    interpolation: Interpolation,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Graph whose resampling tasks use the filter chosen for `quality`.
    pub fn with_quality(quality: i32) -> Self {
        Self {
            tasks: Vec::new(),
            quality,
            interpolation: Interpolation::from_quality(quality),
        }
    }

    /// Quality the graph is built for; lower is better, `0` when unspecified.
    pub fn quality(&self) -> i32 {
        self.quality
    }

    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Adds a task whose sub-tasks were added before it.
    pub fn add(&mut self, kind: TaskKind, sub_tasks: &[Option<TaskId>]) -> TaskId {
        let sub_tasks: SmallVec<[Option<TaskId>; 2]> = sub_tasks
            .iter()
            .map(|s| s.filter(|id| id.index() < self.tasks.len()))
            .collect();
        let sub_bounds: SmallVec<[Rect; 2]> = sub_tasks
            .iter()
            .map(|s| s.map_or(Rect::ZERO, |id| self.tasks[id.index()].bounds))
            .collect();
        let bounds = kind.bounds(&sub_bounds);
        let id = TaskId(self.tasks.len() as u32);
        self.tasks.push(Task {
            kind,
            sub_tasks,
            source_rect: Rect::ZERO,
            target_size: VectorInt::ZERO,
            bounds,
        });
        id
    }

    /// Adds a leaf task.
    pub fn add_leaf(&mut self, kind: TaskKind) -> TaskId {
        self.add(kind, &[])
    }

    pub fn get(&self, id: TaskId) -> StrataResult<&Task> {
        self.tasks
            .get(id.index())
            .ok_or_else(|| StrataError::render(format!("unknown task id {}", id.0)))
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get_bounds(&self, id: TaskId) -> Rect {
        self.tasks.get(id.index()).map_or(Rect::ZERO, |t| t.bounds)
    }

    pub fn is_valid(&self, id: TaskId) -> bool {
        self.tasks.get(id.index()).is_some_and(Task::is_valid)
    }

    /// Stores the task's coordinates and derives those of its sub-tasks.
    ///
    /// A degenerate rectangle or size zeroes the task and everything below it.
    pub fn set_coords(&mut self, id: TaskId, source_rect: Rect, target_size: VectorInt) {
        if id.index() >= self.tasks.len() {
            return;
        }
        if !rect_is_finite(&source_rect)
            || !target_size.is_positive()
            || target_size.x > MAX_TARGET_DIM
            || target_size.y > MAX_TARGET_DIM
        {
            self.set_coords_zero(id);
            return;
        }
        let task = &mut self.tasks[id.index()];
        task.source_rect = source_rect;
        task.target_size = target_size;
        self.set_coords_sub_tasks(id);
    }

    pub fn set_coords_zero(&mut self, id: TaskId) {
        let Some(task) = self.tasks.get_mut(id.index()) else {
            return;
        };
        task.source_rect = Rect::ZERO;
        task.target_size = VectorInt::ZERO;
        let subs = task.sub_tasks.clone();
        for sub in subs.into_iter().flatten() {
            self.set_coords_zero(sub);
        }
    }

    /// Re-derives sub-task coordinates from this task's current coordinates.
    pub fn set_coords_sub_tasks(&mut self, id: TaskId) {
        let Some(task) = self.tasks.get(id.index()) else {
            return;
        };
        if !task.is_valid() {
            self.set_coords_zero(id);
            return;
        }
        let sub_bounds: SmallVec<[Rect; 2]> = task
            .sub_tasks
            .iter()
            .map(|s| s.map_or(Rect::ZERO, |sid| self.get_bounds(sid)))
            .collect();
        let coords = task.kind.sub_task_coords(task, &sub_bounds);
        let subs = task.sub_tasks.clone();
        for (sub, coords) in subs.into_iter().zip(coords) {
            let Some(sub) = sub else { continue };
            match coords {
                Some((rect, size)) => self.set_coords(sub, rect, size),
                None => self.set_coords_zero(sub),
            }
        }
    }

    /// Deep copy of `id` and its whole sub-DAG. Sharing inside the copy is preserved.
    pub fn clone_recursive(&mut self, id: TaskId) -> TaskId {
        let mut map = HashMap::new();
        self.clone_into_map(id, &mut map)
    }

    fn clone_into_map(&mut self, id: TaskId, map: &mut HashMap<TaskId, TaskId>) -> TaskId {
        if let Some(&done) = map.get(&id) {
            return done;
        }
        let Some(task) = self.tasks.get(id.index()) else {
            return id;
        };
        let mut copy = task.clone();
        let subs = task.sub_tasks.clone();
        copy.sub_tasks = subs
            .into_iter()
            .map(|s| s.map(|sid| self.clone_into_map(sid, map)))
            .collect();
        let new_id = TaskId(self.tasks.len() as u32);
        self.tasks.push(copy);
        map.insert(id, new_id);
        new_id
    }

    /// Tasks reachable from `root` through valid sub-task slots, children first.
    pub fn reachable(&self, root: TaskId) -> Vec<TaskId> {
        let mut seen = vec![false; self.tasks.len()];
        let mut out = Vec::new();
        let mut stack = vec![(root, false)];
        while let Some((id, expanded)) = stack.pop() {
            let Some(task) = self.tasks.get(id.index()) else {
                continue;
            };
            if expanded {
                out.push(id);
                continue;
            }
            if seen[id.index()] || !task.is_valid() {
                continue;
            }
            seen[id.index()] = true;
            stack.push((id, true));
            for sub in task.sub_tasks.iter().rev().flatten() {
                if !seen[sub.index()] {
                    stack.push((*sub, false));
                }
            }
        }
        out
    }
}

/// Snaps `want` outward onto the pixel grid anchored at `anchor` with pixel size `px`.
pub fn snap_to_grid(want: Rect, anchor: Point, px: Vec2) -> Option<(Rect, VectorInt)> {
    const EPS: f64 = 1e-6;
    let px_ok = px.x > 0.0 && px.y > 0.0 && px.x.is_finite() && px.y.is_finite();
    if !px_ok || !rect_is_finite(&want) {
        return None;
    }
    let ix0 = ((want.x0 - anchor.x) / px.x + EPS).floor();
    let iy0 = ((want.y0 - anchor.y) / px.y + EPS).floor();
    let ix1 = ((want.x1 - anchor.x) / px.x - EPS).ceil();
    let iy1 = ((want.y1 - anchor.y) / px.y - EPS).ceil();
    let w = ix1 - ix0;
    let h = iy1 - iy0;
    if !(w >= 1.0 && h >= 1.0) || w > f64::from(MAX_TARGET_DIM) || h > f64::from(MAX_TARGET_DIM) {
        return None;
    }
    let rect = Rect::new(
        anchor.x + ix0 * px.x,
        anchor.y + iy0 * px.y,
        anchor.x + ix1 * px.x,
        anchor.y + iy1 * px.y,
    );
    Some((rect, VectorInt::new(w as i32, h as i32)))
}

/// Sub-task coordinates on the parent's grid, clipped to the sub-task's bounds.
pub(crate) fn pass_through(task: &Task, sub_bounds: Rect) -> Option<(Rect, VectorInt)> {
    let want = rect_intersect(task.source_rect, sub_bounds);
    snap_to_grid(want, task.source_rect.origin(), task.pixel_size())
}

/// Same-grid sub-task coordinates for `want`, expanded by `margin` pixels per side.
pub(crate) fn on_parent_grid(
    task: &Task,
    want: Rect,
    margin: (i32, i32),
    sub_bounds: Rect,
) -> Option<(Rect, VectorInt)> {
    let px = task.pixel_size();
    let grown = want.inflate(f64::from(margin.0) * px.x, f64::from(margin.1) * px.y);
    snap_to_grid(
        rect_intersect(grown, sub_bounds),
        task.source_rect.origin(),
        px,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{BlendMethod, Color, ColorMatrix};
    use crate::foundation::core::FULL_PLANE;

    fn solid(graph: &mut TaskGraph, c: Color) -> TaskId {
        graph.add(
            TaskKind::PixelProcessor(TaskPixelProcessor::new(PixelOp::ColorMatrix(
                ColorMatrix::constant(c),
            ))),
            &[None],
        )
    }

    #[test]
    fn degenerate_coords_zero_the_subtree() {
        let mut g = TaskGraph::new();
        let a = solid(&mut g, Color::red());
        let b = g.add(TaskKind::Blend(TaskBlend::new(BlendMethod::Composite, 1.0)), &[Some(a), None]);
        g.set_coords(b, Rect::new(0.0, 0.0, 1.0, 1.0), VectorInt::new(0, 4));
        assert!(!g.is_valid(b));
        assert!(!g.is_valid(a));

        g.set_coords(b, Rect::new(0.0, 0.0, 1.0, 1.0), VectorInt::new(4, 4));
        assert!(g.is_valid(a));
        g.set_coords(b, Rect::new(0.0, 0.0, f64::INFINITY, 1.0), VectorInt::new(4, 4));
        assert!(!g.is_valid(a));
    }

    #[test]
    fn snapping_keeps_parent_grid() {
        let (r, size) = snap_to_grid(
            Rect::new(0.3, -0.2, 1.1, 0.9),
            Point::new(0.0, 0.0),
            Vec2::new(0.5, 0.5),
        )
        .unwrap();
        assert_eq!(r, Rect::new(0.0, -0.5, 1.5, 1.0));
        assert_eq!(size, VectorInt::new(3, 3));
        assert!(snap_to_grid(FULL_PLANE, Point::ZERO, Vec2::new(1.0, 1.0)).is_none());
    }

    #[test]
    fn clone_recursive_preserves_inner_sharing() {
        let mut g = TaskGraph::new();
        let leaf = solid(&mut g, Color::blue());
        let top = g.add(
            TaskKind::Blend(TaskBlend::new(BlendMethod::Composite, 1.0)),
            &[Some(leaf), Some(leaf)],
        );
        let copy = g.clone_recursive(top);
        assert_ne!(copy, top);
        let subs = &g.get(copy).unwrap().sub_tasks;
        assert_eq!(subs[0], subs[1]);
        assert_ne!(subs[0], Some(leaf));
        assert_eq!(g.len(), 4);
    }

    #[test]
    fn reachable_is_children_first_and_skips_invalid() {
        let mut g = TaskGraph::new();
        let a = solid(&mut g, Color::red());
        let empty = g.add_leaf(TaskKind::SurfaceEmpty);
        let top = g.add(
            TaskKind::Blend(TaskBlend::new(BlendMethod::Composite, 1.0)),
            &[Some(a), Some(empty)],
        );
        g.set_coords(top, Rect::new(0.0, 0.0, 2.0, 2.0), VectorInt::new(2, 2));
        assert!(!g.is_valid(empty));
        assert_eq!(g.reachable(top), vec![a, top]);
    }

    #[test]
    fn unknown_sub_ids_are_dropped() {
        let mut g = TaskGraph::new();
        let t = g.add(
            TaskKind::Blend(TaskBlend::new(BlendMethod::Composite, 1.0)),
            &[Some(TaskId(99)), None],
        );
        assert_eq!(g.get(t).unwrap().sub_tasks.as_slice(), &[None, None]);
        assert!(g.get(TaskId(7)).is_err());
    }
}
