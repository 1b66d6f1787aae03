//! Mesh deformation driven by bones.

use crate::color::{BlendMethod, Color};
use crate::context::Context;
use crate::foundation::core::{Affine, Point, Rect, Vec2, affine_is_invertible};
use crate::foundation::error::{StrataError, StrataResult};
use crate::layer::composite::build_fork_task;
use crate::layer::param::{ParamDesc, ParamTable, Value};
use crate::layer::{Composite, Layer, LayerBase};
use crate::rendering::task::{MeshTriangle, TaskGraph, TaskId, TaskKind, TaskMesh};
use crate::surface::Interpolation;
use crate::{layer_common, param};

const PRECISION: f64 = 1e-10;
const MAX_SUBDIVISIONS: i32 = 1024;

/// A tapered capsule from `p0` (radius `r0`) to `p1` (radius `r1`).
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BoneShape {
    pub p0: Point,
    pub p1: Point,
    pub r0: f64,
    pub r1: f64,
}

impl BoneShape {
    pub fn new(p0: Point, p1: Point, r0: f64, r1: f64) -> Self {
        Self { p0, p1, r0, r1 }
    }

    /// Maps the unit segment `(0, 0) -> (1, 0)` onto the bone, keeping angles.
    fn frame(&self) -> Affine {
        let d = self.p1 - self.p0;
        Affine::new([d.x, d.y, -d.y, d.x, self.p0.x, self.p0.y])
    }

    /// `1` on the axis, falling to `0` at the capsule's edge.
    fn center_percent(&self, x: Point) -> f64 {
        let line = self.p1 - self.p0;
        let len2 = line.hypot2();
        let t = if len2 > PRECISION {
            ((x - self.p0).dot(line) / len2).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let r = self.r0.abs() + (self.r1.abs() - self.r0.abs()) * t;
        if r <= PRECISION {
            return 0.0;
        }
        let d = (x - self.p0.lerp(self.p1, t)).hypot();
        (1.0 - d / r).max(0.0)
    }

    fn expanded(&self, by: f64) -> Self {
        Self {
            r0: self.r0.abs() + by,
            r1: self.r1.abs() + by,
            ..*self
        }
    }
}

fn distance_to_line(p0: Point, p1: Point, x: Point) -> f64 {
    let to_ends = (x - p0).hypot().min((x - p1).hypot());
    let line = p1 - p0;
    let len = line.hypot();
    if len > PRECISION {
        let pos = (x - p0).dot(line) / len;
        if pos > 0.0 && pos < len {
            return ((x - p0).cross(line) / len).abs().min(to_ends);
        }
    }
    to_ends
}

/// A bone in its rest shape and its posed shape.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Bone {
    pub rest: BoneShape,
    pub pose: BoneShape,
    /// Deeper bones are drawn first.
    pub depth: f64,
}

impl Default for Bone {
    fn default() -> Self {
        let shape = BoneShape::new(Point::ZERO, Point::new(1.0, 0.0), 0.1, 0.1);
        Self {
            rest: shape,
            pose: shape,
            depth: 0.0,
        }
    }
}

impl Bone {
    /// Rest-pose world point to posed world point, if the rest shape has a length.
    pub fn matrix(&self) -> Option<Affine> {
        let rest = self.rest.frame();
        affine_is_invertible(&rest).then(|| self.pose.frame() * rest.inverse())
    }
}

impl From<BoneShape> for Value {
    fn from(s: BoneShape) -> Self {
        Value::List(vec![
            Value::from(s.p0),
            Value::from(s.p1),
            Value::Real(s.r0),
            Value::Real(s.r1),
        ])
    }
}

impl TryFrom<Value> for BoneShape {
    type Error = StrataError;
    fn try_from(v: Value) -> StrataResult<Self> {
        let Value::List(items) = v else {
            return Err(StrataError::validation("bone shape must be a list"));
        };
        let Ok([p0, p1, r0, r1]) = <[Value; 4]>::try_from(items) else {
            return Err(StrataError::validation("bone shape needs 4 entries"));
        };
        Ok(BoneShape::new(
            Point::try_from(p0)?,
            Point::try_from(p1)?,
            f64::try_from(r0)?,
            f64::try_from(r1)?,
        ))
    }
}

impl From<Bone> for Value {
    fn from(b: Bone) -> Self {
        Value::List(vec![
            Value::from(b.rest),
            Value::from(b.pose),
            Value::Real(b.depth),
        ])
    }
}

impl TryFrom<Value> for Bone {
    type Error = StrataError;
    fn try_from(v: Value) -> StrataResult<Self> {
        let Value::List(items) = v else {
            return Err(StrataError::validation("bone must be a list"));
        };
        let Ok([rest, pose, depth]) = <[Value; 3]>::try_from(items) else {
            return Err(StrataError::validation("bone needs 3 entries"));
        };
        Ok(Bone {
            rest: BoneShape::try_from(rest)?,
            pose: BoneShape::try_from(pose)?,
            depth: f64::try_from(depth)?,
        })
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct GridPoint {
    initial: Point,
    position: Vec2,
    depth: f64,
    weight: f64,
    used: bool,
}

/// Deforms the context through a grid mesh that follows the bones from rest to pose.
#[derive(Clone, Debug)]
pub struct SkeletonDeformation {
    base: LayerBase,
    pub composite: Composite,
    bones: Vec<Bone>,
    point1: Point,
    point2: Point,
    x_subdivisions: i32,
    y_subdivisions: i32,
    mesh: Vec<MeshTriangle>,
}

impl Default for SkeletonDeformation {
    fn default() -> Self {
        Self::new(vec![Bone::default()])
    }
}

macro_rules! rebuilding {
    ($name:literal, $field:ident, $t:ty) => {
        ParamDesc {
            name: $name,
            get: |l| Value::from(l.$field.clone()),
            set: |l, v| {
                l.$field = <$t>::try_from(v)?;
                l.rebuild();
                Ok(())
            },
        }
    };
}

impl ParamTable for SkeletonDeformation {
    fn param_table() -> &'static [ParamDesc<Self>] {
        const TABLE: &[ParamDesc<SkeletonDeformation>] = &[
            param!("amount", composite.amount),
            param!("blend_method", composite.blend_method),
            rebuilding!("bones", bones, Vec<Bone>),
            rebuilding!("point1", point1, Point),
            rebuilding!("point2", point2, Point),
            rebuilding!("x_subdivisions", x_subdivisions, i32),
            rebuilding!("y_subdivisions", y_subdivisions, i32),
        ];
        TABLE
    }
}

impl SkeletonDeformation {
    pub fn new(bones: Vec<Bone>) -> Self {
        let mut out = Self {
            base: LayerBase::default(),
            composite: Composite::new(1.0, BlendMethod::Straight),
            bones,
            point1: Point::new(-4.0, 4.0),
            point2: Point::new(4.0, -4.0),
            x_subdivisions: 32,
            y_subdivisions: 32,
            mesh: Vec::new(),
        };
        out.rebuild();
        out
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn set_bones(&mut self, bones: Vec<Bone>) {
        self.bones = bones;
        self.rebuild();
    }

    /// Sets the grid rectangle and its subdivision counts.
    pub fn set_grid(
        &mut self,
        point1: Point,
        point2: Point,
        x_subdivisions: i32,
        y_subdivisions: i32,
    ) {
        self.point1 = point1;
        self.point2 = point2;
        self.x_subdivisions = x_subdivisions;
        self.y_subdivisions = y_subdivisions;
        self.rebuild();
    }

    pub fn triangles(&self) -> &[MeshTriangle] {
        &self.mesh
    }

    fn rebuild(&mut self) {
        let nx = self.x_subdivisions.clamp(1, MAX_SUBDIVISIONS) as usize + 1;
        let ny = self.y_subdivisions.clamp(1, MAX_SUBDIVISIONS) as usize + 1;
        let (p0, p1) = (self.point1, self.point2);
        let step = Vec2::new((p1.x - p0.x) / (nx - 1) as f64, (p1.y - p0.y) / (ny - 1) as f64);
        let diagonal = step.hypot();

        let mut grid: Vec<GridPoint> = (0..ny)
            .flat_map(|j| {
                (0..nx).map(move |i| GridPoint {
                    initial: Point::new(p0.x + i as f64 * step.x, p0.y + j as f64 * step.y),
                    ..GridPoint::default()
                })
            })
            .collect();

        for bone in &self.bones {
            let Some(matrix) = bone.matrix() else {
                continue;
            };
            let reach = bone.rest.expanded(2.0 * diagonal);
            for g in &mut grid {
                let percent = reach.center_percent(g.initial);
                if percent <= PRECISION {
                    continue;
                }
                let distance =
                    distance_to_line(bone.rest.p0, bone.rest.p1, g.initial).max(PRECISION);
                let weight = percent / (distance * distance);
                g.position += (matrix * g.initial).to_vec2() * weight;
                g.depth += bone.depth * weight;
                g.weight += weight;
                g.used = true;
            }
        }

        let placed: Vec<(Point, f64)> = grid
            .iter()
            .map(|g| {
                if g.weight > PRECISION {
                    ((g.position / g.weight).to_point(), g.depth / g.weight)
                } else {
                    (g.initial, 0.0)
                }
            })
            .collect();

        let mut triangles: Vec<(f64, MeshTriangle)> = Vec::new();
        for j in 1..ny {
            for i in 1..nx {
                let v = [
                    (j - 1) * nx + (i - 1),
                    (j - 1) * nx + i,
                    j * nx + i,
                    j * nx + (i - 1),
                ];
                if !v.iter().all(|&k| grid[k].used) {
                    continue;
                }
                let depth = v.iter().map(|&k| placed[k].1).sum::<f64>() * 0.25;
                let tri = |a: usize, b: usize, c: usize| {
                    MeshTriangle::new(
                        [placed[a].0, placed[b].0, placed[c].0],
                        [grid[a].initial, grid[b].initial, grid[c].initial],
                    )
                };
                triangles.push((depth, tri(v[0], v[1], v[3])));
                triangles.push((depth, tri(v[1], v[2], v[3])));
            }
        }
        triangles.sort_by(|a, b| b.0.total_cmp(&a.0));
        self.mesh = triangles.into_iter().map(|(_, t)| t).collect();
    }

    fn task(&self, interpolation: Interpolation) -> TaskMesh {
        TaskMesh::new(self.mesh.clone(), interpolation)
    }
}

impl Layer for SkeletonDeformation {
    layer_common!("skeleton_deformation");

    fn composite(&self) -> Option<&Composite> {
        Some(&self.composite)
    }

    fn reads_context(&self) -> bool {
        true
    }

    fn get_color(&self, context: &Context, pos: Point) -> Color {
        if self.composite.effective_amount(context) == 0.0 {
            return context.get_color(pos);
        }
        let own = self
            .task(Interpolation::Nearest)
            .point(pos)
            .map_or(Color::alpha(), |q| context.get_color(q));
        self.composite.blend(own, context, pos)
    }

    fn get_full_bounding_rect(&self, context: &Context) -> Rect {
        let own = self.task(Interpolation::Nearest).bounds();
        self.composite.full_bounding_rect(own, context)
    }

    fn build_rendering_task(&self, context: &Context, graph: &mut TaskGraph) -> Option<TaskId> {
        let mesh = self.task(graph.interpolation());
        build_fork_task(&self.composite, context, graph, |graph, copy| {
            let copy = copy?;
            if mesh.triangles.is_empty() {
                return None;
            }
            Some(graph.add(TaskKind::Mesh(mesh), &[Some(copy)]))
        })
    }
}
