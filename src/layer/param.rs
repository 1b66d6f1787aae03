//! Typed layer parameters and their `(name, Value)` interchange form.

use std::fmt;
use std::sync::Arc;

use crate::color::{BlendMethod, Color, Gradient, migrate_legacy_blend};
use crate::context::ContextParams;
use crate::foundation::core::{Point, Vec2};
use crate::foundation::error::{StrataError, StrataResult};
use crate::layers::Subsampling;
use crate::rendering::task::{BlurType, HalftoneType, SpherizeType, WindingStyle};

/// Interchange value of one layer parameter.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Bool(bool),
    Integer(i32),
    Real(f64),
    /// Angle in degrees.
    Angle(f64),
    Vector(Vec2),
    Color(Color),
    String(String),
    Gradient(Gradient),
    List(Vec<Value>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Angle(_) => "angle",
            Value::Vector(_) => "vector",
            Value::Color(_) => "color",
            Value::String(_) => "string",
            Value::Gradient(_) => "gradient",
            Value::List(_) => "list",
        }
    }

    fn mismatch(&self, want: &str) -> StrataError {
        StrataError::validation(format!("expected {want} value, got {}", self.type_name()))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Real(f64::from(v))
    }
}

impl From<Vec2> for Value {
    fn from(v: Vec2) -> Self {
        Value::Vector(v)
    }
}

impl From<Point> for Value {
    fn from(v: Point) -> Self {
        Value::Vector(v.to_vec2())
    }
}

impl From<Color> for Value {
    fn from(v: Color) -> Self {
        Value::Color(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Gradient> for Value {
    fn from(v: Gradient) -> Self {
        Value::Gradient(v)
    }
}

/// Enums stored by their stable numeric id.
macro_rules! id_value {
    ($($t:ty => $what:literal),+ $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Integer(v.id())
                }
            }

            impl TryFrom<Value> for $t {
                type Error = StrataError;
                fn try_from(v: Value) -> StrataResult<Self> {
                    let id = i32::try_from(v)?;
                    <$t>::from_id(id).ok_or_else(|| {
                        StrataError::validation(format!("unknown {} id {id}", $what))
                    })
                }
            }
        )+
    };
}

id_value!(
    BlendMethod => "blend method",
    BlurType => "blur type",
    HalftoneType => "halftone type",
    SpherizeType => "spherize type",
    Subsampling => "subsampling type",
    WindingStyle => "winding style",
);

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl TryFrom<Value> for bool {
    type Error = StrataError;
    fn try_from(v: Value) -> StrataResult<Self> {
        match v {
            Value::Bool(b) => Ok(b),
            Value::Integer(i) => Ok(i != 0),
            other => Err(other.mismatch("bool")),
        }
    }
}

impl TryFrom<Value> for i32 {
    type Error = StrataError;
    fn try_from(v: Value) -> StrataResult<Self> {
        match v {
            Value::Integer(i) => Ok(i),
            Value::Real(r) if r.is_finite() => Ok(r.round() as i32),
            other => Err(other.mismatch("integer")),
        }
    }
}

impl TryFrom<Value> for f64 {
    type Error = StrataError;
    fn try_from(v: Value) -> StrataResult<Self> {
        match v {
            Value::Real(r) | Value::Angle(r) => Ok(r),
            Value::Integer(i) => Ok(f64::from(i)),
            other => Err(other.mismatch("real")),
        }
    }
}

impl TryFrom<Value> for f32 {
    type Error = StrataError;
    fn try_from(v: Value) -> StrataResult<Self> {
        f64::try_from(v).map(|r| r as f32)
    }
}

impl TryFrom<Value> for Vec2 {
    type Error = StrataError;
    fn try_from(v: Value) -> StrataResult<Self> {
        match v {
            Value::Vector(p) => Ok(p),
            other => Err(other.mismatch("vector")),
        }
    }
}

impl TryFrom<Value> for Point {
    type Error = StrataError;
    fn try_from(v: Value) -> StrataResult<Self> {
        Vec2::try_from(v).map(Vec2::to_point)
    }
}

impl TryFrom<Value> for Color {
    type Error = StrataError;
    fn try_from(v: Value) -> StrataResult<Self> {
        match v {
            Value::Color(c) => Ok(c),
            other => Err(other.mismatch("color")),
        }
    }
}

impl TryFrom<Value> for String {
    type Error = StrataError;
    fn try_from(v: Value) -> StrataResult<Self> {
        match v {
            Value::String(s) => Ok(s),
            other => Err(other.mismatch("string")),
        }
    }
}

impl TryFrom<Value> for Gradient {
    type Error = StrataError;
    fn try_from(v: Value) -> StrataResult<Self> {
        match v {
            Value::Gradient(g) => Ok(g),
            other => Err(other.mismatch("gradient")),
        }
    }
}

impl<T> TryFrom<Value> for Vec<T>
where
    T: TryFrom<Value, Error = StrataError>,
{
    type Error = StrataError;
    fn try_from(v: Value) -> StrataResult<Self> {
        match v {
            Value::List(items) => items.into_iter().map(T::try_from).collect(),
            other => Err(other.mismatch("list")),
        }
    }
}

/// Value computed from the render parameters, e.g. the time or a duplicate index.
pub struct Link<T>(Arc<dyn Fn(&ContextParams) -> T + Send + Sync>);

impl<T> Clone for Link<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> fmt::Debug for Link<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Link(..)")
    }
}

/// A parameter that is either a constant or linked to the render parameters.
#[derive(Clone, Debug)]
pub enum Param<T> {
    Static(T),
    Linked(Link<T>),
}

impl<T: Clone> Param<T> {
    pub fn linked(f: impl Fn(&ContextParams) -> T + Send + Sync + 'static) -> Self {
        Param::Linked(Link(Arc::new(f)))
    }

    pub fn get(&self, params: &ContextParams) -> T {
        match self {
            Param::Static(v) => v.clone(),
            Param::Linked(link) => (link.0)(params),
        }
    }

    /// Value at default render parameters.
    pub fn value(&self) -> T {
        self.get(&ContextParams::default())
    }

    pub fn is_linked(&self) -> bool {
        matches!(self, Param::Linked(_))
    }
}

impl<T: Default> Default for Param<T> {
    fn default() -> Self {
        Param::Static(T::default())
    }
}

impl<T> From<T> for Param<T> {
    fn from(v: T) -> Self {
        Param::Static(v)
    }
}

/// Accessor pair for one named parameter of layer type `L`.
pub struct ParamDesc<L> {
    pub name: &'static str,
    pub get: fn(&L) -> Value,
    pub set: fn(&mut L, Value) -> StrataResult<()>,
}

/// Layer types with a static parameter table.
pub trait ParamTable: Sized + 'static {
    fn param_table() -> &'static [ParamDesc<Self>];
}

pub fn get_param<L: ParamTable>(layer: &L, name: &str) -> Option<Value> {
    L::param_table()
        .iter()
        .find(|d| d.name == name)
        .map(|d| (d.get)(layer))
}

pub fn set_param<L: ParamTable>(layer: &mut L, name: &str, value: Value) -> StrataResult<()> {
    let desc = L::param_table()
        .iter()
        .find(|d| d.name == name)
        .ok_or_else(|| StrataError::validation(format!("unknown parameter '{name}'")))?;
    (desc.set)(layer, value)
        .map_err(|e| StrataError::validation(format!("parameter '{name}': {e}")))
}

pub fn param_names<L: ParamTable>() -> Vec<&'static str> {
    L::param_table().iter().map(|d| d.name).collect()
}

/// Builds a [`ParamDesc`] for a field.
///
/// `param!("name", field)` converts through [`Value`]; `param!("name", field, Param)` does the
/// same for a [`Param`] field, reading its value at default render parameters and storing a
/// constant.
#[macro_export]
macro_rules! param {
    ($name:literal, $($field:ident).+) => {
        $crate::layer::param::ParamDesc {
            name: $name,
            get: |l| $crate::layer::param::Value::from(l.$($field).+.clone()),
            set: |l, v| {
                l.$($field).+ = ::core::convert::TryFrom::try_from(v)?;
                Ok(())
            },
        }
    };
    ($name:literal, $($field:ident).+, Param) => {
        $crate::layer::param::ParamDesc {
            name: $name,
            get: |l| $crate::layer::param::Value::from(l.$($field).+.value()),
            set: |l, v| {
                l.$($field).+ =
                    $crate::layer::param::Param::Static(::core::convert::TryFrom::try_from(v)?);
                Ok(())
            },
        }
    };
}

/// Applies `(name, value)` pairs as a loader would, migrating legacy blend settings.
///
/// `version` is the canvas file version; pass `None` for current documents.
pub fn load_params(
    layer: &mut dyn super::Layer,
    version: Option<&str>,
    pairs: Vec<(String, Value)>,
) -> StrataResult<()> {
    for (name, value) in pairs {
        layer.set_param(&name, value)?;
    }
    let Some(version) = version else {
        return Ok(());
    };
    let Some(current) = layer.composite().map(|c| c.blend_method) else {
        return Ok(());
    };
    let color = match layer.get_param("color") {
        Some(Value::Color(c)) => Some(c),
        _ => None,
    };
    let (method, migrated) =
        migrate_legacy_blend(version, current, color, layer.reads_context());
    if method != current {
        tracing::debug!(
            layer = layer.name(),
            from = current.id(),
            to = method.id(),
            "migrated legacy blend method"
        );
        layer.set_param("blend_method", Value::from(method))?;
    }
    if let Some(c) = migrated
        && color != Some(c)
    {
        layer.set_param("color", Value::Color(c))?;
    }
    Ok(())
}

/// Parameters of `layer` as a JSON object keyed by name.
pub fn params_to_json(layer: &dyn super::Layer) -> StrataResult<serde_json::Value> {
    let mut map = serde_json::Map::new();
    for name in layer.param_names() {
        if let Some(v) = layer.get_param(name) {
            map.insert(name.to_string(), serde_json::to_value(v)?);
        }
    }
    Ok(serde_json::Value::Object(map))
}

/// Applies a JSON object produced by [`params_to_json`].
pub fn params_from_json(
    layer: &mut dyn super::Layer,
    version: Option<&str>,
    json: &serde_json::Value,
) -> StrataResult<()> {
    let obj = json
        .as_object()
        .ok_or_else(|| StrataError::serde("layer parameters must be a JSON object"))?;
    let mut pairs = Vec::with_capacity(obj.len());
    for (name, v) in obj {
        pairs.push((name.clone(), serde_json::from_value::<Value>(v.clone())?));
    }
    load_params(layer, version, pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_convert_both_ways() {
        let v = Value::from(Point::new(1.0, 2.0));
        assert_eq!(Point::try_from(v).unwrap(), Point::new(1.0, 2.0));
        assert_eq!(f64::try_from(Value::Integer(3)).unwrap(), 3.0);
        assert_eq!(
            BlendMethod::try_from(Value::from(BlendMethod::Onto)).unwrap(),
            BlendMethod::Onto
        );
        assert!(Color::try_from(Value::Real(1.0)).is_err());
        assert!(BlendMethod::try_from(Value::Integer(999)).is_err());
    }

    #[test]
    fn json_form_is_tagged() {
        let json = serde_json::to_value(Value::Real(0.5)).unwrap();
        assert_eq!(json, serde_json::json!({"type": "real", "value": 0.5}));
        let back: Value = serde_json::from_value(json).unwrap();
        assert_eq!(back, Value::Real(0.5));
    }

    #[test]
    fn linked_params_follow_render_parameters() {
        let p: Param<f64> = Param::linked(|cp| cp.index * 2.0);
        let cp = ContextParams {
            index: 3.0,
            ..ContextParams::default()
        };
        assert_eq!(p.get(&cp), 6.0);
        assert_eq!(p.value(), 0.0);
        assert!(p.is_linked());
        assert_eq!(Param::Static(1.5).get(&cp), 1.5);
    }
}
