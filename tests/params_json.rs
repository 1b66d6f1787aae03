use serde_json::json;
use strata::layer::param::params_to_json;
use strata::{
    BlendMethod, Color, ContextParams, LAYER_NAMES, StrataError, Value, create_layer,
    create_layer_from_json,
};

fn tagged(v: Value) -> serde_json::Value {
    serde_json::to_value(v).unwrap()
}

#[test]
fn every_layer_survives_a_json_round_trip() {
    for name in LAYER_NAMES {
        let layer = create_layer(name).unwrap();
        let json = params_to_json(layer.as_ref()).unwrap();
        let text = serde_json::to_string(&json).unwrap();
        let reparsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        let back = create_layer_from_json(name, None, &reparsed).unwrap();
        for p in layer.param_names() {
            assert_eq!(layer.get_param(p), back.get_param(p), "{name}.{p}");
        }
    }
}

#[test]
fn parameters_apply_by_name() {
    let json = json!({
        "color": tagged(Value::Color(Color::green())),
        "amount": tagged(Value::Real(0.5)),
        "blend_method": tagged(Value::from(BlendMethod::Multiply)),
    });
    let layer = create_layer_from_json("solid_color", None, &json).unwrap();
    assert_eq!(layer.get_param("color"), Some(Value::Color(Color::green())));
    assert_eq!(layer.get_param("amount"), Some(Value::Real(0.5)));
    assert_eq!(
        layer.get_param("blend_method"),
        Some(Value::Integer(BlendMethod::Multiply.id()))
    );
}

#[test]
fn legacy_straight_layers_are_migrated() {
    let hole = json!({
        "color": tagged(Value::Color(Color::alpha())),
        "blend_method": tagged(Value::from(BlendMethod::Straight)),
    });
    let old = create_layer_from_json("solid_color", Some("0.2"), &hole).unwrap();
    assert_eq!(
        old.get_param("blend_method"),
        Some(Value::from(BlendMethod::AlphaOver))
    );
    assert_eq!(
        old.get_param("color"),
        Some(Value::Color(Color::alpha().with_alpha(1.0)))
    );

    let current = create_layer_from_json("solid_color", None, &hole).unwrap();
    assert_eq!(
        current.get_param("blend_method"),
        Some(Value::from(BlendMethod::Straight))
    );

    let opaque = json!({
        "color": tagged(Value::Color(Color::red())),
        "blend_method": tagged(Value::from(BlendMethod::Straight)),
    });
    let old = create_layer_from_json("solid_color", Some("0.1"), &opaque).unwrap();
    assert_eq!(
        old.get_param("blend_method"),
        Some(Value::from(BlendMethod::Composite))
    );

    let straight = json!({ "blend_method": tagged(Value::from(BlendMethod::Straight)) });
    let blur = create_layer_from_json("blur", Some("0.1"), &straight).unwrap();
    assert_eq!(
        blur.get_param("blend_method"),
        Some(Value::from(BlendMethod::Straight))
    );
}

#[test]
fn malformed_parameters_are_rejected() {
    let err = create_layer_from_json("solid_color", None, &json!([1, 2])).unwrap_err();
    assert!(matches!(err, StrataError::Serde(_)));

    let err = create_layer_from_json("solid_color", None, &json!({ "nope": tagged(Value::Bool(true)) }))
        .unwrap_err();
    assert!(err.to_string().contains("unknown parameter"));

    let err = create_layer_from_json(
        "solid_color",
        None,
        &json!({ "color": tagged(Value::Real(1.0)) }),
    )
    .unwrap_err();
    assert!(matches!(err, StrataError::Validation(_)));

    assert!(create_layer_from_json("teapot", None, &json!({})).is_err());
}

#[test]
fn render_parameters_round_trip_through_json() {
    let params = ContextParams {
        time: 2.5,
        z_range: true,
        z_range_depth: 3.0,
        ..ContextParams::default()
    };
    let text = serde_json::to_string(&params).unwrap();
    assert_eq!(serde_json::from_str::<ContextParams>(&text).unwrap(), params);
    let partial: ContextParams = serde_json::from_str(r#"{"time": 1.0}"#).unwrap();
    assert_eq!(partial, ContextParams::at_time(1.0));
}
