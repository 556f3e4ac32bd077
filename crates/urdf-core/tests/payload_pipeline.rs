//! End-to-end: JSON payload in, posed robot out

use approx::assert_relative_eq;
use urdf_core::{
    JointType, Payload, ReferenceStyle, UpAxis, ViewerOptions, encode_base64, load_payload,
};

const TRIANGLE_STL: &str = "solid tri
facet normal 0 0 1
  outer loop
    vertex 0 0 0
    vertex 1 0 0
    vertex 0 1 0
  endloop
endfacet
endsolid tri
";

const GRIPPER: &str = r#"<?xml version="1.0"?>
<robot name="gripper">
  <link name="palm">
    <visual><geometry><mesh filename="package://gripper/meshes/palm.stl"/></geometry></visual>
  </link>
  <link name="finger_left">
    <visual><geometry><mesh filename="package://gripper/meshes/finger.stl" scale="0.5 0.5 0.5"/></geometry></visual>
  </link>
  <link name="finger_right">
    <visual><geometry><mesh filename="package://gripper/meshes/finger.stl" scale="0.5 0.5 0.5"/></geometry></visual>
  </link>
  <joint name="left" type="prismatic">
    <parent link="palm"/><child link="finger_left"/>
    <origin xyz="0 0.1 0"/><axis xyz="0 1 0"/>
    <limit lower="0" upper="0.04" effort="5" velocity="0.1"/>
  </joint>
  <joint name="right" type="prismatic">
    <parent link="palm"/><child link="finger_right"/>
    <origin xyz="0 -0.1 0"/><axis xyz="0 1 0"/>
    <limit lower="-0.04" upper="0" effort="5" velocity="0.1"/>
    <mimic joint="left" multiplier="-1" offset="0"/>
  </joint>
</robot>"#;

fn payload_json() -> String {
    let stl = encode_base64(TRIANGLE_STL.as_bytes());
    serde_json::json!({
        "urdf": encode_base64(GRIPPER.as_bytes()),
        "meshes": { "palm.stl": stl, "finger.stl": stl },
        "options": { "upAxis": "y", "initialDistance": 0.05, "background": "#202020" }
    })
    .to_string()
}

#[test]
fn json_payload_loads_and_poses() {
    let payload = Payload::from_json(&payload_json()).unwrap();
    assert_eq!(payload.options.up_axis, UpAxis::Y);
    assert_relative_eq!(payload.options.effective_distance(), 0.1);
    assert!(payload.options.show_grid);

    for style in [ReferenceStyle::ObjectUrl, ReferenceStyle::DataUrl] {
        let mut loaded = load_payload(&payload, style).unwrap();
        assert!(loaded.unresolved.is_empty());
        assert!(!loaded.rewritten_urdf.contains("package://"));

        let robot = &mut loaded.robot;
        assert_eq!(robot.root().name, "palm");
        assert_eq!(robot.joint("right").unwrap().joint_type, JointType::Prismatic);
        assert!(robot.visuals().all(|(_, v)| v.geometry.mesh().is_some()));

        // Past the upper limit: clamped, and the mimic joint follows
        assert_relative_eq!(robot.set_joint_value("left", 1.0).unwrap(), 0.04);
        assert_relative_eq!(robot.joint_value("right").unwrap(), -0.04);

        let right = robot.link("finger_right").unwrap();
        let origin = right.world_transform.w_axis.truncate();
        assert_relative_eq!(origin.y, -0.14, epsilon = 1e-6);
    }
}

#[test]
fn payload_round_trips_through_json() {
    let payload = Payload::new("<robot name=\"r\"><link name=\"a\"/></robot>")
        .with_mesh("a.stl", "AAAA")
        .with_options(ViewerOptions {
            show_grid: false,
            ..ViewerOptions::default()
        });
    let json = payload.to_json().unwrap();
    assert!(json.contains("\"showGrid\": false"));
    assert_eq!(Payload::from_json(&json).unwrap(), payload);
}

#[test]
fn non_object_payload_is_rejected() {
    assert!(Payload::from_json("[1, 2, 3]").is_err());
    assert!(Payload::from_json("not json").is_err());
}
