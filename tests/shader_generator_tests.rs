//! Shader Generator Tests
//!
//! Tests for:
//! - Entry point dependency ordering in the generated source
//! - Cycle rejection
//! - Global declarations
//! - Default interpolation of texture coordinates and colors

use kiln::resources::{MeshFormat, MeshVertexAttribute, StorageType};
use kiln::shader::{Block, EntryPoint, Generator, NamedNumType, NumType, ProgrammableGraphicsStage};

fn generator() -> Generator {
    Generator {
        mesh_format: MeshFormat {
            vertex_attributes: vec![MeshVertexAttribute::new("position", 3, StorageType::Float32)],
            ..Default::default()
        },
        output_fields: vec![NamedNumType::new("color", NumType::FLOAT4)],
        ..Default::default()
    }
}

fn writes(global: &str) -> Block {
    Block::write_global(global, NumType::FLOAT, Block::direct("1.0"))
}

fn position_of(source: &str, global: &str) -> usize {
    source
        .find(&format!("p_Vertex_globals.{global} = "))
        .unwrap_or_else(|| panic!("{global} not written in:\n{source}"))
}

// ============================================================================
// Ordering
// ============================================================================

#[test]
fn dependencies_order_entry_points() {
    let a = EntryPoint::new("A", ProgrammableGraphicsStage::Vertex, writes("a"));
    let b = EntryPoint::new("B", ProgrammableGraphicsStage::Vertex, writes("b")).after("A");
    let c = EntryPoint::new("C", ProgrammableGraphicsStage::Vertex, writes("c")).before("B");

    let output = generator().build(&[&b, &a, &c]);
    assert!(output.errors.is_empty(), "{:?}", output.errors);

    let source = &output.wgsl_source;
    assert!(position_of(source, "c") < position_of(source, "b"));
    assert!(position_of(source, "a") < position_of(source, "b"));
}

#[test]
fn cycle_is_reported() {
    let a = EntryPoint::new("A", ProgrammableGraphicsStage::Vertex, writes("a")).after("B");
    let b = EntryPoint::new("B", ProgrammableGraphicsStage::Vertex, writes("b")).after("A");

    let output = generator().build(&[&a, &b]);
    assert_eq!(output.errors.len(), 1);
    assert!(output.errors[0].message.contains("cycle"));
    assert!(output.wgsl_source.is_empty());
}

#[test]
fn stages_are_ordered_independently() {
    // Same names in different stages do not constrain each other.
    let vertex = EntryPoint::new("main", ProgrammableGraphicsStage::Vertex, writes("v"));
    let fragment = EntryPoint::new(
        "main",
        ProgrammableGraphicsStage::Fragment,
        Block::write_output("color", NumType::FLOAT4, Block::direct("vec4<f32>(1.0)")),
    )
    .after("main");

    let output = generator().build(&[&fragment, &vertex]);
    assert!(output.errors.is_empty(), "{:?}", output.errors);
}

// ============================================================================
// Globals
// ============================================================================

#[test]
fn global_declared_once() {
    let first = EntryPoint::new(
        "first",
        ProgrammableGraphicsStage::Vertex,
        Block::write_global("worldPosition", NumType::FLOAT4, Block::direct("vec4<f32>(0.0)")),
    );
    let second = EntryPoint::new(
        "second",
        ProgrammableGraphicsStage::Vertex,
        Block::write_global("worldPosition", NumType::FLOAT4, Block::read_global("worldPosition")),
    )
    .after("first");

    let output = generator().build(&[&first, &second]);
    assert!(output.errors.is_empty(), "{:?}", output.errors);
    assert_eq!(output.wgsl_source.matches("worldPosition: vec4<f32>").count(), 1);
}

#[test]
fn global_type_conflict_is_an_error() {
    let first = EntryPoint::new(
        "first",
        ProgrammableGraphicsStage::Vertex,
        Block::write_global("value", NumType::FLOAT4, Block::direct("vec4<f32>(0.0)")),
    );
    let second = EntryPoint::new(
        "second",
        ProgrammableGraphicsStage::Vertex,
        Block::write_global("value", NumType::FLOAT, Block::direct("0.0")),
    )
    .after("first");

    let output = generator().build(&[&first, &second]);
    assert_eq!(output.errors.len(), 1);
}

// ============================================================================
// Default Interpolation
// ============================================================================

fn textured_generator() -> Generator {
    Generator {
        mesh_format: MeshFormat {
            vertex_attributes: vec![
                MeshVertexAttribute::new("position", 3, StorageType::Float32),
                MeshVertexAttribute::new("normal", 3, StorageType::Float32),
                MeshVertexAttribute::new("texCoord0", 2, StorageType::Float32),
                MeshVertexAttribute::new("color0", 4, StorageType::Float32),
            ],
            ..Default::default()
        },
        ..generator()
    }
}

#[test]
fn matching_inputs_are_forwarded() {
    let interpolate = EntryPoint::new(
        "interpolate",
        ProgrammableGraphicsStage::Vertex,
        Block::default_interpolation(),
    );

    let output = textured_generator().build(&[&interpolate]);
    assert!(output.errors.is_empty(), "{:?}", output.errors);

    let source = &output.wgsl_source;
    assert!(source.contains("p_Vertex_output.texCoord0 = p_Vertex_input.texCoord0;"), "{source}");
    assert!(source.contains("p_Vertex_output.color0 = p_Vertex_input.color0;"), "{source}");
    assert!(!source.contains("p_Vertex_output.normal"), "{source}");
}

#[test]
fn written_outputs_are_not_forwarded() {
    let flip = EntryPoint::new(
        "flip",
        ProgrammableGraphicsStage::Vertex,
        Block::write_output(
            "texCoord0",
            NumType::FLOAT2,
            Block::compound([
                Block::direct("vec2<f32>(1.0) - "),
                Block::read_input("texCoord0"),
            ]),
        ),
    );
    let interpolate = EntryPoint::new(
        "interpolate",
        ProgrammableGraphicsStage::Vertex,
        Block::default_interpolation(),
    )
    .after("flip");

    let output = textured_generator().build(&[&interpolate, &flip]);
    assert!(output.errors.is_empty(), "{:?}", output.errors);

    let source = &output.wgsl_source;
    assert_eq!(source.matches("p_Vertex_output.texCoord0 = ").count(), 1, "{source}");
    assert!(source.contains("p_Vertex_output.texCoord0 = vec2<f32>(1.0) - p_Vertex_input.texCoord0;"));
    assert!(source.contains("p_Vertex_output.color0 = p_Vertex_input.color0;"));
}
