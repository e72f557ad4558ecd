//! Basic drawing example
//!
//! Demonstrates the core stroke workflow: load a preset, push a canned
//! pointer transcript, commit to history, undo, and export a PNG.

use vellum_core::brush::BrushPreset;
use vellum_core::pressure::{PointerKind, PressureSample};
use vellum_core::{DrawEngine, LayerOptions};

fn main() {
    println!("=== Vellum Core - Basic Drawing Example ===\n");

    println!("1. Creating drawing engine...");
    let mut engine = DrawEngine::new(512.0, 512.0);
    println!("   Engine created with config: {:?}\n", engine.config());

    println!("2. Setting up layers...");
    let bg_id = engine.add_layer("Background", LayerOptions::default());
    engine.set_active_layer(bg_id).unwrap();
    let drawing_id = engine.add_layer("Drawing", LayerOptions::default());
    println!("   Total layers: {}\n", engine.layers().layers().len());

    println!("3. Loading brush preset...");
    let preset_json = r#"{
        "id": "round-soft",
        "name": "Soft Round",
        "engine": {
            "backend": "stamping",
            "baseSize": 24.0,
            "shape": { "roundness": 1.0, "minSizeRatio": 0.25 }
        }
    }"#;
    let preset: BrushPreset = serde_json::from_str(preset_json).expect("valid preset JSON");
    println!("   Loaded preset '{}'\n", preset.name);

    println!("4. Drawing a stroke...");
    engine.set_active_layer(drawing_id).unwrap();
    let handle = engine.begin_stroke(&preset, "#2563EB", 7).expect("begin stroke");

    let transcript = sample_transcript();
    println!("   Transcript has {} samples", transcript.len());
    for sample in &transcript {
        engine.push_sample(handle, *sample).expect("push sample");
    }

    engine.end_stroke(handle).expect("end stroke");
    println!("   Stroke committed to 'Drawing' layer\n");

    println!("5. Undo/redo...");
    println!("   Can undo: {}", engine.can_undo());
    engine.undo().unwrap();
    println!("   Undid stroke. Can redo: {}", engine.can_redo());
    engine.redo().unwrap();
    println!("   Redid stroke.\n");

    println!("6. Exporting PNG...");
    let png_bytes = engine.export_png(None).expect("export png");
    println!("   Output size: {} bytes\n", png_bytes.len());

    println!("=== Example completed successfully! ===");
}

fn sample_transcript() -> Vec<PressureSample> {
    (0..50)
        .map(|i| {
            let t = i as f32 / 49.0;
            let x = 100.0 + t * 300.0;
            let y = 200.0 + (t * std::f32::consts::PI * 2.0).sin() * 50.0;
            PressureSample {
                x,
                y,
                t_ms: (i * 10) as f64,
                raw_pressure: Some(0.3 + t * 0.7),
                pointer_kind: PointerKind::Pen,
            }
        })
        .collect()
}
