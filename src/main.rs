//! soft3d viewer: an interactive window around the software renderer.
//!
//! Drag to rotate, scroll or shift-drag to zoom, click to identify the mesh
//! under the cursor. Hotkeys cycle render mode and working resolution; on
//! desktop, `O` opens an OBJ model or RON scene.

use macroquad::prelude as mq;
use macroquad::prelude::{
    clear_background, draw_text, draw_texture_ex, is_key_pressed, is_mouse_button_down,
    is_mouse_button_pressed, is_mouse_button_released, mouse_position, mouse_wheel, next_frame,
    screen_height, screen_width, Conf, DrawTextureParams, FilterMode, KeyCode, MouseButton,
    Texture2D,
};
use soft3d::scene::persist::load_scene;
use soft3d::{loader, Color, Definition, Mesh, RenderMode, Scene, Vec2, Vec3, Viewer, VERSION};

const FRAME_WIDTH: usize = 800;
const FRAME_HEIGHT: usize = 600;

/// Drags shorter than this (in pixels) count as clicks.
const CLICK_SLOP: f32 = 3.0;

fn window_conf() -> Conf {
    Conf {
        window_title: format!("soft3d v{}", VERSION),
        window_width: FRAME_WIDTH as i32,
        window_height: FRAME_HEIGHT as i32,
        window_resizable: true,
        high_dpi: true,
        ..Default::default()
    }
}

/// A textured cube to look at before any file is opened.
fn demo_scene() -> Scene {
    let mut scene = Scene::new("demo");
    let tex = scene.add_texture(soft3d::Texture::checkerboard(
        64,
        8,
        Color::new(0xca, 0xa6, 0x18),
        Color::new(0x40, 0x35, 0x10),
    ));

    let mut cube = Mesh::new("cube");
    cube.vertices = vec![
        Vec3::new(-1.0, -1.0, -1.0),
        Vec3::new(1.0, -1.0, -1.0),
        Vec3::new(1.0, 1.0, -1.0),
        Vec3::new(-1.0, 1.0, -1.0),
        Vec3::new(-1.0, -1.0, 1.0),
        Vec3::new(1.0, -1.0, 1.0),
        Vec3::new(1.0, 1.0, 1.0),
        Vec3::new(-1.0, 1.0, 1.0),
    ];
    #[rustfmt::skip]
    cube.set_index_stream(&[
        4, 5, 6, 7, -1, // +z
        1, 0, 3, 2, -1, // -z
        5, 1, 2, 6, -1, // +x
        0, 4, 7, 3, -1, // -x
        3, 7, 6, 2, -1, // +y
        0, 1, 5, 4, -1, // -y
    ]);
    cube.uvs = vec![
        Vec2::new(0.0, 0.0),
        Vec2::new(1.0, 0.0),
        Vec2::new(1.0, 1.0),
        Vec2::new(0.0, 1.0),
    ];
    #[rustfmt::skip]
    cube.set_uv_index_stream(&[
        0, 1, 2, 3, -1,
        0, 1, 2, 3, -1,
        0, 1, 2, 3, -1,
        0, 1, 2, 3, -1,
        0, 1, 2, 3, -1,
        0, 1, 2, 3, -1,
    ]);
    cube.texture = Some(tex);
    scene.add_mesh(cube);
    scene
}

fn cycle_definition(current: Definition) -> Definition {
    match current {
        Definition::Low => Definition::Standard,
        Definition::Standard => Definition::High,
        Definition::High => Definition::Low,
    }
}

fn mode_label(mode: RenderMode) -> &'static str {
    match mode {
        RenderMode::Point => "point",
        RenderMode::Wireframe => "wireframe",
        RenderMode::Flat => "flat",
        RenderMode::Smooth => "smooth",
        RenderMode::Texture => "texture",
        RenderMode::TextureFlat => "texture+flat",
        RenderMode::TextureSmooth => "texture+smooth",
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn open_scene_dialog(viewer: &mut Viewer) {
    let dialog = rfd::FileDialog::new()
        .add_filter("3D scenes", &["obj", "ron"])
        .add_filter("Wavefront OBJ", &["obj"])
        .add_filter("RON scene", &["ron"]);

    let Some(path) = dialog.pick_file() else { return };
    let token = viewer.begin_load();

    let is_ron = path
        .extension()
        .map_or(false, |e| e.eq_ignore_ascii_case("ron"));
    let loaded = if is_ron {
        load_scene(&path).map_err(|e| e.to_string())
    } else {
        loader::load_obj_file(&path)
    };

    match loaded {
        Ok(scene) => {
            let accepted = viewer.finish_load(token, scene);
            if accepted {
                println!("Opened {}", path.display());
            }
        }
        Err(e) => eprintln!("Failed to open {}: {}", path.display(), e),
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    let mut viewer = Viewer::new(FRAME_WIDTH, FRAME_HEIGHT, Definition::Standard);
    viewer.renderer.mipmapping = true;
    viewer.set_render_mode(RenderMode::TextureSmooth);
    viewer.replace_scene(demo_scene());
    viewer.renderer.rotate(-20.0, 30.0, 0.0);
    viewer.request_frame();

    let mut frame_texture: Option<Texture2D> = None;
    let mut last_mouse = mouse_position();
    let mut press_pos: Option<(f32, f32)> = None;

    println!("soft3d v{} - drag rotate / wheel zoom / click pick", VERSION);

    loop {
        let mouse = mouse_position();
        let shift = mq::is_key_down(KeyCode::LeftShift) || mq::is_key_down(KeyCode::RightShift);

        // window coords -> output-surface coords
        let sx = FRAME_WIDTH as f32 / screen_width();
        let sy = FRAME_HEIGHT as f32 / screen_height();
        let frame_x = mouse.0 * sx;
        let frame_y = mouse.1 * sy;

        if is_mouse_button_pressed(MouseButton::Left) {
            press_pos = Some(mouse);
        }
        if is_mouse_button_down(MouseButton::Left) {
            let dx = mouse.0 - last_mouse.0;
            let dy = mouse.1 - last_mouse.1;
            if dx != 0.0 || dy != 0.0 {
                if shift {
                    viewer.zoom_step(dy < 0.0);
                } else {
                    viewer.drag_rotate(dx * sx, dy * sy);
                }
            }
        }
        if is_mouse_button_released(MouseButton::Left) {
            if let Some((px, py)) = press_pos.take() {
                let moved = (mouse.0 - px).abs() + (mouse.1 - py).abs();
                if moved < CLICK_SLOP {
                    match viewer.pick(frame_x as usize, frame_y as usize) {
                        Some(hit) => println!(
                            "picked mesh '{}' (id {}) at depth {:.2}",
                            hit.mesh_name, hit.mesh_id, hit.depth
                        ),
                        None => println!("picked nothing"),
                    }
                }
            }
        }

        let wheel = mouse_wheel().1;
        if wheel != 0.0 {
            viewer.zoom_step(wheel > 0.0);
        }

        if is_key_pressed(KeyCode::M) {
            let next = viewer.renderer.mode.cycle();
            viewer.set_render_mode(next);
        }
        if is_key_pressed(KeyCode::D) {
            let next = cycle_definition(viewer.renderer.fb.definition);
            viewer.set_definition(next);
        }
        #[cfg(not(target_arch = "wasm32"))]
        if is_key_pressed(KeyCode::O) {
            open_scene_dialog(&mut viewer);
        }

        if viewer.tick() {
            let tex = Texture2D::from_rgba8(
                FRAME_WIDTH as u16,
                FRAME_HEIGHT as u16,
                viewer.frame_bytes(),
            );
            tex.set_filter(FilterMode::Nearest);
            frame_texture = Some(tex);
        }

        clear_background(mq::BLACK);
        if let Some(tex) = &frame_texture {
            draw_texture_ex(
                tex,
                0.0,
                0.0,
                mq::WHITE,
                DrawTextureParams {
                    dest_size: Some(mq::vec2(screen_width(), screen_height())),
                    ..Default::default()
                },
            );
        }

        let status = format!(
            "[M] mode: {}   [D] definition: {:?}   [O] open   zoom {:.2}",
            mode_label(viewer.renderer.mode),
            viewer.renderer.fb.definition,
            viewer.renderer.zoom,
        );
        draw_text(&status, 10.0, 20.0, 20.0, mq::WHITE);

        last_mouse = mouse;
        next_frame().await;
    }
}
