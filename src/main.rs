//! Melon Merge entry point
//!
//! In the browser the game draws to `<canvas id="canvas">` and is driven by
//! requestAnimationFrame. Natively there is no window: a scripted player
//! drops fruits into a headless scene and the result is printed.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_game {
    use std::cell::RefCell;
    use std::rc::Rc;
    use wasm_bindgen::prelude::*;
    use web_sys::{HtmlCanvasElement, PointerEvent};

    use melon_merge::renderer::canvas::CanvasSurface;
    use melon_merge::renderer::{PointerInput, PointerPhase, Surface};
    use melon_merge::sim::GameStatus;
    use melon_merge::{App, Settings};

    const CANVAS_ID: &str = "canvas";

    pub fn run() {
        console_error_panic_hook::set_once();
        let settings = Settings::load();
        let _ = console_log::init_with_level(settings.log_level());

        let seed = settings.seed.unwrap_or_else(|| js_sys::Date::now() as u64);
        log::info!("Melon Merge starting (seed {})", seed);

        let surfaces = Box::new(|| {
            CanvasSurface::from_element_id(CANVAS_ID).map(|s| Box::new(s) as Box<dyn Surface>)
        });
        let mut app = App::new(&settings, seed, surfaces);
        app.activate();

        let canvas = web_sys::window()
            .and_then(|w| w.document())
            .and_then(|d| d.get_element_by_id(CANVAS_ID))
            .and_then(|e| e.dyn_into::<HtmlCanvasElement>().ok());
        let app = Rc::new(RefCell::new(app));

        match canvas {
            Some(canvas) => {
                fit_to_canvas(&app, &canvas);
                setup_pointer(app.clone(), &canvas);
                setup_resize(app.clone(), canvas);
            }
            None => log::warn!("No #{} element, input disabled", CANVAS_ID),
        }

        request_animation_frame(app);
    }

    fn device_pixel_ratio() -> f64 {
        web_sys::window().map(|w| w.device_pixel_ratio()).unwrap_or(1.0)
    }

    /// Size the host area to the canvas' CSS box in device pixels
    fn fit_to_canvas(app: &Rc<RefCell<App>>, canvas: &HtmlCanvasElement) {
        let dpr = device_pixel_ratio();
        let w = (canvas.client_width() as f64 * dpr) as f32;
        let h = (canvas.client_height() as f64 * dpr) as f32;
        app.borrow_mut().resize(w, h);
    }

    fn setup_pointer(app: Rc<RefCell<App>>, canvas: &HtmlCanvasElement) {
        for (name, phase) in [
            ("pointerdown", PointerPhase::Down),
            ("pointermove", PointerPhase::Move),
            ("pointerup", PointerPhase::Up),
        ] {
            let app = app.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: PointerEvent| {
                if phase == PointerPhase::Move {
                    event.prevent_default();
                }
                let dpr = device_pixel_ratio();
                let input = PointerInput::new(
                    phase,
                    (event.offset_x() as f64 * dpr) as f32,
                    (event.offset_y() as f64 * dpr) as f32,
                );
                let mut app = app.borrow_mut();
                // A tap after game over starts a new session
                if phase == PointerPhase::Up && app.state().status() == Some(GameStatus::GameOver) {
                    app.restart();
                    return;
                }
                app.pointer(input);
            });
            let _ = canvas.add_event_listener_with_callback(name, closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn setup_resize(app: Rc<RefCell<App>>, canvas: HtmlCanvasElement) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
            fit_to_canvas(&app, &canvas);
        });
        let _ = window.add_event_listener_with_callback("resize", closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn request_animation_frame(app: Rc<RefCell<App>>) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let closure = Closure::once(move |time: f64| {
            game_loop(app, time);
        });
        let _ = window.request_animation_frame(closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn game_loop(app: Rc<RefCell<App>>, time: f64) {
        app.borrow_mut().frame(time);
        request_animation_frame(app);
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() {
    wasm_game::run();
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Melon Merge (native) starting...");
    log::info!("Native mode runs a scripted headless session - use `trunk serve` to play");

    let settings = melon_merge::Settings::load();
    let seed = settings.seed.unwrap_or_else(|| {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    });
    demo::run(&settings, seed);
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

#[cfg(not(target_arch = "wasm32"))]
mod demo {
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg32;

    use melon_merge::renderer::{Layer, PointerInput, PointerPhase};
    use melon_merge::{App, Settings};

    const HOST_WIDTH: f32 = 420.0;
    const HOST_HEIGHT: f32 = 720.0;
    const FRAME_MS: f64 = 1000.0 / 60.0;
    /// Frames between scripted drops
    const DROP_EVERY: u64 = 45;
    const MAX_FRAMES: u64 = 60 * 120;

    pub fn run(settings: &Settings, seed: u64) {
        let (mut app, scene) = App::with_scene(settings, seed);
        let mut player = Pcg32::seed_from_u64(seed ^ 0x5eed);
        app.activate();
        app.resize(HOST_WIDTH, HOST_HEIGHT);

        let mut frame = 0u64;
        while frame < MAX_FRAMES {
            app.frame(frame as f64 * FRAME_MS);
            frame += 1;

            if !app.state().is_playing() && app.state().scorecard.is_some() {
                break;
            }
            if frame % DROP_EVERY == 0 && app.state().pending.is_some() {
                let x = player.random_range(0.0..HOST_WIDTH);
                app.pointer(PointerInput::new(PointerPhase::Down, x, HOST_HEIGHT / 4.0));
                app.pointer(PointerInput::new(PointerPhase::Up, x, HOST_HEIGHT / 4.0));
            }
            if frame % 600 == 0 {
                log::info!(
                    "t={}s score={} fruits={}",
                    frame / 60,
                    app.state().score(),
                    app.state().fruits.len()
                );
            }
        }

        let state = app.state();
        println!("\nSeed:    {}", seed);
        println!("Frames:  {}", frame);
        println!("Status:  {:?}", state.status());
        println!("Score:   {}", state.score());
        println!("Fruits:  {}", state.fruits.len());
        if let Some(top) = state.fruits.iter().map(|f| f.level).max() {
            println!("Largest: level {}", top);
        }
        println!("On screen: {} fruit circles", scene.borrow().layer(Layer::Fruits).count());

        app.deactivate();
    }
}
