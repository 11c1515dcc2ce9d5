use cellfield::constants::{FPS_UPDATE_INTERVAL_SECS, WINDOW_HEIGHT, WINDOW_TITLE, WINDOW_WIDTH};
use cellfield::renderer::Renderer;
use cellfield::{FrameOutcome, SimError, Simulation, SimulationConfig};
use std::{cell::RefCell, rc::Rc, sync::Arc, time::Instant};
use winit::{
    dpi::PhysicalSize,
    event::{ElementState, Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget},
    keyboard::{KeyCode, PhysicalKey},
    window::WindowBuilder,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = SimulationConfig::new();
    let started = Instant::now();
    let mut simulation = Simulation::new(&config)?;
    log::info!(
        "World ready in {:.2}s; press any key to start, Escape to quit",
        started.elapsed().as_secs_f64()
    );

    let event_loop = EventLoop::new()?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(WINDOW_TITLE)
            .with_inner_size(PhysicalSize::new(WINDOW_WIDTH, WINDOW_HEIGHT))
            .build(&event_loop)?,
    );
    let mut renderer = pollster::block_on(Renderer::new(
        window.clone(),
        &config.camera,
        simulation.recording(),
    ))?;

    let fatal: Rc<RefCell<Option<SimError>>> = Rc::new(RefCell::new(None));
    let fatal_in_loop = fatal.clone();
    let mut last_fps_update_time = Instant::now();
    let mut frames_since_last_fps_update = 0u32;
    let mut current_fps = 0.0;

    event_loop.run(move |event, elwt: &EventLoopWindowTarget<()>| {
        elwt.set_control_flow(ControlFlow::Poll);
        match event {
            Event::AboutToWait => {
                if !simulation.is_paused() {
                    window.request_redraw();
                }
            }
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested => elwt.exit(),
                WindowEvent::Resized(physical_size) => {
                    renderer.resize(physical_size);
                    if simulation.is_paused() {
                        if let Err(e) = renderer.redraw() {
                            log::warn!("Redraw after resize failed: {}", e);
                        }
                    }
                }
                WindowEvent::KeyboardInput {
                    event: key_event, ..
                } => {
                    if key_event.state == ElementState::Pressed && !key_event.repeat {
                        match key_event.physical_key {
                            PhysicalKey::Code(KeyCode::Escape) => elwt.exit(),
                            _ => {
                                simulation.toggle_pause();
                                window.request_redraw();
                            }
                        }
                    }
                }
                WindowEvent::RedrawRequested => {
                    match simulation.run_frame(&mut renderer) {
                        Ok(FrameOutcome::Stepped { .. }) => frames_since_last_fps_update += 1,
                        Ok(FrameOutcome::Paused) => {}
                        Err(e) => {
                            log::error!("Fatal: {}", e);
                            *fatal_in_loop.borrow_mut() = Some(e);
                            elwt.exit();
                            return;
                        }
                    }

                    let now = Instant::now();
                    let elapsed_secs = now.duration_since(last_fps_update_time).as_secs_f64();
                    if elapsed_secs >= FPS_UPDATE_INTERVAL_SECS {
                        current_fps = frames_since_last_fps_update as f64 / elapsed_secs;
                        last_fps_update_time = now;
                        frames_since_last_fps_update = 0;
                        log::info!(
                            "{:.1} fps, frame {}, t = {:.2}",
                            current_fps,
                            simulation.frame_index(),
                            simulation.simulated_time()
                        );
                    }

                    let paused_text = if simulation.is_paused() { " [PAUSED]" } else { "" };
                    window.set_title(&format!(
                        "{} - Cells: {} - Frame: {} - FPS: {:.1}{}",
                        WINDOW_TITLE,
                        simulation.registry().cells().len(),
                        simulation.frame_index(),
                        current_fps,
                        paused_text
                    ));
                }
                _ => {}
            },
            _ => {}
        }
    })?;

    if let Some(e) = fatal.borrow_mut().take() {
        return Err(e.into());
    }
    Ok(())
}
