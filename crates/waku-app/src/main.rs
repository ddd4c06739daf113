// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use std::sync::mpsc;
use tracing::{error, info};
use waku_core::{init_tracing, load_toml, FpsCounter, FrameClock};
use waku_math::{model_spin, Camera, InputState, MoveKeys, UniformData};
use waku_platform::winit::keyboard::KeyCode;
use waku_platform::{Platform, PlatformEvent};
use waku_render::{wait_for_nonzero_extent, FrameStatus, Renderer, WindowHost};
use waku_render_vk::VkRenderer;

mod assets;
mod config;

use config::{AppCfg, Args};

fn move_key(code: KeyCode) -> Option<MoveKeys> {
    match code {
        KeyCode::KeyW => Some(MoveKeys::FORWARD),
        KeyCode::KeyS => Some(MoveKeys::BACKWARD),
        KeyCode::KeyA => Some(MoveKeys::LEFT),
        KeyCode::KeyD => Some(MoveKeys::RIGHT),
        _ => None,
    }
}

fn run(args: Args) -> Result<()> {
    let mut cfg: AppCfg = load_toml(&args.config)?;
    cfg.apply_args(&args);
    info!(
        "frames_in_flight={} validation={} present_mode={:?}",
        cfg.render.slot_count(),
        cfg.render.validation,
        cfg.render.present_mode
    );

    let scene = assets::load_scene(&cfg.assets)?;

    let mut platform = Platform::new(cfg.window.desc())?;
    let (tx, rx) = mpsc::channel();
    platform.set_event_sink(Box::new(move |ev| {
        // Receiver outlives the loop; a failed send only happens at exit.
        let _ = tx.send(ev);
    }));

    let Some(size) = wait_for_nonzero_extent(&mut platform) else {
        info!("window closed before first frame");
        return Ok(());
    };
    let mut renderer = {
        let window = platform.window()?;
        VkRenderer::new(window, window, size, &cfg.render, &scene).context("vulkan init")?
    };
    drop(scene);

    let mut input = InputState::new();
    let mut camera = Camera::new(size.width, size.height);
    let mut clock = FrameClock::new();
    let mut fps = FpsCounter::new();
    let mut shown_fps = None;
    let mut presented = 0u64;
    let mut skipped = 0u64;

    'main: loop {
        platform.pump()?;
        for ev in rx.try_iter() {
            match ev {
                PlatformEvent::CloseRequested
                | PlatformEvent::Key {
                    code: KeyCode::Escape,
                    pressed: true,
                } => break 'main,
                PlatformEvent::Key { code, pressed } => {
                    if let Some(k) = move_key(code) {
                        input.set(k, pressed);
                    }
                }
                // Key-up events go to whichever window has focus.
                PlatformEvent::Focused(false) => input.clear(),
                PlatformEvent::Focused(true) => {}
                PlatformEvent::Resized(_) => renderer.request_resize(),
            }
        }
        if platform.is_closing() {
            break;
        }

        let t = clock.tick();
        camera.update(&input, t.dt);
        let extent = renderer.extent();
        camera.set_viewport(extent.width, extent.height);

        let uniforms = UniformData {
            model: model_spin(t.elapsed),
            view: camera.view(),
            proj: camera.projection(),
        };
        match renderer.render(&mut platform, &uniforms)? {
            FrameStatus::Presented => presented += 1,
            FrameStatus::Skipped => skipped += 1,
        }

        let now = fps.record(t.dt);
        if shown_fps != Some(now) {
            platform.set_title(&format!("{} - {now} FPS", cfg.window.title));
            shown_fps = Some(now);
        }
    }

    info!(
        "exiting after {presented} frames ({skipped} skipped), avg {:.2} ms",
        fps.average_frame_time() * 1000.0
    );
    renderer.wait_idle()?;
    Ok(())
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wasd_maps_to_move_keys() {
        assert_eq!(move_key(KeyCode::KeyW), Some(MoveKeys::FORWARD));
        assert_eq!(move_key(KeyCode::KeyS), Some(MoveKeys::BACKWARD));
        assert_eq!(move_key(KeyCode::KeyA), Some(MoveKeys::LEFT));
        assert_eq!(move_key(KeyCode::KeyD), Some(MoveKeys::RIGHT));
        assert_eq!(move_key(KeyCode::KeyQ), None);
    }
}
