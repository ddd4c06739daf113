// SPDX-License-Identifier: CEPL-1.0
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use waku_platform::WindowDesc;
use waku_render::RenderConfig;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// TOML config file. Missing means defaults.
    #[arg(long, default_value = "waku.toml")]
    pub config: PathBuf,
    /// Wavefront OBJ mesh
    #[arg(long)]
    pub model: Option<PathBuf>,
    /// Texture image (png or jpeg)
    #[arg(long)]
    pub texture: Option<PathBuf>,
    #[arg(long)]
    pub frames_in_flight: Option<usize>,
    /// Enable the Khronos validation layer
    #[arg(long, overrides_with = "no_validation")]
    pub validation: bool,
    #[arg(long, overrides_with = "validation")]
    pub no_validation: bool,
    /// SPIR-V vertex shader, used with --fragment-shader
    #[arg(long)]
    pub vertex_shader: Option<PathBuf>,
    /// SPIR-V fragment shader, used with --vertex-shader
    #[arg(long)]
    pub fragment_shader: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WindowCfg {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowCfg {
    fn default() -> Self {
        let d = WindowDesc::default();
        Self {
            title: d.title,
            width: d.width,
            height: d.height,
        }
    }
}

impl WindowCfg {
    pub fn desc(&self) -> WindowDesc {
        WindowDesc {
            title: self.title.clone(),
            width: self.width,
            height: self.height,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssetsCfg {
    pub model: PathBuf,
    /// None draws the mesh with a 1x1 white texture.
    pub texture: Option<PathBuf>,
    pub vertex_shader: Option<PathBuf>,
    pub fragment_shader: Option<PathBuf>,
}

impl Default for AssetsCfg {
    fn default() -> Self {
        Self {
            model: PathBuf::from("assets/models/model.obj"),
            texture: Some(PathBuf::from("assets/textures/texture.jpg")),
            vertex_shader: None,
            fragment_shader: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppCfg {
    pub window: WindowCfg,
    pub render: RenderConfig,
    pub assets: AssetsCfg,
}

impl AppCfg {
    /// Command-line values win over the file.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(p) = &args.model {
            self.assets.model = p.clone();
        }
        if let Some(p) = &args.texture {
            self.assets.texture = Some(p.clone());
        }
        if let Some(p) = &args.vertex_shader {
            self.assets.vertex_shader = Some(p.clone());
        }
        if let Some(p) = &args.fragment_shader {
            self.assets.fragment_shader = Some(p.clone());
        }
        if let Some(n) = args.frames_in_flight {
            self.render.frames_in_flight = n;
        }
        if args.validation {
            self.render.validation = true;
        } else if args.no_validation {
            self.render.validation = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waku_render::PresentModePref;

    #[test]
    fn empty_file_is_all_defaults() {
        let cfg: AppCfg = toml::from_str("").unwrap();
        assert_eq!(cfg.window.title, "Waku");
        assert_eq!((cfg.window.width, cfg.window.height), (800, 600));
        assert_eq!(cfg.render, RenderConfig::default());
        assert_eq!(cfg.assets.model, PathBuf::from("assets/models/model.obj"));
    }

    #[test]
    fn partial_sections_fill_in() {
        let cfg: AppCfg = toml::from_str(
            r#"
            [render]
            frames_in_flight = 3
            present_mode = "fifo"
            clear_color = [0.1, 0.2, 0.3, 1.0]

            [assets]
            model = "cube.obj"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.render.frames_in_flight, 3);
        assert_eq!(cfg.render.present_mode, PresentModePref::Fifo);
        assert_eq!(cfg.render.clear_color, [0.1, 0.2, 0.3, 1.0]);
        assert_eq!(cfg.assets.model, PathBuf::from("cube.obj"));
        assert!(cfg.assets.texture.is_some());
        assert_eq!(cfg.window.width, 800);
    }

    #[test]
    fn unknown_present_mode_is_rejected() {
        let r: Result<AppCfg, _> = toml::from_str("[render]\npresent_mode = \"immediate\"\n");
        assert!(r.is_err());
    }

    #[test]
    fn cli_overrides_file() {
        let mut cfg = AppCfg::default();
        cfg.render.validation = true;
        let args = Args::try_parse_from([
            "waku",
            "--model",
            "a.obj",
            "--frames-in-flight",
            "4",
            "--no-validation",
            "--vertex-shader",
            "v.spv",
            "--fragment-shader",
            "f.spv",
        ])
        .unwrap();
        cfg.apply_args(&args);
        assert_eq!(cfg.assets.model, PathBuf::from("a.obj"));
        assert_eq!(cfg.render.frames_in_flight, 4);
        assert!(!cfg.render.validation);
        assert_eq!(cfg.assets.vertex_shader, Some(PathBuf::from("v.spv")));
        assert_eq!(cfg.assets.fragment_shader, Some(PathBuf::from("f.spv")));
    }

    #[test]
    fn last_validation_flag_wins() {
        let args = Args::try_parse_from(["waku", "--no-validation", "--validation"]).unwrap();
        assert!(args.validation && !args.no_validation);
        let mut cfg = AppCfg::default();
        cfg.render.validation = false;
        cfg.apply_args(&args);
        assert!(cfg.render.validation);
    }

    #[test]
    fn no_flags_keep_file_values() {
        let args = Args::try_parse_from(["waku"]).unwrap();
        let mut cfg: AppCfg = toml::from_str("[render]\nvalidation = true\n").unwrap();
        cfg.apply_args(&args);
        assert!(cfg.render.validation);
        assert_eq!(args.config, PathBuf::from("waku.toml"));
    }
}
