// SPDX-License-Identifier: CEPL-1.0
use crate::config::AssetsCfg;
use anyhow::{bail, Context, Result};
use std::{fs, path::Path};
use tracing::info;
use waku_render::{MeshData, SceneAssets, ShaderSet, TextureData, Vertex};

const WHITE: [f32; 3] = [1.0, 1.0, 1.0];

pub fn load_scene(cfg: &AssetsCfg) -> Result<SceneAssets> {
    let mesh = load_mesh(&cfg.model)?;
    let texture = match &cfg.texture {
        Some(p) => load_texture(p)?,
        None => TextureData::white(),
    };
    let shaders = load_shaders(cfg.vertex_shader.as_deref(), cfg.fragment_shader.as_deref())?;
    Ok(SceneAssets {
        mesh,
        texture,
        shaders,
    })
}

/// All models in the file, triangulated, merged into one deduplicated mesh.
pub fn load_mesh(path: &Path) -> Result<MeshData> {
    let opts = tobj::LoadOptions {
        triangulate: true,
        single_index: true,
        ..Default::default()
    };
    let (models, _materials) =
        tobj::load_obj(path, &opts).with_context(|| format!("load {}", path.display()))?;

    let mut corners = Vec::new();
    for m in &models {
        corners.extend(face_vertices(&m.mesh.positions, &m.mesh.texcoords, &m.mesh.indices)?);
    }
    let mesh = MeshData::from_face_vertices(corners);
    info!(
        "{}: {} models, {} unique vertices, {} indices",
        path.display(),
        models.len(),
        mesh.vertices.len(),
        mesh.indices.len()
    );
    Ok(mesh)
}

/// One vertex per index, in face order. OBJ v runs bottom-up, Vulkan's top-down.
fn face_vertices(positions: &[f32], texcoords: &[f32], indices: &[u32]) -> Result<Vec<Vertex>> {
    indices
        .iter()
        .map(|&i| {
            let i = i as usize;
            let Some(p) = positions.get(3 * i..3 * i + 3) else {
                bail!("index {i} past {} positions", positions.len() / 3);
            };
            let uv = match texcoords.get(2 * i..2 * i + 2) {
                Some(t) => [t[0], 1.0 - t[1]],
                None if texcoords.is_empty() => [0.0, 0.0],
                None => bail!("index {i} past {} texcoords", texcoords.len() / 2),
            };
            Ok(Vertex::new([p[0], p[1], p[2]], WHITE, uv))
        })
        .collect()
}

pub fn load_texture(path: &Path) -> Result<TextureData> {
    let img = image::open(path)
        .with_context(|| format!("load {}", path.display()))?
        .to_rgba8();
    let (w, h) = img.dimensions();
    info!("{}: {w}x{h}", path.display());
    TextureData::new(w, h, img.into_raw())
}

fn load_shaders(vertex: Option<&Path>, fragment: Option<&Path>) -> Result<Option<ShaderSet>> {
    match (vertex, fragment) {
        (None, None) => Ok(None),
        (Some(v), Some(f)) => Ok(Some(ShaderSet {
            vertex: fs::read(v).with_context(|| format!("read {}", v.display()))?,
            fragment: fs::read(f).with_context(|| format!("read {}", f.display()))?,
        })),
        _ => bail!("vertex and fragment shaders must be given together"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_shares_corner_vertices() {
        let positions = [
            0.0, 0.0, 0.0, //
            1.0, 0.0, 0.0, //
            1.0, 1.0, 0.0, //
            0.0, 1.0, 0.0,
        ];
        let texcoords = [0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0];
        let indices = [0, 1, 2, 2, 3, 0];

        let corners = face_vertices(&positions, &texcoords, &indices).unwrap();
        assert_eq!(corners.len(), 6);
        let mesh = MeshData::from_face_vertices(corners);
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices, [0, 1, 2, 2, 3, 0]);
    }

    #[test]
    fn v_is_flipped_and_color_is_white() {
        let v = face_vertices(&[1.0, 2.0, 3.0], &[0.25, 0.125], &[0]).unwrap();
        assert_eq!(v[0].pos, [1.0, 2.0, 3.0]);
        assert_eq!(v[0].uv, [0.25, 0.875]);
        assert_eq!(v[0].color, WHITE);
    }

    #[test]
    fn missing_texcoords_default_to_zero() {
        let v = face_vertices(&[0.0; 9], &[], &[0, 1, 2]).unwrap();
        assert!(v.iter().all(|x| x.uv == [0.0, 0.0]));
    }

    #[test]
    fn out_of_range_index_is_an_error() {
        assert!(face_vertices(&[0.0; 3], &[], &[1]).is_err());
        assert!(face_vertices(&[0.0; 6], &[0.0; 2], &[1]).is_err());
    }

    #[test]
    fn half_a_shader_pair_is_rejected() {
        assert!(load_shaders(Some(Path::new("v.spv")), None).is_err());
        assert!(load_shaders(None, None).unwrap().is_none());
    }
}
