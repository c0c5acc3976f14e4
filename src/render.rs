use bevy::{
    asset::RenderAssetUsages,
    mesh::{Indices, PrimitiveTopology},
    prelude::*,
};

use crate::mesh::Isosurface;

/// Uploads [`Isosurface`] components into Bevy meshes.
///
/// ```text
/// Isosurface inserted
///   → Mesh3d inserted       (upload_isosurfaces)
///   → Isosurface removed
/// ```
pub struct IsosurfacePlugin;

impl Plugin for IsosurfacePlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, upload_isosurfaces);
    }
}

impl From<Isosurface> for Mesh {
    /// The vertex data Vecs are moved into the mesh without copying.
    fn from(surface: Isosurface) -> Self {
        let mut mesh = Mesh::new(
            PrimitiveTopology::TriangleList,
            RenderAssetUsages::RENDER_WORLD,
        );
        mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, surface.vertices);
        mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, surface.normals);
        mesh.insert_indices(Indices::U32(surface.indices));
        mesh
    }
}

/// Replaces every newly read back [`Isosurface`] with a [`Mesh3d`].
fn upload_isosurfaces(
    mut commands: Commands,
    query: Query<(Entity, &Isosurface)>,
    mut meshes: ResMut<Assets<Mesh>>,
) {
    for (entity, surface) in query.iter() {
        let mesh = Mesh::from(surface.clone());
        commands
            .entity(entity)
            .insert(Mesh3d(meshes.add(mesh)))
            .remove::<Isosurface>();
    }
}
