//! Texture metadata side-table
//!
//! WebGL2 has no `glGetTexLevelParameteriv`, so the bridge remembers the
//! dimensions of every upload itself. Entries are keyed by texture handle
//! and mip level, which keeps a query correct after the guest rebinds or
//! uploads into some other texture.

use super::abi::gl;
use super::handles::Handle;
use std::collections::HashMap;

/// Dimensions recorded by the last `glTexImage2D` into a level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextureMeta {
    pub width: u32,
    pub height: u32,
}

/// Binding state plus per-texture metadata
#[derive(Debug, Default)]
pub struct TextureState {
    /// Active unit index (`GL_TEXTUREi - GL_TEXTURE0`)
    active_unit: u32,
    /// (unit, binding target) -> bound texture
    bindings: HashMap<(u32, u32), Handle>,
    /// (texture, level) -> dimensions
    meta: HashMap<(Handle, i32), TextureMeta>,
}

impl TextureState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `glActiveTexture(texture)`
    pub fn set_active_unit(&mut self, texture: u32) {
        self.active_unit = texture.wrapping_sub(gl::TEXTURE0);
    }

    pub fn active_unit(&self) -> u32 {
        self.active_unit
    }

    /// Track `glBindTexture(target, texture)`; null unbinds
    pub fn bind(&mut self, target: u32, texture: Handle) {
        let key = (self.active_unit, gl::binding_target(target));
        if texture.is_null() {
            self.bindings.remove(&key);
        } else {
            self.bindings.insert(key, texture);
        }
    }

    /// Texture bound to `target` (or its cube map) on the active unit
    pub fn bound(&self, target: u32) -> Option<Handle> {
        self.bindings
            .get(&(self.active_unit, gl::binding_target(target)))
            .copied()
    }

    /// Record an upload into whatever is bound to `target`
    pub fn record_upload(&mut self, target: u32, level: i32, width: u32, height: u32) {
        if let Some(texture) = self.bound(target) {
            self.meta.insert((texture, level), TextureMeta { width, height });
        }
    }

    pub fn meta(&self, texture: Handle, level: i32) -> Option<TextureMeta> {
        self.meta.get(&(texture, level)).copied()
    }

    /// Answer `glGetTexLevelParameteriv` for the texture bound to `target`
    ///
    /// A level with no upload of its own derives from level 0 the way the
    /// mip chain would. Anything unknown reads as 0.
    pub fn level_parameter(&self, target: u32, level: i32, pname: u32) -> i32 {
        let Some(texture) = self.bound(target) else {
            return 0;
        };

        let dims = match self.meta(texture, level) {
            Some(meta) => meta,
            None if level > 0 => match self.meta(texture, 0) {
                Some(base) => TextureMeta {
                    width: mip_dim(base.width, level),
                    height: mip_dim(base.height, level),
                },
                None => return 0,
            },
            None => return 0,
        };

        match pname {
            gl::TEXTURE_WIDTH => dims.width as i32,
            gl::TEXTURE_HEIGHT => dims.height as i32,
            _ => 0,
        }
    }

    /// Drop everything known about a deleted texture
    pub fn forget(&mut self, texture: Handle) {
        self.meta.retain(|(t, _), _| *t != texture);
        self.bindings.retain(|_, bound| *bound != texture);
    }
}

fn mip_dim(base: u32, level: i32) -> u32 {
    let shift = level.clamp(0, 31) as u32;
    (base >> shift).max(1)
}
