//! Procedural generation for the pool terrain and scene textures.

pub mod terrain;
pub mod textures;

pub use terrain::*;
pub use textures::*;
