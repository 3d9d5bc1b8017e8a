//! Getting at the track containers inside an encrypted distribution volume.

mod decrypt;
mod mount;

pub use self::decrypt::Decrypter;
pub use self::mount::Mount;
