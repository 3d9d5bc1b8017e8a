use crate::error::{ErrorKind, Result};
use crate::process;
use exn::ResultExt;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::instrument;

/// A filesystem image mounted read-only through a loop device.
///
/// Dropping the guard unmounts the image and removes the mount point (if it
/// was created by [`attach`](Self::attach)), so the volume is released on
/// every exit path including errors and panics. Use
/// [`detach`](Self::detach) to observe unmount failures.
#[derive(Debug)]
pub struct Mount {
    point: PathBuf,
    mounted: bool,
    created: bool,
}
impl Mount {
    #[instrument(skip_all, fields(image = %image.display(), point = %point.display()))]
    pub async fn attach(image: &Path, point: &Path) -> Result<Self> {
        let mount = process::discover("mount")?;
        let created = !tokio::fs::try_exists(point).await.or_raise(|| ErrorKind::Io(point.to_path_buf()))?;
        if created {
            tokio::fs::create_dir_all(point).await.or_raise(|| ErrorKind::Io(point.to_path_buf()))?;
        }
        // From here on the guard owns the mount point.
        let mut guard = Self { point: point.to_path_buf(), mounted: false, created };
        process::run("mount", &mount, mount_args(image, point)).await?;
        guard.mounted = true;
        tracing::info!("Mounted distribution volume");
        Ok(guard)
    }

    pub fn point(&self) -> &Path {
        &self.point
    }

    /// Unmount now, reporting any failure.
    pub async fn detach(mut self) -> Result<()> {
        if self.mounted {
            let umount = process::discover("umount")?;
            process::run("umount", &umount, [self.point.as_os_str()]).await?;
            self.mounted = false;
        }
        if self.created {
            tokio::fs::remove_dir(&self.point).await.or_raise(|| ErrorKind::Io(self.point.clone()))?;
            self.created = false;
        }
        tracing::debug!(point = %self.point.display(), "Unmounted distribution volume");
        Ok(())
    }
}

impl Drop for Mount {
    fn drop(&mut self) {
        if self.mounted {
            match std::process::Command::new("umount").arg(&self.point).status() {
                Ok(status) if status.success() => {},
                Ok(status) => tracing::warn!(point = %self.point.display(), code = status.code(), "umount failed"),
                Err(error) => tracing::warn!(point = %self.point.display(), %error, "Could not run umount"),
            }
        }
        // Only an empty directory is removed; if the unmount failed the
        // volume's contents are still there and this fails harmlessly.
        if self.created
            && let Err(error) = std::fs::remove_dir(&self.point)
        {
            tracing::warn!(point = %self.point.display(), %error, "Could not remove mount point");
        }
    }
}

fn mount_args<'a>(image: &'a Path, point: &'a Path) -> [&'a OsStr; 4] {
    [OsStr::new("-o"), OsStr::new("loop,ro"), image.as_os_str(), point.as_os_str()]
}
