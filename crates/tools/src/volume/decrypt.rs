use crate::error::{ErrorKind, Result};
use crate::process;
use aes::Aes128;
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, KeyIvInit};
use exn::ResultExt;
use std::ffi::OsString;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::instrument;

const INPUT: &str = "{input}";
const OUTPUT: &str = "{output}";

const BLOB_KEY: [u8; 16] = [
    0x90, 0x83, 0x00, 0x04, 0x90, 0xA3, 0x00, 0x08, 0x90, 0xC3, 0x00, 0x0C, 0x4E, 0x80, 0x00, 0x20,
];
/// Each chunk is its own CBC stream.
const CHUNK_SIZE: usize = 0x8000;
/// The IV counts 512-byte sectors, so it advances by this much per chunk.
const SECTORS_PER_CHUNK: u32 = (CHUNK_SIZE / 512) as u32;

type ChunkDecryptor = cbc::Decryptor<Aes128>;

/// Turns the encrypted distribution blob into a mountable filesystem image.
///
/// By default the blob is decrypted in-process. A configured external command
/// can be used instead; `{input}` and `{output}` in its arguments are replaced
/// by the blob and image paths.
#[derive(Debug, Clone, Default)]
pub enum Decrypter {
    #[default]
    Builtin,
    Command { program: PathBuf, args: Vec<String> },
}
impl Decrypter {
    pub fn command(program: &str, args: impl IntoIterator<Item = impl Into<String>>) -> Result<Self> {
        let program = process::discover(program)?;
        Ok(Self::Command { program, args: args.into_iter().map(Into::into).collect() })
    }

    /// Decrypt `input` into `output`, unless `output` already exists.
    ///
    /// Returns `false` when decryption was skipped. The image is written to a
    /// temporary file beside `output` and only moved into place on success.
    #[instrument(skip_all, fields(input = %input.display(), output = %output.display()))]
    pub async fn decrypt(&self, input: &Path, output: &Path) -> Result<bool> {
        if tokio::fs::try_exists(output).await.or_raise(|| ErrorKind::Io(output.to_path_buf()))? {
            tracing::info!("Decrypted volume already present; skipping decryption");
            return Ok(false);
        }
        if !tokio::fs::try_exists(input).await.or_raise(|| ErrorKind::Io(input.to_path_buf()))? {
            exn::bail!(ErrorKind::Io(input.to_path_buf()));
        }
        let parent = output.parent().unwrap_or(Path::new("."));
        tokio::fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Io(parent.to_path_buf()))?;
        let staging = tempfile::Builder::new()
            .prefix(".ctpack-volume-")
            .tempfile_in(parent)
            .or_raise(|| ErrorKind::Io(parent.to_path_buf()))?;
        match self {
            Self::Builtin => {
                let source = input.to_path_buf();
                let target = staging.path().to_path_buf();
                tokio::task::spawn_blocking(move || decrypt_file(&source, &target))
                    .await
                    .or_raise(|| ErrorKind::Task)??;
            },
            Self::Command { program, .. } => {
                let tool = program.display().to_string();
                process::run(&tool, program, self.arguments(input, staging.path())).await?;
            },
        }
        staging.persist(output).or_raise(|| ErrorKind::Io(output.to_path_buf()))?;
        tracing::info!("Decrypted distribution volume");
        Ok(true)
    }

    fn arguments(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let Self::Command { args, .. } = self else {
            return Vec::new();
        };
        args.iter()
            .map(|arg| match arg.as_str() {
                INPUT => input.as_os_str().to_os_string(),
                OUTPUT => output.as_os_str().to_os_string(),
                other => other.replace(INPUT, &input.to_string_lossy()).replace(OUTPUT, &output.to_string_lossy()).into(),
            })
            .collect()
    }
}

fn decrypt_file(input: &Path, output: &Path) -> Result<()> {
    let reader = std::fs::File::open(input).or_raise(|| ErrorKind::Io(input.to_path_buf()))?;
    let writer = std::fs::File::create(output).or_raise(|| ErrorKind::Io(output.to_path_buf()))?;
    let mut writer = io::BufWriter::new(writer);
    decrypt_stream(reader, &mut writer).or_raise(|| ErrorKind::Decrypt(input.to_path_buf()))?;
    writer.flush().or_raise(|| ErrorKind::Io(output.to_path_buf()))?;
    Ok(())
}

fn iv(chunk: u32) -> [u8; 16] {
    let mut iv = [0; 16];
    for (slot, word) in iv.chunks_exact_mut(4).zip([0x8063_0004, 0x9083_0004, chunk * SECTORS_PER_CHUNK, 0x4E80_0020]) {
        slot.copy_from_slice(&u32::to_be_bytes(word));
    }
    iv
}

/// Decrypts chunk by chunk. Every chunk, including a short final one, must be
/// a whole number of AES blocks.
fn decrypt_stream(mut reader: impl Read, mut writer: impl Write) -> io::Result<()> {
    let mut buffer = vec![0; CHUNK_SIZE];
    for chunk in 0u32.. {
        let filled = fill(&mut reader, &mut buffer)?;
        if filled == 0 {
            break;
        }
        let plain = ChunkDecryptor::new(&BLOB_KEY.into(), &iv(chunk).into())
            .decrypt_padded_mut::<NoPadding>(&mut buffer[..filled])
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "chunk is not a whole number of blocks"))?;
        writer.write_all(plain)?;
        if filled < CHUNK_SIZE {
            break;
        }
    }
    Ok(())
}

/// Reads until `buffer` is full or the reader is exhausted.
fn fill(reader: &mut impl Read, buffer: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {},
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cbc::cipher::BlockEncryptMut;

    fn encrypt(plain: &[u8]) -> Vec<u8> {
        plain
            .chunks(CHUNK_SIZE)
            .zip(0u32..)
            .flat_map(|(chunk, index)| {
                let mut buffer = chunk.to_vec();
                cbc::Encryptor::<Aes128>::new(&BLOB_KEY.into(), &iv(index).into())
                    .encrypt_padded_mut::<NoPadding>(&mut buffer, chunk.len())
                    .unwrap();
                buffer
            })
            .collect()
    }

    fn volume_bytes(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 251) as u8).collect()
    }

    #[cfg(unix)]
    fn copying_decrypter() -> Decrypter {
        Decrypter::command("cp", ["{input}", "{output}"]).unwrap()
    }

    #[test]
    fn test_iv_counts_sectors() {
        assert_eq!(iv(0), [0x80, 0x63, 0, 4, 0x90, 0x83, 0, 4, 0, 0, 0, 0, 0x4E, 0x80, 0, 0x20]);
        assert_eq!(&iv(3)[8..12], &[0, 0, 0, 192]);
    }

    #[test]
    fn test_decrypt_stream_multiple_chunks() {
        let plain = volume_bytes(CHUNK_SIZE * 2 + 4096);
        let cipher = encrypt(&plain);
        assert_ne!(cipher, plain);
        // The second chunk restarts CBC with its own IV.
        assert_ne!(&cipher[CHUNK_SIZE..CHUNK_SIZE + 16], &encrypt(&plain[CHUNK_SIZE..])[..16]);
        let mut decrypted = Vec::new();
        decrypt_stream(cipher.as_slice(), &mut decrypted).unwrap();
        assert_eq!(decrypted, plain);
    }

    #[test]
    fn test_decrypt_stream_rejects_partial_block() {
        let cipher = encrypt(&volume_bytes(64));
        let err = decrypt_stream(&cipher[..60], &mut Vec::new()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn test_builtin_decrypt_then_skip() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("blob.bin");
        let output = dir.path().join("out/blob.dat");
        let plain = volume_bytes(CHUNK_SIZE + 512);
        std::fs::write(&input, encrypt(&plain)).unwrap();
        assert!(Decrypter::Builtin.decrypt(&input, &output).await.unwrap());
        assert_eq!(std::fs::read(&output).unwrap(), plain);
        std::fs::write(&input, b"changed").unwrap();
        assert!(!Decrypter::default().decrypt(&input, &output).await.unwrap());
        assert_eq!(std::fs::read(&output).unwrap(), plain);
    }

    #[tokio::test]
    async fn test_builtin_failure_leaves_no_image() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("blob.bin");
        let output = dir.path().join("blob.dat");
        std::fs::write(&input, b"not a whole block").unwrap();
        let err = Decrypter::Builtin.decrypt(&input, &output).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Decrypt(path) if path == &input));
        assert!(!output.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_arguments_substitution() {
        let decrypter = Decrypter::Command { program: PathBuf::from("ctgp-decrypt"), args: vec![
            "--in={input}".to_string(),
            "{output}".to_string(),
            "--raw".to_string(),
        ] };
        let args = decrypter.arguments(Path::new("in/blob.bin"), Path::new("out/.tmp"));
        assert_eq!(args, vec![OsString::from("--in=in/blob.bin"), OsString::from("out/.tmp"), OsString::from("--raw")]);
    }

    #[test]
    fn test_missing_program() {
        let err = Decrypter::command("ctpack-no-such-decrypter", ["{input}"]).unwrap_err();
        assert!(matches!(&*err, ErrorKind::ToolNotFound(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_decrypt() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("blob.bin");
        let output = dir.path().join("out/blob.dat");
        std::fs::write(&input, b"volume").unwrap();
        assert!(copying_decrypter().decrypt(&input, &output).await.unwrap());
        assert_eq!(std::fs::read(&output).unwrap(), b"volume");
    }

    #[tokio::test]
    async fn test_decrypt_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("blob.dat");
        let err = Decrypter::Builtin.decrypt(&dir.path().join("blob.bin"), &output).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Io(_)));
        assert!(!output.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_command_leaves_no_image() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("blob.bin");
        let output = dir.path().join("blob.dat");
        std::fs::write(&input, b"volume").unwrap();
        let decrypter = Decrypter::command("false", Vec::<String>::new()).unwrap();
        assert!(decrypter.decrypt(&input, &output).await.is_err());
        assert!(!output.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
