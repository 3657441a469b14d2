use crate::config::SshConfig;
use crate::domain::model::CommandOutput;
use crate::domain::ports::RemoteSession;
use crate::utils::error::{OpsError, Result};
use async_trait::async_trait;
use ssh2::Session;
use std::ffi::OsString;
use std::fs::File;
use std::io::{self, Read};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// `RemoteSession` over libssh2. All blocking calls run on the blocking pool.
#[derive(Clone)]
pub struct SshSession {
    session: Session,
}

impl SshSession {
    pub async fn connect(config: &SshConfig) -> Result<Self> {
        let config = config.clone();
        tokio::task::spawn_blocking(move || Self::connect_blocking(&config)).await?
    }

    fn connect_blocking(config: &SshConfig) -> Result<Self> {
        let connection_error = |message: String| OpsError::ConnectionError {
            host: config.address(),
            message,
        };

        let addr = config
            .address()
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| connection_error("address did not resolve".to_string()))?;

        tracing::info!("Connecting to {}...", config.address());
        let tcp = TcpStream::connect_timeout(&addr, config.connect_timeout())
            .map_err(|e| connection_error(e.to_string()))?;

        let mut session = Session::new()?;
        session.set_tcp_stream(tcp);
        session.handshake()?;

        // Host keys are accepted without pinning.
        match (&config.password, &config.private_key) {
            (Some(password), _) => session.userauth_password(&config.user, password)?,
            (None, Some(key)) => session.userauth_pubkey_file(
                &config.user,
                None,
                &expand_home(key),
                config.passphrase.as_deref(),
            )?,
            (None, None) => {
                return Err(OpsError::MissingConfigError {
                    field: "ssh.password or ssh.private_key".to_string(),
                })
            }
        }

        if !session.authenticated() {
            return Err(connection_error(format!(
                "authentication failed for user {}",
                config.user
            )));
        }

        tracing::debug!("Authenticated as {}", config.user);
        Ok(Self { session })
    }

    fn exec_blocking(session: &Session, command: &str) -> Result<CommandOutput> {
        let mut channel = session.channel_session()?;
        channel.exec(command)?;

        // Both streams share the channel window, so neither may be left unread.
        session.set_blocking(false);
        let drained = read_interleaved(&mut channel.stream(0), &mut channel.stderr(), || {
            channel.eof()
        });
        session.set_blocking(true);
        let (stdout, stderr) = drained?;

        channel.wait_close()?;
        let exit_status = channel.exit_status()?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_status,
        })
    }

    fn upload_blocking(session: &Session, local_path: &Path, remote_path: &str) -> Result<u64> {
        let upload_error = |message: String| OpsError::UploadFailed {
            local: local_path.display().to_string(),
            remote: remote_path.to_string(),
            message,
        };

        let sftp = session.sftp()?;
        let mut source = File::open(local_path)?;
        let mut target = sftp
            .create(Path::new(remote_path))
            .map_err(|e| upload_error(e.message().to_string()))?;

        io::copy(&mut source, &mut target).map_err(|e| upload_error(e.to_string()))
    }
}

#[async_trait]
impl RemoteSession for SshSession {
    async fn exec(&self, command: &str) -> Result<CommandOutput> {
        let session = self.session.clone();
        let command = command.to_string();
        tokio::task::spawn_blocking(move || Self::exec_blocking(&session, &command)).await?
    }

    async fn upload(&self, local_path: &Path, remote_path: &str) -> Result<u64> {
        let session = self.session.clone();
        let local_path = local_path.to_path_buf();
        let remote_path = remote_path.to_string();
        tokio::task::spawn_blocking(move || {
            Self::upload_blocking(&session, &local_path, &remote_path)
        })
        .await?
    }

    async fn close(&self) -> Result<()> {
        let session = self.session.clone();
        tokio::task::spawn_blocking(move || session.disconnect(None, "remote-patch done", None))
            .await??;
        Ok(())
    }
}

/// Reads two non-blocking streams in turn until `eof` holds and neither
/// has anything left.
fn read_interleaved<O: Read, E: Read>(
    stdout: &mut O,
    stderr: &mut E,
    eof: impl Fn() -> bool,
) -> io::Result<(Vec<u8>, Vec<u8>)> {
    let mut out = Vec::new();
    let mut err = Vec::new();
    let mut buf = [0u8; 8192];

    loop {
        let read_out = read_available(stdout, &mut buf, &mut out)?;
        let read_err = read_available(stderr, &mut buf, &mut err)?;

        if read_out == 0 && read_err == 0 {
            if eof() {
                return Ok((out, err));
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }
}

fn read_available<R: Read>(
    reader: &mut R,
    buf: &mut [u8],
    into: &mut Vec<u8>,
) -> io::Result<usize> {
    match reader.read(buf) {
        Ok(n) => {
            into.extend_from_slice(&buf[..n]);
            Ok(n)
        }
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
        Err(e) => Err(e),
    }
}

fn expand_home(path: &Path) -> PathBuf {
    expand_home_in(path, std::env::var_os("HOME"))
}

fn expand_home_in(path: &Path, home: Option<OsString>) -> PathBuf {
    match (path.strip_prefix("~"), home) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_expand_home() {
        let home = Some(OsString::from("/home/ops"));
        assert_eq!(
            expand_home_in(Path::new("~/.ssh/id_ed25519"), home.clone()),
            PathBuf::from("/home/ops/.ssh/id_ed25519")
        );
        assert_eq!(
            expand_home_in(Path::new("/etc/keys/deploy"), home),
            PathBuf::from("/etc/keys/deploy")
        );
        assert_eq!(
            expand_home_in(Path::new("~/.ssh/id_ed25519"), None),
            PathBuf::from("~/.ssh/id_ed25519")
        );
    }

    /// Yields `WouldBlock` between chunks, like a channel in non-blocking mode.
    struct Trickle<'a> {
        chunks: Vec<Vec<u8>>,
        unread: &'a Cell<usize>,
        blocked: bool,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.blocked = !self.blocked;
            if self.blocked {
                return Err(io::ErrorKind::WouldBlock.into());
            }
            if self.chunks.is_empty() {
                return Ok(0);
            }
            let chunk = self.chunks.remove(0);
            self.unread.set(self.unread.get() - 1);
            buf[..chunk.len()].copy_from_slice(&chunk);
            Ok(chunk.len())
        }
    }

    #[test]
    fn test_read_interleaved_drains_large_stderr() {
        let unread = Cell::new(51);
        let mut stdout = Trickle {
            chunks: vec![b"ok\n".to_vec()],
            unread: &unread,
            blocked: false,
        };
        let mut stderr = Trickle {
            chunks: (0..50).map(|_| vec![b'e'; 4096]).collect(),
            unread: &unread,
            blocked: false,
        };

        let (out, err) =
            read_interleaved(&mut stdout, &mut stderr, || unread.get() == 0).unwrap();

        assert_eq!(out, b"ok\n");
        assert_eq!(err.len(), 50 * 4096);
    }

    #[test]
    fn test_read_interleaved_waits_for_eof() {
        let mut stdout = io::Cursor::new(b"late".to_vec());
        let mut stderr = io::empty();
        let polls = Cell::new(0);
        let eof = || {
            polls.set(polls.get() + 1);
            polls.get() > 2
        };

        let (out, err) = read_interleaved(&mut stdout, &mut stderr, eof).unwrap();

        assert_eq!(out, b"late");
        assert!(err.is_empty());
        assert_eq!(polls.get(), 3);
    }

    #[tokio::test]
    async fn test_connect_refused_is_connection_error() {
        // Nothing listens on port 1 locally.
        let config = SshConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            user: "root".to_string(),
            password: Some("p".to_string()),
            private_key: None,
            passphrase: None,
            connect_timeout_seconds: 2,
        };

        let result = SshSession::connect(&config).await;
        assert!(matches!(result, Err(OpsError::ConnectionError { .. })));
    }
}
