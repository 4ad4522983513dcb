use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rax_ftpd::config::UserEntry;
use rax_ftpd::{Server, ServerConfig};
use rustls::RootCertStore;
use rustls::pki_types::ServerName;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

const REPLY_TIMEOUT: Duration = Duration::from_secs(10);

fn test_config(root: &Path, data_ports: u16) -> ServerConfig {
    ServerConfig {
        bind_address: "127.0.0.1".into(),
        control_port: 0,
        data_port_min: data_ports,
        data_port_max: data_ports + 50,
        server_root: root.display().to_string(),
        users: vec![UserEntry {
            name: "alice".into(),
            password: "alice123".into(),
        }],
        ..ServerConfig::default()
    }
}

async fn start_server(config: ServerConfig) -> (Arc<Server>, SocketAddr) {
    let server = Arc::new(Server::new(config).await.unwrap());
    let addr = server.local_addr().unwrap();
    let running = Arc::clone(&server);
    tokio::spawn(async move {
        running.run().await.unwrap();
    });
    (server, addr)
}

/// Self-signed certificate for `localhost`, written as PEM files under `dir`.
struct TestCertificate {
    cert_path: String,
    key_path: String,
    roots: RootCertStore,
}

impl TestCertificate {
    fn generate(dir: &Path) -> Self {
        let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let cert_pem = cert.serialize_pem().unwrap();
        let cert_path = dir.join("cert.pem");
        let key_path = dir.join("key.pem");
        std::fs::write(&cert_path, &cert_pem).unwrap();
        std::fs::write(&key_path, cert.serialize_private_key_pem()).unwrap();

        let mut roots = RootCertStore::empty();
        for der in rustls_pemfile::certs(&mut cert_pem.as_bytes()) {
            roots.add(der.unwrap()).unwrap();
        }
        Self {
            cert_path: cert_path.display().to_string(),
            key_path: key_path.display().to_string(),
            roots,
        }
    }

    fn connector(&self) -> TlsConnector {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = rustls::ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_root_certificates(self.roots.clone())
            .with_no_client_auth();
        TlsConnector::from(Arc::new(config))
    }
}

async fn tls_connect(connector: &TlsConnector, stream: TcpStream) -> TlsStream<TcpStream> {
    let name = ServerName::try_from("localhost").unwrap();
    tokio::time::timeout(REPLY_TIMEOUT, connector.connect(name, stream))
        .await
        .expect("TLS handshake timed out")
        .unwrap()
}

struct Client<S = TcpStream> {
    stream: BufReader<S>,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        Self {
            stream: BufReader::new(TcpStream::connect(addr).await.unwrap()),
        }
    }

    /// Runs the client side of the handshake after a 234 reply.
    async fn secure(self, connector: &TlsConnector) -> Client<TlsStream<TcpStream>> {
        assert!(self.stream.buffer().is_empty());
        let tls = tls_connect(connector, self.stream.into_inner()).await;
        Client {
            stream: BufReader::new(tls),
        }
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Client<S> {
    /// Reads one complete reply, following multi-line continuations.
    async fn reply(&mut self) -> (u16, String) {
        let mut text = String::new();
        let mut line = String::new();
        tokio::time::timeout(REPLY_TIMEOUT, self.stream.read_line(&mut line))
            .await
            .expect("reply timed out")
            .unwrap();
        assert!(line.len() >= 4, "short reply: {:?}", line);
        let code: u16 = line[..3].parse().unwrap();
        text.push_str(&line);

        if line.as_bytes()[3] == b'-' {
            let terminator = format!("{} ", code);
            loop {
                line.clear();
                tokio::time::timeout(REPLY_TIMEOUT, self.stream.read_line(&mut line))
                    .await
                    .expect("reply timed out")
                    .unwrap();
                text.push_str(&line);
                if line.starts_with(&terminator) {
                    break;
                }
            }
        }
        (code, text)
    }

    async fn send(&mut self, command: &str) {
        self.stream
            .write_all(format!("{}\r\n", command).as_bytes())
            .await
            .unwrap();
        self.stream.flush().await.unwrap();
    }

    async fn command(&mut self, command: &str) -> (u16, String) {
        self.send(command).await;
        self.reply().await
    }

    async fn login(&mut self) {
        assert_eq!(self.command("USER alice").await.0, 331);
        assert_eq!(self.command("PASS alice123").await.0, 230);
    }

    /// Sends EPSV and returns the advertised port.
    async fn passive_port(&mut self) -> u16 {
        let (code, text) = self.command("EPSV").await;
        assert_eq!(code, 229, "{}", text);
        let start = text.find("(|||").unwrap() + 4;
        let end = text[start..].find('|').unwrap() + start;
        text[start..end].parse().unwrap()
    }

    /// Sends EPSV and connects to the advertised port.
    async fn open_passive(&mut self, addr: SocketAddr) -> TcpStream {
        let port = self.passive_port().await;
        TcpStream::connect((addr.ip(), port)).await.unwrap()
    }
}

#[tokio::test]
async fn test_greeting_and_quit() {
    let root = tempfile::tempdir().unwrap();
    let (_server, addr) = start_server(test_config(root.path(), 31000)).await;

    let mut client = Client::connect(addr).await;
    let (code, text) = client.reply().await;
    assert_eq!(code, 220);
    assert!(text.contains("Welcome"));

    assert_eq!(client.command("QUIT").await.0, 221);
    let mut rest = Vec::new();
    client.stream.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());
}

#[tokio::test]
async fn test_login_gates_file_commands() {
    let root = tempfile::tempdir().unwrap();
    let (_server, addr) = start_server(test_config(root.path(), 31100)).await;

    let mut client = Client::connect(addr).await;
    client.reply().await;

    assert_eq!(client.command("LIST").await.0, 530);
    assert_eq!(client.command("PASS alice123").await.0, 503);
    assert_eq!(client.command("USER alice").await.0, 331);
    assert_eq!(client.command("PASS wrong").await.0, 530);
    client.login().await;
    assert_eq!(client.command("PWD").await.0, 257);
}

#[tokio::test]
async fn test_unknown_command_and_feat() {
    let root = tempfile::tempdir().unwrap();
    let (_server, addr) = start_server(test_config(root.path(), 31200)).await;

    let mut client = Client::connect(addr).await;
    client.reply().await;

    assert_eq!(client.command("XYZZY").await.0, 500);

    let (code, text) = client.command("FEAT").await;
    assert_eq!(code, 211);
    assert!(text.starts_with("211-"));
    assert!(text.contains(" EPSV\r\n"));
    assert!(!text.contains("AUTH TLS"));

    // Pipelined commands are answered in order.
    client.send("NOOP\r\nSYST").await;
    assert_eq!(client.reply().await.0, 200);
    assert_eq!(client.reply().await.0, 215);
}

#[tokio::test]
async fn test_list_over_passive_connection() {
    let root = tempfile::tempdir().unwrap();
    std::fs::write(root.path().join("notes.txt"), b"hello").unwrap();
    std::fs::create_dir(root.path().join("pub")).unwrap();
    let (_server, addr) = start_server(test_config(root.path(), 31300)).await;

    let mut client = Client::connect(addr).await;
    client.reply().await;
    client.login().await;

    let mut data = client.open_passive(addr).await;
    client.send("NLST").await;
    assert_eq!(client.reply().await.0, 150);
    let mut listing = String::new();
    data.read_to_string(&mut listing).await.unwrap();
    assert_eq!(client.reply().await.0, 226);

    let mut names: Vec<&str> = listing.lines().collect();
    names.sort();
    assert_eq!(names, vec!["notes.txt", "pub"]);

    // The passive setup was consumed by the transfer.
    assert_eq!(client.command("LIST").await.0, 425);
}

#[tokio::test]
async fn test_store_then_retrieve() {
    let root = tempfile::tempdir().unwrap();
    let (_server, addr) = start_server(test_config(root.path(), 31400)).await;

    let mut client = Client::connect(addr).await;
    client.reply().await;
    client.login().await;

    let mut data = client.open_passive(addr).await;
    client.send("STOR upload.bin").await;
    assert_eq!(client.reply().await.0, 150);
    data.write_all(b"some uploaded bytes").await.unwrap();
    data.shutdown().await.unwrap();
    drop(data);
    assert_eq!(client.reply().await.0, 226);
    assert_eq!(
        std::fs::read(root.path().join("upload.bin")).unwrap(),
        b"some uploaded bytes"
    );

    let mut data = client.open_passive(addr).await;
    client.send("RETR upload.bin").await;
    assert_eq!(client.reply().await.0, 150);
    let mut received = Vec::new();
    data.read_to_end(&mut received).await.unwrap();
    assert_eq!(client.reply().await.0, 226);
    assert_eq!(received, b"some uploaded bytes");

    assert_eq!(client.command("RETR missing.bin").await.0, 550);
}

#[tokio::test]
async fn test_abort_pending_transfer() {
    let root = tempfile::tempdir().unwrap();
    std::fs::write(root.path().join("big.bin"), vec![7u8; 1024]).unwrap();
    let (_server, addr) = start_server(test_config(root.path(), 31500)).await;

    let mut client = Client::connect(addr).await;
    client.reply().await;
    client.login().await;

    assert_eq!(client.command("EPSV").await.0, 229);
    client.send("RETR big.bin").await;
    assert_eq!(client.reply().await.0, 150);

    // Never connect the data channel; ABOR must still get through.
    client.send("ABOR").await;
    assert_eq!(client.reply().await.0, 426);
    assert_eq!(client.reply().await.0, 226);

    assert_eq!(client.command("ABOR").await.0, 226);
    assert_eq!(client.command("NOOP").await.0, 200);
}

#[tokio::test]
async fn test_max_clients_rejects_extra_connection() {
    let root = tempfile::tempdir().unwrap();
    let config = ServerConfig {
        max_clients: 1,
        ..test_config(root.path(), 31600)
    };
    let (_server, addr) = start_server(config).await;

    let mut first = Client::connect(addr).await;
    assert_eq!(first.reply().await.0, 220);

    let mut second = Client::connect(addr).await;
    assert_eq!(second.reply().await.0, 421);

    assert_eq!(first.command("NOOP").await.0, 200);
}

#[tokio::test]
async fn test_shutdown_notifies_clients() {
    let root = tempfile::tempdir().unwrap();
    let (server, addr) = start_server(test_config(root.path(), 31700)).await;

    let mut client = Client::connect(addr).await;
    client.reply().await;

    server.shutdown();
    assert_eq!(client.reply().await.0, 421);
}

#[tokio::test]
async fn test_long_transfer_does_not_count_as_idle() {
    let root = tempfile::tempdir().unwrap();
    std::fs::write(root.path().join("slow.bin"), vec![3u8; 4096]).unwrap();
    let config = ServerConfig {
        idle_timeout_secs: 1,
        ..test_config(root.path(), 31800)
    };
    let (_server, addr) = start_server(config).await;

    let mut client = Client::connect(addr).await;
    client.reply().await;
    client.login().await;

    let port = client.passive_port().await;
    client.send("RETR slow.bin").await;
    assert_eq!(client.reply().await.0, 150);

    // The transfer itself outlasts the idle timeout.
    tokio::time::sleep(Duration::from_millis(2500)).await;
    let mut data = TcpStream::connect((addr.ip(), port)).await.unwrap();
    let mut received = Vec::new();
    data.read_to_end(&mut received).await.unwrap();
    assert_eq!(received.len(), 4096);
    assert_eq!(client.reply().await.0, 226);

    assert_eq!(client.command("NOOP").await.0, 200);
}

#[tokio::test]
async fn test_tls_control_and_private_data_channel() {
    let root = tempfile::tempdir().unwrap();
    let certs = tempfile::tempdir().unwrap();
    std::fs::write(root.path().join("secret.txt"), b"top secret").unwrap();
    let certificate = TestCertificate::generate(certs.path());
    let config = ServerConfig {
        tls_cert_path: Some(certificate.cert_path.clone()),
        tls_key_path: Some(certificate.key_path.clone()),
        ..test_config(root.path(), 31900)
    };
    let (_server, addr) = start_server(config).await;
    let connector = certificate.connector();

    let mut client = Client::connect(addr).await;
    client.reply().await;
    let (code, features) = client.command("FEAT").await;
    assert_eq!(code, 211);
    assert!(features.contains(" AUTH TLS\r\n"), "{}", features);
    assert_eq!(client.command("PBSZ 0").await.0, 503);

    let (code, text) = client.command("AUTH TLS").await;
    assert_eq!(code, 234, "{}", text);
    let mut client = client.secure(&connector).await;

    client.login().await;
    assert_eq!(client.command("PROT P").await.0, 503);
    assert_eq!(client.command("PBSZ 0").await.0, 200);
    assert_eq!(client.command("PROT P").await.0, 200);
    assert_eq!(client.command("AUTH TLS").await.0, 503);

    let data = client.open_passive(addr).await;
    client.send("NLST").await;
    let mut data = tls_connect(&connector, data).await;
    assert_eq!(client.reply().await.0, 150);
    let mut listing = String::new();
    // Fails with UnexpectedEof unless the server sent close_notify.
    data.read_to_string(&mut listing).await.unwrap();
    assert_eq!(client.reply().await.0, 226);
    assert_eq!(listing.lines().collect::<Vec<_>>(), vec!["secret.txt"]);

    let data = client.open_passive(addr).await;
    client.send("RETR secret.txt").await;
    let mut data = tls_connect(&connector, data).await;
    assert_eq!(client.reply().await.0, 150);
    let mut received = Vec::new();
    data.read_to_end(&mut received).await.unwrap();
    assert_eq!(client.reply().await.0, 226);
    assert_eq!(received, b"top secret");

    assert_eq!(client.command("QUIT").await.0, 221);
}
