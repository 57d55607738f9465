use std::time::Duration;

use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use vellum_server::{Server, ServerConfig};

struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Connection {
    async fn open(addr: std::net::SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, writer) = stream.into_split();
        let mut conn = Self {
            reader: BufReader::new(read_half),
            writer,
        };
        assert_eq!(conn.read_line().await, "220 Vellum workspace ready");
        conn
    }

    async fn read_line(&mut self) -> String {
        let mut line = String::new();
        self.reader.read_line(&mut line).await.unwrap();
        line.trim_end_matches(['\r', '\n']).to_string()
    }

    // Helper to send command and read the first reply line
    async fn send_command(&mut self, command: &str) -> String {
        self.writer
            .write_all(format!("{}\r\n", command).as_bytes())
            .await
            .unwrap();
        self.read_line().await
    }
}

async fn start_server(max_clients: usize) -> (TempDir, std::net::SocketAddr) {
    let tmp = TempDir::new().unwrap();
    let config = ServerConfig {
        port: 0,
        max_clients,
        workspace_root: tmp.path().join("files").display().to_string(),
        database_path: tmp.path().join("users.db").display().to_string(),
        password_iterations: 1_000,
        ..ServerConfig::default()
    };

    let server = Server::bind(config).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run(std::future::pending()));
    (tmp, addr)
}

#[tokio::test]
async fn full_session_over_tcp() {
    let (tmp, addr) = start_server(8).await;
    let mut conn = Connection::open(addr).await;

    assert_eq!(
        conn.send_command("REGISTER alice alice@example.com pw").await,
        "201 Registered user 1"
    );
    let reply = conn.send_command("LOGIN alice pw").await;
    assert!(reply.starts_with("230 "), "{}", reply);

    assert_eq!(conn.send_command("MKD docs").await, "257 \"docs\" created");

    let body = "hello\nworld";
    conn.writer
        .write_all(format!("WRITE {} docs/hello.txt\r\n{}", body.len(), body).as_bytes())
        .await
        .unwrap();
    assert_eq!(conn.read_line().await, "226 \"docs/hello.txt\" saved");
    assert_eq!(
        std::fs::read_to_string(tmp.path().join("files/docs/hello.txt")).unwrap(),
        body
    );

    assert_eq!(conn.send_command("READ docs/hello.txt").await, "150 11 bytes");
    let mut content = vec![0u8; 11];
    conn.reader.read_exact(&mut content).await.unwrap();
    assert_eq!(content, body.as_bytes());
    assert_eq!(conn.read_line().await, "226 Transfer complete");

    assert_eq!(conn.send_command("LIST").await, "150 2 entries");
    assert_eq!(conn.read_line().await, "D docs");
    assert_eq!(conn.read_line().await, "F docs/hello.txt");
    assert_eq!(conn.read_line().await, "226 End of listing");

    assert!(conn.send_command("DEL docs").await.starts_with("550 NotEmpty"));
    assert_eq!(
        conn.send_command("DEL docs/hello.txt").await,
        "250 \"docs/hello.txt\" deleted"
    );
    assert!(conn.send_command("READ ../../etc/passwd").await.starts_with("553 InvalidPath"));
    assert_eq!(conn.send_command("QUIT").await, "221 Goodbye");
}

#[tokio::test]
async fn workspace_commands_need_login() {
    let (_tmp, addr) = start_server(8).await;
    let mut conn = Connection::open(addr).await;

    assert!(conn.send_command("LIST").await.starts_with("530 Unauthenticated"));
    assert!(
        conn.send_command("LOGIN ghost pw")
            .await
            .starts_with("530 InvalidCredentials")
    );
    assert_eq!(conn.send_command("NOOP").await, "500 Unknown command");
}

#[tokio::test]
async fn write_without_session_closes_before_payload() {
    let (tmp, addr) = start_server(8).await;
    let mut conn = Connection::open(addr).await;

    conn.writer
        .write_all(b"WRITE 1048576 big.bin\r\n")
        .await
        .unwrap();
    assert!(conn.read_line().await.starts_with("530 Unauthenticated"));

    // Server hangs up instead of waiting for the payload
    let mut rest = String::new();
    let read = tokio::time::timeout(Duration::from_secs(5), conn.reader.read_line(&mut rest))
        .await
        .unwrap();
    assert!(matches!(read, Ok(0) | Err(_)));
    assert!(!tmp.path().join("files/big.bin").exists());
}

#[tokio::test]
async fn session_token_survives_reconnect() {
    let (_tmp, addr) = start_server(8).await;

    let mut first = Connection::open(addr).await;
    first.send_command("REGISTER bob bob@example.com pw").await;
    let token = first
        .send_command("LOGIN bob pw")
        .await
        .trim_start_matches("230 ")
        .to_string();
    first.send_command("QUIT").await;

    let mut second = Connection::open(addr).await;
    assert_eq!(
        second.send_command(&format!("SESSION {}", token)).await,
        "230 Session resumed for bob"
    );
    assert_eq!(second.send_command("LIST").await, "150 0 entries");
    assert_eq!(second.read_line().await, "226 End of listing");
}

#[tokio::test]
async fn over_long_command_is_rejected() {
    let (_tmp, addr) = start_server(8).await;
    let mut conn = Connection::open(addr).await;

    let long = format!("READ {}", "a".repeat(8192));
    assert_eq!(conn.send_command(&long).await, "500 Command too long");
    // The connection is still usable afterwards
    assert!(conn.send_command("LIST").await.starts_with("530 "));
}

#[tokio::test]
async fn connection_limit_is_enforced() {
    let (_tmp, addr) = start_server(1).await;
    let _first = Connection::open(addr).await;

    let stream = TcpStream::connect(addr).await.unwrap();
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    tokio::time::timeout(Duration::from_secs(5), reader.read_line(&mut line))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(line, "421 Too many connections\r\n");
}
